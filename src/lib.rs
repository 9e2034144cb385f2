//! Client library for streaming virtual gamepad input to a remote server.
//!
//! The crate keeps a thread-safe [`pad::PadState`] that any producer can
//! poke through a [`link::LinkHandle`], and a session layer that ships that
//! state over a persistent TCP connection as newline-delimited JSON. The
//! server talks back on the same line protocol with rumble requests and
//! pad id assignments.
//!
//! ```text
//! input thread ──► LinkHandle ──► pad state ──► streaming/heartbeat ──► TCP
//!                      ▲                                 │
//!                      └───── LinkEvent channel ◄── listener
//! ```

pub mod config;
pub mod input;
pub mod link;
pub mod pad;
pub mod wire;

pub use config::{AppConfig, DeviceProfile, ServerConfig};
pub use input::{spawn_pad_source, SourceSettings};
pub use link::{LinkError, LinkEvent, LinkHandle, LinkPhase};
pub use pad::{DpadDirection, PadButton};
