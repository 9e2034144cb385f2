//! Session layer: one TCP link to the gamepad server, driven by a small
//! group of cooperating tasks.
//!
//! ```text
//!                    LinkHandle (clone freely)
//!                 setters │ connect/disconnect
//!                         ▼
//!                 ┌───────────────┐
//!                 │   LinkInner   │ pad state, phase, wake
//!                 └───────┬───────┘
//!         ┌───────────────┼────────────────┐
//!         ▼               ▼                ▼
//!   ┌───────────┐  ┌────────────┐  ┌─────────────┐
//!   │ heartbeat │  │ streaming  │  │  listener   │
//!   │ every 3s  │  │ 50ms/wake  │  │ server msgs │
//!   └─────┬─────┘  └─────┬──────┘  └──────┬──────┘
//!         └───────── shared writer ───────┘
//!                         │
//!                   supervisor: joins the tasks, closes the
//!                   socket, emits Disconnected + Closed
//! ```
//!
//! Any task hitting a fatal transport error cancels the shared token; the
//! supervisor is the only place that tears the session down, so close
//! notifications fire exactly once.

pub mod connection;
pub mod error;
pub mod handshake;
pub mod session;
mod tasks;

pub use error::LinkError;
pub use session::{
    LinkEvent, LinkHandle, LinkPhase, ACTIVE_SEND_INTERVAL, HEARTBEAT_INTERVAL, IDLE_POLL_INTERVAL,
    READ_TIMEOUT,
};
