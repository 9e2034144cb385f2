//! Virtual pad model shared by input producers and the streaming link.

pub mod buttons;
pub mod state;

pub use buttons::{DpadDirection, PadButton};
pub use state::{PadSnapshot, PadState, ACTIVITY_DEADZONE};
