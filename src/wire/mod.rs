//! Newline-delimited JSON protocol spoken with the gamepad server.

pub mod codec;
pub mod message;

pub use codec::{decode, device_info, encode, heartbeat, input_frame, WireError};
pub use message::{DeviceData, InputFrame, Message, StickPayload};
