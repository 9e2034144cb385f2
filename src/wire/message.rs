use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One line on the wire: a JSON object dispatched by its `type` field.
///
/// Client to server: `device_info`, `heartbeat`, `gamepad_input`.
/// Server to client: `welcome`, `vibration`, `connection_info`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "welcome")]
    Welcome {
        gamepad_id: i64,
        /// Free-form greeting some servers attach; purely informational.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    #[serde(rename = "device_info")]
    DeviceInfo { device_data: DeviceData },

    #[serde(rename = "heartbeat")]
    Heartbeat {
        /// Unix milliseconds at send time.
        timestamp: i64,
    },

    #[serde(rename = "gamepad_input")]
    GamepadInput { input_data: InputFrame },

    #[serde(rename = "vibration")]
    Vibration { left_motor: f32, right_motor: f32 },

    #[serde(rename = "connection_info")]
    ConnectionInfo { gamepad_id: i64 },

    /// Any type this client does not understand; dropped after logging.
    #[serde(other)]
    Unknown,
}

/// Identity block sent once per session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceData {
    pub device_model: String,
    pub os_version: String,
    pub device_name: String,
}

/// Payload of a `gamepad_input` frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputFrame {
    pub left_joystick: StickPayload,
    pub right_joystick: StickPayload,
    pub left_trigger: f32,
    pub right_trigger: f32,
    /// Only currently pressed buttons appear here, each mapped to `true`.
    pub buttons: BTreeMap<String, bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StickPayload {
    pub x: f32,
    pub y: f32,
}
