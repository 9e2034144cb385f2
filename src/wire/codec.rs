use std::collections::BTreeMap;

use super::message::{DeviceData, InputFrame, Message, StickPayload};
use crate::pad::PadSnapshot;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Serializes a message to one wire line, without the trailing newline.
pub fn encode(message: &Message) -> Result<String, WireError> {
    Ok(serde_json::to_string(message)?)
}

/// Parses one wire line. Surrounding whitespace is tolerated.
pub fn decode(line: &str) -> Result<Message, WireError> {
    Ok(serde_json::from_str(line.trim())?)
}

/// Builds a `gamepad_input` frame from a pad snapshot.
pub fn input_frame(snapshot: &PadSnapshot) -> Message {
    let buttons: BTreeMap<String, bool> = snapshot
        .buttons
        .iter()
        .map(|button| (button.wire_name().to_string(), true))
        .collect();

    Message::GamepadInput {
        input_data: InputFrame {
            left_joystick: StickPayload {
                x: snapshot.left_stick.0,
                y: snapshot.left_stick.1,
            },
            right_joystick: StickPayload {
                x: snapshot.right_stick.0,
                y: snapshot.right_stick.1,
            },
            left_trigger: snapshot.left_trigger,
            right_trigger: snapshot.right_trigger,
            buttons,
        },
    }
}

pub fn heartbeat(timestamp_ms: i64) -> Message {
    Message::Heartbeat {
        timestamp: timestamp_ms,
    }
}

pub fn device_info(model: &str, os_version: &str, name: &str) -> Message {
    Message::DeviceInfo {
        device_data: DeviceData {
            device_model: model.to_string(),
            os_version: os_version.to_string(),
            device_name: name.to_string(),
        },
    }
}
