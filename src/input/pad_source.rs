use std::thread;
use std::time::Duration;

use gilrs::{Axis, Button, Event, EventType, Gilrs};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::link::LinkHandle;
use crate::pad::PadButton;

/// Tuning for the physical gamepad pump.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct SourceSettings {
    pub joystick_deadzone: f32,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            joystick_deadzone: 0.05,
        }
    }
}

/// Pumps physical gamepad events into the link's pad state on a dedicated
/// OS thread. Gilrs is not Send everywhere, and its poll loop blocks, so it
/// stays off the async runtime.
pub fn spawn_pad_source(link: LinkHandle, settings: SourceSettings) -> thread::JoinHandle<()> {
    thread::spawn(move || run_pump(link, settings))
}

fn run_pump(link: LinkHandle, settings: SourceSettings) {
    let mut gilrs = match Gilrs::new() {
        Ok(g) => g,
        Err(e) => {
            error!("Could not initialize gamepad backend: {}", e);
            return;
        }
    };

    let pads: Vec<String> = gilrs
        .gamepads()
        .map(|(_, pad)| pad.name().to_string())
        .collect();
    if pads.is_empty() {
        warn!("No gamepad connected, waiting for one to appear");
    } else {
        info!("Reading input from: {}", pads.join(", "));
    }

    // Gilrs reports one axis per event while the pad state wants whole
    // stick pairs, so the pump remembers the latest value of each axis.
    let mut sticks = StickMemory::default();

    loop {
        while let Some(Event { event, .. }) = gilrs.next_event() {
            apply_event(&link, &mut sticks, event, settings.joystick_deadzone);
        }
        // Small sleep to keep the poll loop off a full core.
        thread::sleep(Duration::from_millis(2));
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct StickMemory {
    left: (f32, f32),
    right: (f32, f32),
}

fn apply_event(link: &LinkHandle, sticks: &mut StickMemory, event: EventType, deadzone: f32) {
    match event {
        EventType::AxisChanged(axis, value, _) => match axis {
            Axis::LeftStickX => {
                sticks.left.0 = apply_deadzone(value, deadzone);
                link.set_left_stick(sticks.left.0, sticks.left.1);
            }
            Axis::LeftStickY => {
                sticks.left.1 = apply_deadzone(value, deadzone);
                link.set_left_stick(sticks.left.0, sticks.left.1);
            }
            Axis::RightStickX => {
                sticks.right.0 = apply_deadzone(value, deadzone);
                link.set_right_stick(sticks.right.0, sticks.right.1);
            }
            Axis::RightStickY => {
                sticks.right.1 = apply_deadzone(value, deadzone);
                link.set_right_stick(sticks.right.0, sticks.right.1);
            }
            Axis::LeftZ => link.set_left_trigger(normalize_trigger(value)),
            Axis::RightZ => link.set_right_trigger(normalize_trigger(value)),
            _ => {}
        },
        // Analog triggers usually arrive as button value changes.
        EventType::ButtonChanged(Button::LeftTrigger2, value, _) => {
            link.set_left_trigger(value);
        }
        EventType::ButtonChanged(Button::RightTrigger2, value, _) => {
            link.set_right_trigger(value);
        }
        EventType::ButtonChanged(..) => {}
        EventType::ButtonPressed(button, _) => {
            if let Some(mapped) = map_button(button) {
                match mapped.dpad_direction() {
                    Some(direction) => link.set_dpad(direction),
                    None => link.press_button(mapped),
                }
            } else {
                debug!("Ignoring unmapped button {:?}", button);
            }
        }
        EventType::ButtonReleased(button, _) => {
            if let Some(mapped) = map_button(button) {
                link.release_button(mapped);
            }
        }
        EventType::Connected => info!("Gamepad connected"),
        EventType::Disconnected => warn!("Gamepad disconnected"),
        _ => {}
    }
}

// Xbox-style naming: South is the bottom face button.
fn map_button(button: Button) -> Option<PadButton> {
    match button {
        Button::South => Some(PadButton::A),
        Button::East => Some(PadButton::B),
        Button::West => Some(PadButton::X),
        Button::North => Some(PadButton::Y),
        Button::LeftTrigger => Some(PadButton::LeftBumper),
        Button::RightTrigger => Some(PadButton::RightBumper),
        Button::Start => Some(PadButton::Menu),
        Button::Select => Some(PadButton::View),
        Button::LeftThumb => Some(PadButton::LeftStick),
        Button::RightThumb => Some(PadButton::RightStick),
        Button::DPadUp => Some(PadButton::DpadUp),
        Button::DPadDown => Some(PadButton::DpadDown),
        Button::DPadLeft => Some(PadButton::DpadLeft),
        Button::DPadRight => Some(PadButton::DpadRight),
        _ => None,
    }
}

fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() < deadzone {
        0.0
    } else {
        // Rescale so travel outside the deadzone spans the full range.
        let sign = value.signum();
        sign * (value.abs() - deadzone) / (1.0 - deadzone)
    }
}

// Some backends report trigger axes over -1..1 with -1 at rest.
fn normalize_trigger(value: f32) -> f32 {
    if value < 0.0 {
        (value + 1.0) / 2.0
    } else {
        value
    }
}
