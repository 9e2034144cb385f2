use std::fmt;

// Wire-visible button identifiers, matching the server's vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PadButton {
    A,
    B,
    X,
    Y,
    LeftBumper,
    RightBumper,
    Menu,
    View,
    LeftStick,
    RightStick,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
}

impl PadButton {
    /// Key used for this button inside a `gamepad_input` frame.
    pub fn wire_name(self) -> &'static str {
        match self {
            PadButton::A => "a",
            PadButton::B => "b",
            PadButton::X => "x",
            PadButton::Y => "y",
            PadButton::LeftBumper => "lb",
            PadButton::RightBumper => "rb",
            PadButton::Menu => "menu",
            PadButton::View => "view",
            PadButton::LeftStick => "ls",
            PadButton::RightStick => "rs",
            PadButton::DpadUp => "dpad_up",
            PadButton::DpadDown => "dpad_down",
            PadButton::DpadLeft => "dpad_left",
            PadButton::DpadRight => "dpad_right",
        }
    }

    /// The direction this button stands for, if it is part of the d-pad.
    pub fn dpad_direction(self) -> Option<DpadDirection> {
        match self {
            PadButton::DpadUp => Some(DpadDirection::Up),
            PadButton::DpadDown => Some(DpadDirection::Down),
            PadButton::DpadLeft => Some(DpadDirection::Left),
            PadButton::DpadRight => Some(DpadDirection::Right),
            _ => None,
        }
    }
}

impl fmt::Display for PadButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

// D-pad direction; at most one is held at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DpadDirection {
    Up,
    Down,
    Left,
    Right,
}

impl DpadDirection {
    pub const ALL: [DpadDirection; 4] = [
        DpadDirection::Up,
        DpadDirection::Down,
        DpadDirection::Left,
        DpadDirection::Right,
    ];

    /// The pressed-set entry representing this direction.
    pub fn button(self) -> PadButton {
        match self {
            DpadDirection::Up => PadButton::DpadUp,
            DpadDirection::Down => PadButton::DpadDown,
            DpadDirection::Left => PadButton::DpadLeft,
            DpadDirection::Right => PadButton::DpadRight,
        }
    }
}
