use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use super::buttons::{DpadDirection, PadButton};

/// Magnitude below which an axis or trigger counts as neutral.
pub const ACTIVITY_DEADZONE: f32 = 0.01;

/// Shared virtual pad state.
///
/// Scalar controls are stored as f32 bit patterns in atomics so producers
/// never block each other; the pressed-button set sits behind one mutex so
/// d-pad exclusivity and snapshot copies stay consistent.
pub struct PadState {
    left_x: AtomicU32,
    left_y: AtomicU32,
    right_x: AtomicU32,
    right_y: AtomicU32,
    left_trigger: AtomicU32,
    right_trigger: AtomicU32,
    buttons: Mutex<BTreeSet<PadButton>>,
}

/// Owned copy of the pad state at one instant.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PadSnapshot {
    pub left_stick: (f32, f32),
    pub right_stick: (f32, f32),
    pub left_trigger: f32,
    pub right_trigger: f32,
    pub buttons: BTreeSet<PadButton>,
}

impl PadState {
    pub fn new() -> Self {
        Self {
            left_x: AtomicU32::new(0.0f32.to_bits()),
            left_y: AtomicU32::new(0.0f32.to_bits()),
            right_x: AtomicU32::new(0.0f32.to_bits()),
            right_y: AtomicU32::new(0.0f32.to_bits()),
            left_trigger: AtomicU32::new(0.0f32.to_bits()),
            right_trigger: AtomicU32::new(0.0f32.to_bits()),
            buttons: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn set_left_stick(&self, x: f32, y: f32) {
        store_f32(&self.left_x, sanitize_axis(x));
        store_f32(&self.left_y, sanitize_axis(y));
    }

    pub fn set_right_stick(&self, x: f32, y: f32) {
        store_f32(&self.right_x, sanitize_axis(x));
        store_f32(&self.right_y, sanitize_axis(y));
    }

    pub fn set_left_trigger(&self, value: f32) {
        store_f32(&self.left_trigger, sanitize_trigger(value));
    }

    pub fn set_right_trigger(&self, value: f32) {
        store_f32(&self.right_trigger, sanitize_trigger(value));
    }

    pub fn press_button(&self, button: PadButton) {
        if let Ok(mut buttons) = self.buttons.lock() {
            buttons.insert(button);
        }
    }

    pub fn release_button(&self, button: PadButton) {
        if let Ok(mut buttons) = self.buttons.lock() {
            buttons.remove(&button);
        }
    }

    /// Holds one d-pad direction, clearing the other three in the same
    /// critical section.
    pub fn set_dpad(&self, direction: DpadDirection) {
        if let Ok(mut buttons) = self.buttons.lock() {
            for other in DpadDirection::ALL {
                buttons.remove(&other.button());
            }
            buttons.insert(direction.button());
        }
    }

    pub fn release_dpad(&self) {
        if let Ok(mut buttons) = self.buttons.lock() {
            for direction in DpadDirection::ALL {
                buttons.remove(&direction.button());
            }
        }
    }

    /// True while anything is held or pushed past the activity deadzone.
    pub fn has_active_input(&self) -> bool {
        let buttons_held = self
            .buttons
            .lock()
            .map(|buttons| !buttons.is_empty())
            .unwrap_or(false);

        buttons_held
            || load_f32(&self.left_x).abs() > ACTIVITY_DEADZONE
            || load_f32(&self.left_y).abs() > ACTIVITY_DEADZONE
            || load_f32(&self.right_x).abs() > ACTIVITY_DEADZONE
            || load_f32(&self.right_y).abs() > ACTIVITY_DEADZONE
            || load_f32(&self.left_trigger) > ACTIVITY_DEADZONE
            || load_f32(&self.right_trigger) > ACTIVITY_DEADZONE
    }

    /// Copies everything out. The button set is cloned under its lock;
    /// scalars are read individually and may interleave with writers.
    pub fn snapshot(&self) -> PadSnapshot {
        let buttons = self
            .buttons
            .lock()
            .map(|buttons| buttons.clone())
            .unwrap_or_default();

        PadSnapshot {
            left_stick: (load_f32(&self.left_x), load_f32(&self.left_y)),
            right_stick: (load_f32(&self.right_x), load_f32(&self.right_y)),
            left_trigger: load_f32(&self.left_trigger),
            right_trigger: load_f32(&self.right_trigger),
            buttons,
        }
    }

    /// Returns every control to neutral.
    pub fn reset(&self) {
        store_f32(&self.left_x, 0.0);
        store_f32(&self.left_y, 0.0);
        store_f32(&self.right_x, 0.0);
        store_f32(&self.right_y, 0.0);
        store_f32(&self.left_trigger, 0.0);
        store_f32(&self.right_trigger, 0.0);
        if let Ok(mut buttons) = self.buttons.lock() {
            buttons.clear();
        }
    }
}

impl Default for PadState {
    fn default() -> Self {
        Self::new()
    }
}

fn store_f32(slot: &AtomicU32, value: f32) {
    slot.store(value.to_bits(), Ordering::Relaxed);
}

fn load_f32(slot: &AtomicU32) -> f32 {
    f32::from_bits(slot.load(Ordering::Relaxed))
}

fn sanitize_axis(value: f32) -> f32 {
    // Non-finite input would end up as null in a JSON frame.
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

fn sanitize_trigger(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
