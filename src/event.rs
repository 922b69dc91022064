//! Raw input events.
//!
//! A thin (type, code, value) triple mirroring `struct input_event`, shared
//! by the capture side (converted from `evdev::InputEvent`) and the output
//! side (converted back for the uinput sink). Timestamps are dropped: the
//! kernel stamps synthesized events on write, and decisions here only depend
//! on ordering within a device, never on wall-clock time.

use evdev::{EventType, InputEvent};

pub const EV_SYN: u16 = 0x00;
pub const EV_KEY: u16 = 0x01;

pub const KEY_RELEASED: i32 = 0;
pub const KEY_PRESSED: i32 = 1;
/// Driver-coalesced auto-repeat. Discarded before it reaches any state.
pub const KEY_REPEATED: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub event_type: u16,
    pub code: u16,
    pub value: i32,
}

impl RawEvent {
    pub fn key(code: u16, value: i32) -> Self {
        Self {
            event_type: EV_KEY,
            code,
            value,
        }
    }

    /// A SYN_REPORT frame boundary.
    pub fn syn() -> Self {
        Self {
            event_type: EV_SYN,
            code: 0,
            value: 0,
        }
    }

    pub fn is_key(&self) -> bool {
        self.event_type == EV_KEY
    }

    pub fn is_syn(&self) -> bool {
        self.event_type == EV_SYN
    }

    pub fn is_key_press(&self) -> bool {
        self.is_key() && self.value == KEY_PRESSED
    }

    pub fn is_key_release(&self) -> bool {
        self.is_key() && self.value == KEY_RELEASED
    }

    pub fn from_input(ev: &InputEvent) -> Self {
        Self {
            event_type: ev.event_type().0,
            code: ev.code(),
            value: ev.value(),
        }
    }

    pub fn to_input(self) -> InputEvent {
        InputEvent::new(EventType(self.event_type), self.code, self.value)
    }
}
