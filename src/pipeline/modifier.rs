//! Per-device modifier state.
//!
//! Tracks the pressed/released state of the eight modifier keys for one
//! device. Pass-through eligibility (which modifiers may leak to the output
//! while held) is a property of the key, not of this tracker; see
//! `keys::is_pass_through_modifier`.

use crate::keys::MODIFIER_KEYS;

pub struct ModifierTracker {
    states: [(u16, bool); MODIFIER_KEYS.len()],
}

impl ModifierTracker {
    pub fn new() -> Self {
        let mut states = [(0u16, false); MODIFIER_KEYS.len()];
        for (slot, key) in states.iter_mut().zip(MODIFIER_KEYS) {
            slot.0 = key.code();
        }
        Self { states }
    }

    pub fn is_modifier(&self, code: u16) -> bool {
        self.states.iter().any(|&(c, _)| c == code)
    }

    pub fn press(&mut self, code: u16) {
        self.set(code, true);
    }

    pub fn release(&mut self, code: u16) {
        self.set(code, false);
    }

    pub fn is_pressed(&self, code: u16) -> bool {
        self.states
            .iter()
            .find(|&&(c, _)| c == code)
            .is_some_and(|&(_, pressed)| pressed)
    }

    fn set(&mut self, code: u16, pressed: bool) {
        if let Some(slot) = self.states.iter_mut().find(|(c, _)| *c == code) {
            slot.1 = pressed;
        }
    }
}

impl Default for ModifierTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use evdev::Key;

    use super::*;

    #[test]
    fn tracks_press_and_release_per_modifier() {
        let mut mods = ModifierTracker::new();
        let ctrl = Key::KEY_LEFTCTRL.code();
        let alt = Key::KEY_RIGHTALT.code();

        assert!(!mods.is_pressed(ctrl));
        mods.press(ctrl);
        mods.press(alt);
        assert!(mods.is_pressed(ctrl));
        assert!(mods.is_pressed(alt));
        mods.release(ctrl);
        assert!(!mods.is_pressed(ctrl));
        assert!(mods.is_pressed(alt));
    }

    #[test]
    fn non_modifiers_are_ignored() {
        let mut mods = ModifierTracker::new();
        let a = Key::KEY_A.code();
        assert!(!mods.is_modifier(a));
        mods.press(a);
        assert!(!mods.is_pressed(a));
    }
}
