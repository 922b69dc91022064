//! Key catalog: name <-> code resolution and modifier classification.
//!
//! Canonical names are the lowercase suffix of the kernel's KEY_* constant
//! (`leftctrl`, `a`, `pageup`). A fixed alias table covers the spellings
//! users actually write in rules: `ctrl`, `l-ctrl` and `lctrl` all denote
//! LeftCtrl. Resolution is case-insensitive; unknown names fail with a
//! structured error naming the offending token.
//!
//! The catalog is built once at startup and shared read-only.

use std::collections::HashMap;

use evdev::Key;

use crate::error::Error;

// ---------------------------------------------------------------------------
// Modifier classification
// ---------------------------------------------------------------------------

/// The eight modifier keys tracked per device.
pub const MODIFIER_KEYS: [Key; 8] = [
    Key::KEY_LEFTCTRL,
    Key::KEY_RIGHTCTRL,
    Key::KEY_LEFTALT,
    Key::KEY_RIGHTALT,
    Key::KEY_LEFTSHIFT,
    Key::KEY_RIGHTSHIFT,
    Key::KEY_LEFTMETA,
    Key::KEY_RIGHTMETA,
];

/// Modifiers eligible to leak through to the output while held.
///
/// Ctrl and Alt only: a user holding Ctrl and clicking the mouse must see
/// Ctrl held downstream. Shift and Meta are excluded -- leaking them eagerly
/// garbles text input and triggers compositor gestures.
pub const PASS_THROUGH_KEYS: [Key; 4] = [
    Key::KEY_LEFTCTRL,
    Key::KEY_RIGHTCTRL,
    Key::KEY_LEFTALT,
    Key::KEY_RIGHTALT,
];

pub fn is_modifier(code: u16) -> bool {
    MODIFIER_KEYS.iter().any(|k| k.code() == code)
}

pub fn is_pass_through_modifier(code: u16) -> bool {
    PASS_THROUGH_KEYS.iter().any(|k| k.code() == code)
}

// ---------------------------------------------------------------------------
// Name tables
// ---------------------------------------------------------------------------

/// Canonical names, one per known key code.
const NAMES: &[(Key, &str)] = &[
    // Letters
    (Key::KEY_A, "a"),
    (Key::KEY_B, "b"),
    (Key::KEY_C, "c"),
    (Key::KEY_D, "d"),
    (Key::KEY_E, "e"),
    (Key::KEY_F, "f"),
    (Key::KEY_G, "g"),
    (Key::KEY_H, "h"),
    (Key::KEY_I, "i"),
    (Key::KEY_J, "j"),
    (Key::KEY_K, "k"),
    (Key::KEY_L, "l"),
    (Key::KEY_M, "m"),
    (Key::KEY_N, "n"),
    (Key::KEY_O, "o"),
    (Key::KEY_P, "p"),
    (Key::KEY_Q, "q"),
    (Key::KEY_R, "r"),
    (Key::KEY_S, "s"),
    (Key::KEY_T, "t"),
    (Key::KEY_U, "u"),
    (Key::KEY_V, "v"),
    (Key::KEY_W, "w"),
    (Key::KEY_X, "x"),
    (Key::KEY_Y, "y"),
    (Key::KEY_Z, "z"),
    // Top-row digits
    (Key::KEY_1, "1"),
    (Key::KEY_2, "2"),
    (Key::KEY_3, "3"),
    (Key::KEY_4, "4"),
    (Key::KEY_5, "5"),
    (Key::KEY_6, "6"),
    (Key::KEY_7, "7"),
    (Key::KEY_8, "8"),
    (Key::KEY_9, "9"),
    (Key::KEY_0, "0"),
    // Function keys
    (Key::KEY_F1, "f1"),
    (Key::KEY_F2, "f2"),
    (Key::KEY_F3, "f3"),
    (Key::KEY_F4, "f4"),
    (Key::KEY_F5, "f5"),
    (Key::KEY_F6, "f6"),
    (Key::KEY_F7, "f7"),
    (Key::KEY_F8, "f8"),
    (Key::KEY_F9, "f9"),
    (Key::KEY_F10, "f10"),
    (Key::KEY_F11, "f11"),
    (Key::KEY_F12, "f12"),
    (Key::KEY_F13, "f13"),
    (Key::KEY_F14, "f14"),
    (Key::KEY_F15, "f15"),
    (Key::KEY_F16, "f16"),
    (Key::KEY_F17, "f17"),
    (Key::KEY_F18, "f18"),
    (Key::KEY_F19, "f19"),
    (Key::KEY_F20, "f20"),
    (Key::KEY_F21, "f21"),
    (Key::KEY_F22, "f22"),
    (Key::KEY_F23, "f23"),
    (Key::KEY_F24, "f24"),
    // Modifiers
    (Key::KEY_LEFTCTRL, "leftctrl"),
    (Key::KEY_RIGHTCTRL, "rightctrl"),
    (Key::KEY_LEFTALT, "leftalt"),
    (Key::KEY_RIGHTALT, "rightalt"),
    (Key::KEY_LEFTSHIFT, "leftshift"),
    (Key::KEY_RIGHTSHIFT, "rightshift"),
    (Key::KEY_LEFTMETA, "leftmeta"),
    (Key::KEY_RIGHTMETA, "rightmeta"),
    // Whitespace and editing
    (Key::KEY_SPACE, "space"),
    (Key::KEY_ENTER, "enter"),
    (Key::KEY_TAB, "tab"),
    (Key::KEY_ESC, "esc"),
    (Key::KEY_BACKSPACE, "backspace"),
    (Key::KEY_DELETE, "delete"),
    (Key::KEY_INSERT, "insert"),
    // Navigation
    (Key::KEY_HOME, "home"),
    (Key::KEY_END, "end"),
    (Key::KEY_PAGEUP, "pageup"),
    (Key::KEY_PAGEDOWN, "pagedown"),
    (Key::KEY_UP, "up"),
    (Key::KEY_DOWN, "down"),
    (Key::KEY_LEFT, "left"),
    (Key::KEY_RIGHT, "right"),
    // Punctuation
    (Key::KEY_MINUS, "minus"),
    (Key::KEY_EQUAL, "equal"),
    (Key::KEY_LEFTBRACE, "leftbrace"),
    (Key::KEY_RIGHTBRACE, "rightbrace"),
    (Key::KEY_SEMICOLON, "semicolon"),
    (Key::KEY_APOSTROPHE, "apostrophe"),
    (Key::KEY_GRAVE, "grave"),
    (Key::KEY_BACKSLASH, "backslash"),
    (Key::KEY_COMMA, "comma"),
    (Key::KEY_DOT, "dot"),
    (Key::KEY_SLASH, "slash"),
    (Key::KEY_102ND, "102nd"),
    // Locks and system
    (Key::KEY_CAPSLOCK, "capslock"),
    (Key::KEY_NUMLOCK, "numlock"),
    (Key::KEY_SCROLLLOCK, "scrolllock"),
    (Key::KEY_SYSRQ, "sysrq"),
    (Key::KEY_PAUSE, "pause"),
    (Key::KEY_COMPOSE, "compose"),
    // Keypad
    (Key::KEY_KP0, "kp0"),
    (Key::KEY_KP1, "kp1"),
    (Key::KEY_KP2, "kp2"),
    (Key::KEY_KP3, "kp3"),
    (Key::KEY_KP4, "kp4"),
    (Key::KEY_KP5, "kp5"),
    (Key::KEY_KP6, "kp6"),
    (Key::KEY_KP7, "kp7"),
    (Key::KEY_KP8, "kp8"),
    (Key::KEY_KP9, "kp9"),
    (Key::KEY_KPDOT, "kpdot"),
    (Key::KEY_KPENTER, "kpenter"),
    (Key::KEY_KPPLUS, "kpplus"),
    (Key::KEY_KPMINUS, "kpminus"),
    (Key::KEY_KPASTERISK, "kpasterisk"),
    (Key::KEY_KPSLASH, "kpslash"),
    // Media
    (Key::KEY_MUTE, "mute"),
    (Key::KEY_VOLUMEDOWN, "volumedown"),
    (Key::KEY_VOLUMEUP, "volumeup"),
    (Key::KEY_PLAYPAUSE, "playpause"),
    (Key::KEY_NEXTSONG, "nextsong"),
    (Key::KEY_PREVIOUSSONG, "previoussong"),
];

/// Alias spellings, all mapping onto canonical entries above.
/// The bare modifier names resolve to the left-side variant.
const ALIASES: &[(&str, Key)] = &[
    ("ctrl", Key::KEY_LEFTCTRL),
    ("lctrl", Key::KEY_LEFTCTRL),
    ("l-ctrl", Key::KEY_LEFTCTRL),
    ("rctrl", Key::KEY_RIGHTCTRL),
    ("r-ctrl", Key::KEY_RIGHTCTRL),
    ("alt", Key::KEY_LEFTALT),
    ("lalt", Key::KEY_LEFTALT),
    ("l-alt", Key::KEY_LEFTALT),
    ("ralt", Key::KEY_RIGHTALT),
    ("r-alt", Key::KEY_RIGHTALT),
    ("shift", Key::KEY_LEFTSHIFT),
    ("lshift", Key::KEY_LEFTSHIFT),
    ("l-shift", Key::KEY_LEFTSHIFT),
    ("rshift", Key::KEY_RIGHTSHIFT),
    ("r-shift", Key::KEY_RIGHTSHIFT),
    ("meta", Key::KEY_LEFTMETA),
    ("lmeta", Key::KEY_LEFTMETA),
    ("l-meta", Key::KEY_LEFTMETA),
    ("rmeta", Key::KEY_RIGHTMETA),
    ("r-meta", Key::KEY_RIGHTMETA),
    ("cmd", Key::KEY_LEFTMETA),
    ("super", Key::KEY_LEFTMETA),
    ("win", Key::KEY_LEFTMETA),
    ("escape", Key::KEY_ESC),
    ("return", Key::KEY_ENTER),
    ("del", Key::KEY_DELETE),
    ("ins", Key::KEY_INSERT),
    ("pgup", Key::KEY_PAGEUP),
    ("pgdn", Key::KEY_PAGEDOWN),
    ("pgdown", Key::KEY_PAGEDOWN),
    ("menu", Key::KEY_COMPOSE),
    ("printscreen", Key::KEY_SYSRQ),
];

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Bidirectional name <-> key-code map, built once at startup.
pub struct KeyCatalog {
    by_name: HashMap<&'static str, Key>,
    by_code: HashMap<u16, &'static str>,
}

impl KeyCatalog {
    pub fn new() -> Self {
        let mut by_name = HashMap::with_capacity(NAMES.len() + ALIASES.len());
        let mut by_code = HashMap::with_capacity(NAMES.len());
        for &(key, name) in NAMES {
            by_name.insert(name, key);
            by_code.insert(key.code(), name);
        }
        for &(alias, key) in ALIASES {
            by_name.insert(alias, key);
        }
        Self { by_name, by_code }
    }

    /// Resolves a user-supplied name to a key code. Case-insensitive.
    pub fn code_of(&self, name: &str) -> Result<Key, Error> {
        let lowered = name.to_ascii_lowercase();
        self.by_name
            .get(lowered.as_str())
            .copied()
            .ok_or_else(|| Error::UnknownKey(name.to_owned()))
    }

    /// Returns the canonical name for a key code, if known.
    pub fn name_of(&self, code: u16) -> Option<&'static str> {
        self.by_code.get(&code).copied()
    }

    /// All known key codes, for advertising the virtual device's capabilities.
    pub fn known_keys(&self) -> impl Iterator<Item = Key> + '_ {
        NAMES.iter().map(|&(key, _)| key)
    }
}

impl Default for KeyCatalog {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
