//! Focused-window tracking.
//!
//! A compositor-side helper pushes `{"title": …, "class": …}` updates over
//! the desktop bus (see `dbus`). The most recent value is held here and read
//! synchronously by the script engine's `active_window_class()`. When no
//! update has arrived yet -- or the bus could not be attached at all -- the
//! class is the empty string and window-gated rules simply never match.

use std::sync::RwLock;

pub mod dbus;

/// Title and application class of one focused window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WinInfo {
    pub title: String,
    pub class: String,
}

/// Most-recent focused-window state, shared between the bus receiver and the
/// script engine.
#[derive(Default)]
pub struct FocusState {
    current: RwLock<Option<WinInfo>>,
}

impl FocusState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, info: WinInfo) {
        *self.current.write().unwrap() = Some(info);
    }

    /// The focused window's application class; empty while unknown.
    pub fn class(&self) -> String {
        self.current
            .read()
            .unwrap()
            .as_ref()
            .map(|w| w.class.clone())
            .unwrap_or_default()
    }
}
