//! Per-evaluation rule session.
//!
//! One `Session` lives for exactly one script evaluation. It carries the
//! pressed-key snapshot the rules match against, the set of pass-through
//! modifiers currently live on the output (so the first emission can undo
//! eager pass-through), and the mutable outcome: the `handled` flag and --
//! during the very first evaluation -- the recorded watch set.

use std::sync::{Arc, Mutex};

use crate::cache::ChordCache;
use crate::keys::KeyCatalog;
use crate::output::VirtualOutput;
use crate::wininfo::FocusState;

use super::watch::ChordWatch;

pub struct Session {
    /// Sorted snapshot of the device's pressed keys at the sync boundary.
    pressed: Vec<u16>,
    /// Pass-through modifiers whose press has already reached the output.
    eager_held: Vec<u16>,
    /// First-ever evaluation: record `on_key_press` registrations.
    recording: bool,
    catalog: Arc<KeyCatalog>,
    cache: Arc<ChordCache>,
    output: Arc<VirtualOutput>,
    focus: Arc<FocusState>,
    state: Mutex<SessionState>,
}

#[derive(Default)]
struct SessionState {
    handled: bool,
    hook_fired: bool,
    recorded: ChordWatch,
}

impl Session {
    pub fn new(
        pressed: Vec<u16>,
        eager_held: Vec<u16>,
        recording: bool,
        catalog: Arc<KeyCatalog>,
        cache: Arc<ChordCache>,
        output: Arc<VirtualOutput>,
        focus: Arc<FocusState>,
    ) -> Self {
        debug_assert!(pressed.windows(2).all(|w| w[0] < w[1]));
        Self {
            pressed,
            eager_held,
            recording,
            catalog,
            cache,
            output,
            focus,
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn window_class(&self) -> String {
        self.focus.class()
    }

    /// Canonical names of the pressed snapshot, for the script.
    pub fn pressed_names(&self) -> Vec<String> {
        self.pressed
            .iter()
            .map(|&code| match self.catalog.name_of(code) {
                Some(name) => name.to_owned(),
                None => code.to_string(),
            })
            .collect()
    }

    /// `"down"` / `"up"` for one key against the snapshot.
    pub fn key_state(&self, name: &str) -> &'static str {
        match self.catalog.code_of(name) {
            Ok(key) if self.pressed.binary_search(&key.code()).is_ok() => "down",
            Ok(_) => "up",
            Err(e) => {
                log::warn!("engine: key_state: {e}");
                "up"
            }
        }
    }

    /// Resolves and emits a chord on the virtual output. The first emission
    /// of the session runs the one-shot hook that releases eagerly
    /// passed-through modifiers, so the synthesized chord is not polluted by
    /// a sticky Ctrl/Alt.
    pub fn send_keys(&self, names: &[String]) {
        let codes = match self.cache.resolve(names) {
            Ok(codes) => codes,
            Err(e) => {
                log::warn!("engine: send_keys: {e}");
                return;
            }
        };

        {
            let mut state = self.state.lock().unwrap();
            if !state.hook_fired {
                state.hook_fired = true;
                if !self.eager_held.is_empty() {
                    log::debug!(
                        "engine: releasing eager pass-through before emit: {:?}",
                        self.eager_held
                    );
                    self.output.release_keys(&self.eager_held);
                }
            }
            state.handled = true;
        }

        self.output.send_chord(&codes);
    }

    /// Registers interest in a chord and reports whether it matches the
    /// snapshot. Matching is set equality, not containment -- a rule on
    /// ctrl+c must not fire while shift is also held.
    pub fn on_key_press(&self, names: &[String]) -> bool {
        let codes = match self.cache.resolve(names) {
            Ok(codes) => codes,
            Err(e) => {
                log::warn!("engine: on_key_press: {e}");
                return false;
            }
        };

        if self.recording {
            self.state.lock().unwrap().recorded.insert(&codes);
        }

        codes == self.pressed
    }

    pub fn handled(&self) -> bool {
        self.state.lock().unwrap().handled
    }

    /// Watch set recorded during a first evaluation.
    pub fn take_recorded(&self) -> ChordWatch {
        std::mem::take(&mut self.state.lock().unwrap().recorded)
    }
}
