//! Per-device interception pipeline.
//!
//! One `Pipeline` runs on each grabbed device's thread. Key events are
//! buffered until the sync frame that closes the chord; the frame is the
//! unit of decision. At each sync boundary the pipeline either consumes the
//! buffered chord (a rule fired -- future releases of the held keys become
//! phantoms and are swallowed), defers (a modifier was just pressed and the
//! next frame decides), or replays the buffer verbatim on the virtual
//! output.
//!
//! Modifier pass-through: Ctrl/Alt must be visibly held downstream when an
//! unbound key or a mouse click lands while the user holds them. A
//! pass-through modifier therefore goes out eagerly as soon as an evaluation
//! is about to decide its chord's fate, and the one-shot session hook
//! releases it again before a rule's first emission. `pass_through_held`
//! tracks exactly the presses that are live on the output so a buffered
//! press is never replayed twice.

mod modifier;
mod state;

pub use modifier::ModifierTracker;
pub use state::{EventStack, PressedSet};

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use crate::engine::ScriptEngine;
use crate::event::{RawEvent, KEY_PRESSED, KEY_RELEASED};
use crate::keys;
use crate::output::VirtualOutput;

pub struct Pipeline {
    engine: Arc<ScriptEngine>,
    output: Arc<VirtualOutput>,
    pressed: PressedSet,
    stack: EventStack,
    mods: ModifierTracker,
    /// Pass-through modifiers whose press is live on the output.
    pass_through_held: BTreeSet<u16>,
    /// Keys whose next release is a phantom (their chord was consumed).
    bypass_next_release: HashSet<u16>,
    last_key_was_modifier: bool,
    last_key_was_release: bool,
}

impl Pipeline {
    pub fn new(engine: Arc<ScriptEngine>, output: Arc<VirtualOutput>) -> Self {
        Self {
            engine,
            output,
            pressed: PressedSet::default(),
            stack: EventStack::default(),
            mods: ModifierTracker::new(),
            pass_through_held: BTreeSet::new(),
            bypass_next_release: HashSet::new(),
            last_key_was_modifier: false,
            last_key_was_release: false,
        }
    }

    /// Feeds one raw event from the grabbed device.
    pub fn handle(&mut self, ev: RawEvent) {
        if ev.is_syn() {
            self.on_sync(ev);
            return;
        }
        if !ev.is_key() {
            // Mouse wheels, scan codes and friends pass through untouched.
            self.output.forward_misc(ev);
            return;
        }
        if ev.value != KEY_PRESSED && ev.value != KEY_RELEASED {
            // Driver-coalesced auto-repeat.
            return;
        }

        let code = ev.code;
        self.last_key_was_modifier = self.mods.is_modifier(code);
        self.last_key_was_release = ev.value == KEY_RELEASED;

        if ev.value == KEY_PRESSED {
            self.pressed.press(code);
            self.mods.press(code);
        } else {
            self.pressed.release(code);
            self.mods.release(code);
            if self.bypass_next_release.remove(&code) {
                log::debug!("pipeline: dropping phantom release of key {code}");
                return;
            }
        }

        self.stack.push(ev);
    }

    /// The decision frame.
    fn on_sync(&mut self, syn: RawEvent) {
        // Presses that reached the output before this frame; replaying them
        // from the buffer would double-press.
        let delivered = self.pass_through_held.clone();

        if self.pressed.is_empty() && !self.pass_through_held.is_empty() {
            // Everything was released; the release events are in the buffer
            // and go out with the replay below.
            self.pass_through_held.clear();
        }

        self.stack.push(syn);

        // A modifier was just pressed: a chord may complete in the next
        // frame, so neither replay nor pass-through may happen yet.
        let force_no_pass_through = self.last_key_was_modifier && !self.last_key_was_release;

        let sorted = self.pressed.sorted_codes();
        let mut handled = false;
        if !sorted.is_empty() && self.engine.wants(&sorted) {
            if !force_no_pass_through && self.stack.has_key_events() {
                self.latch_pass_through();
            }
            let eager: Vec<u16> = self.pass_through_held.iter().copied().collect();
            handled = self.engine.evaluate(&sorted, &eager);
        }

        if handled {
            // Applications never saw these presses; swallow the releases.
            for code in self.pressed.iter() {
                self.bypass_next_release.insert(code);
            }
            // The session hook released every eagerly held modifier.
            self.pass_through_held.clear();
            self.stack.clear();
        } else if force_no_pass_through {
            log::debug!("pipeline: deferring frame, modifier chord may follow");
        } else {
            self.flush(&delivered);
        }
    }

    /// Emits a press for every held pass-through modifier not yet live on
    /// the output, immediately before an evaluation. If the rule consumes
    /// the chord, the session hook undoes this; if not, the replay skips the
    /// buffered duplicate.
    fn latch_pass_through(&mut self) {
        let codes: Vec<u16> = self
            .pressed
            .iter()
            .filter(|&c| {
                keys::is_pass_through_modifier(c) && !self.pass_through_held.contains(&c)
            })
            .collect();
        for code in codes {
            log::debug!("pipeline: eager pass-through press of key {code}");
            self.output.press_key(code);
            self.pass_through_held.insert(code);
            // The press is live downstream again, so the upcoming physical
            // release is no longer a phantom.
            self.bypass_next_release.remove(&code);
        }
    }

    /// Replays the buffered frames and reconciles pass-through state.
    fn flush(&mut self, delivered: &BTreeSet<u16>) {
        // A pass-through modifier can be held with its press neither live on
        // the output nor in the buffer: an earlier rule consumed it. Press
        // it again before the replay so the new key lands with the modifier
        // held, as on a bare keyboard.
        let repress: Vec<u16> = self
            .pressed
            .iter()
            .filter(|&c| {
                keys::is_pass_through_modifier(c)
                    && !self.pass_through_held.contains(&c)
                    && !self.stack.contains_press(c)
            })
            .collect();
        for code in repress {
            log::debug!("pipeline: re-pressing consumed modifier {code}");
            self.output.press_key(code);
            self.pass_through_held.insert(code);
            self.bypass_next_release.remove(&code);
        }

        // Skip buffered presses that are already on the wire -- latched this
        // frame, or latched earlier and cleared above on full release.
        let mut skip = self.pass_through_held.clone();
        skip.extend(delivered.iter().copied());
        let frames = self
            .stack
            .frames(|ev| !(ev.is_key_press() && skip.contains(&ev.code)));
        log::debug!(
            "pipeline: replaying {} frame(s), {} key(s) held",
            frames.len(),
            self.pressed.len()
        );
        self.output.forward_frames(&frames);

        // A replayed release retires the key's pass-through latch; its next
        // press must reach the output again.
        for ev in frames.iter().flatten() {
            if ev.is_key_release() {
                self.pass_through_held.remove(&ev.code);
            }
        }

        // Buffered pass-through presses went out with the replay.
        let replayed: Vec<u16> = self
            .pressed
            .iter()
            .filter(|&c| {
                keys::is_pass_through_modifier(c) && !self.pass_through_held.contains(&c)
            })
            .collect();
        for code in replayed {
            self.pass_through_held.insert(code);
        }

        self.stack.clear();
    }
}

// ---------------------------------------------------------------------------
// Scenario tests
// ---------------------------------------------------------------------------
