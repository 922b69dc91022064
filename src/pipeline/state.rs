//! Per-device event state: the pressed-key set and the sync-frame buffer.
//!
//! Both are owned by exactly one device loop; there is no cross-device
//! sharing.

use crate::event::RawEvent;

// ---------------------------------------------------------------------------
// Pressed-key set
// ---------------------------------------------------------------------------

/// Key codes currently held on one device, in press order. Auto-repeats are
/// filtered before they reach this set, so a code appears iff its last seen
/// transition was a press.
#[derive(Debug, Default)]
pub struct PressedSet {
    codes: Vec<u16>,
}

impl PressedSet {
    pub fn press(&mut self, code: u16) {
        if !self.codes.contains(&code) {
            self.codes.push(code);
        }
    }

    pub fn release(&mut self, code: u16) {
        self.codes.retain(|&c| c != code);
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Insertion order, for logs.
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.codes.iter().copied()
    }

    /// Sorted snapshot, the canonical form for rule matching.
    pub fn sorted_codes(&self) -> Vec<u16> {
        let mut sorted = self.codes.clone();
        sorted.sort_unstable();
        sorted
    }
}

// ---------------------------------------------------------------------------
// Event stack
// ---------------------------------------------------------------------------

/// Raw events buffered since the last decision frame. Normally cleared at
/// every sync boundary; kept across one boundary while a freshly pressed
/// modifier leaves the frame's fate undecided.
#[derive(Debug, Default)]
pub struct EventStack {
    events: Vec<RawEvent>,
}

impl EventStack {
    pub fn push(&mut self, ev: RawEvent) {
        self.events.push(ev);
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Whether a press of `code` is still buffered (not yet delivered).
    pub fn contains_press(&self, code: u16) -> bool {
        self.events
            .iter()
            .any(|ev| ev.is_key_press() && ev.code == code)
    }

    pub fn has_key_events(&self) -> bool {
        self.events.iter().any(|ev| ev.is_key())
    }

    /// Splits the buffer into sync-terminated frames, sync markers excluded
    /// (the sink re-adds the frame boundary on write). `keep` decides which
    /// key events survive the replay.
    pub fn frames<F>(&self, keep: F) -> Vec<Vec<RawEvent>>
    where
        F: Fn(&RawEvent) -> bool,
    {
        let mut frames = Vec::new();
        let mut current = Vec::new();
        for ev in &self.events {
            if ev.is_syn() {
                frames.push(std::mem::take(&mut current));
            } else if keep(ev) {
                current.push(*ev);
            }
        }
        // The stack is flushed right after a sync is pushed, so a trailing
        // partial frame indicates a logic error upstream; forward it rather
        // than drop events.
        if !current.is_empty() {
            debug_assert!(false, "event stack flushed mid-frame");
            frames.push(current);
        }
        frames
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
