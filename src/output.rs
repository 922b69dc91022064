//! Virtual keyboard output.
//!
//! One `VirtualOutput` is shared by every device loop and by the script
//! engine's `send_keys`. All writes funnel through a single mutex whose scope
//! is a whole emission -- a chord's press frame and release frame can never
//! interleave with another device's replay. The kernel-facing side is the
//! `EventSink` trait so tests can substitute a recording sink for uinput.
//!
//! Write failures are logged and swallowed; the next event reattempts.

use std::io;
use std::sync::Mutex;

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, InputEvent, Key};

use crate::event::{RawEvent, KEY_PRESSED, KEY_RELEASED};
use crate::keys::{self, KeyCatalog};

// ---------------------------------------------------------------------------
// Sink trait
// ---------------------------------------------------------------------------

/// A write-only sink for typed key events.
///
/// `write_frame` writes the given events and terminates the logical group
/// with a SYN_REPORT, matching the kernel's framing of related events.
pub trait EventSink: Send {
    fn write_frame(&mut self, events: &[RawEvent]) -> io::Result<()>;
}

// ---------------------------------------------------------------------------
// Uinput sink
// ---------------------------------------------------------------------------

/// Userspace-created virtual keyboard backed by /dev/uinput.
pub struct UinputSink {
    device: VirtualDevice,
}

impl UinputSink {
    /// Creates the virtual device, advertising every key the catalog knows
    /// so any resolvable chord can be synthesized.
    pub fn create(name: &str, catalog: &KeyCatalog) -> io::Result<Self> {
        let mut capabilities = AttributeSet::<Key>::new();
        for key in catalog.known_keys() {
            capabilities.insert(key);
        }
        let device = VirtualDeviceBuilder::new()?
            .name(name)
            .with_keys(&capabilities)?
            .build()?;
        Ok(Self { device })
    }
}

impl EventSink for UinputSink {
    fn write_frame(&mut self, events: &[RawEvent]) -> io::Result<()> {
        let converted: Vec<InputEvent> = events.iter().map(|ev| ev.to_input()).collect();
        // `emit` appends the SYN_REPORT that closes the frame.
        self.device.emit(&converted)
    }
}

// ---------------------------------------------------------------------------
// Shared output
// ---------------------------------------------------------------------------

pub struct VirtualOutput {
    sink: Mutex<Box<dyn EventSink>>,
}

impl VirtualOutput {
    pub fn new(sink: Box<dyn EventSink>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }

    /// Emits a full chord: presses (modifiers first), sync, releases in the
    /// same order, sync. Atomic with respect to every other emission.
    pub fn send_chord(&self, codes: &[u16]) {
        let mut ordered: Vec<u16> = codes
            .iter()
            .copied()
            .filter(|&c| keys::is_modifier(c))
            .collect();
        ordered.extend(codes.iter().copied().filter(|&c| !keys::is_modifier(c)));

        let presses: Vec<RawEvent> = ordered
            .iter()
            .map(|&c| RawEvent::key(c, KEY_PRESSED))
            .collect();
        let releases: Vec<RawEvent> = ordered
            .iter()
            .map(|&c| RawEvent::key(c, KEY_RELEASED))
            .collect();

        let mut sink = self.sink.lock().unwrap();
        if let Err(e) = sink.write_frame(&presses) {
            log::warn!("output: chord press frame failed: {e}");
        }
        if let Err(e) = sink.write_frame(&releases) {
            log::warn!("output: chord release frame failed: {e}");
        }
    }

    /// Emits a single key press in its own frame (eager modifier
    /// pass-through).
    pub fn press_key(&self, code: u16) {
        self.write_one_frame(&[RawEvent::key(code, KEY_PRESSED)]);
    }

    /// Releases the given keys in one frame (the session's before-first-emit
    /// hook undoing eager pass-through).
    pub fn release_keys(&self, codes: &[u16]) {
        let releases: Vec<RawEvent> = codes
            .iter()
            .map(|&c| RawEvent::key(c, KEY_RELEASED))
            .collect();
        self.write_one_frame(&releases);
    }

    /// Replays buffered frames verbatim. All frames go out under one lock so
    /// a concurrent chord emission cannot split the replay.
    pub fn forward_frames(&self, frames: &[Vec<RawEvent>]) {
        let mut sink = self.sink.lock().unwrap();
        for frame in frames {
            if let Err(e) = sink.write_frame(frame) {
                log::warn!("output: replay frame failed: {e}");
            }
        }
    }

    /// Forwards a non-key event (mouse/misc) immediately.
    pub fn forward_misc(&self, ev: RawEvent) {
        self.write_one_frame(&[ev]);
    }

    fn write_one_frame(&self, events: &[RawEvent]) {
        let mut sink = self.sink.lock().unwrap();
        if let Err(e) = sink.write_frame(events) {
            log::warn!("output: write failed: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------

/// Records every event written to it, with explicit SYN_REPORT markers, so
/// scenario tests can assert byte-exact output sequences.
#[cfg(test)]
pub struct RecordingSink {
    log: std::sync::Arc<Mutex<Vec<RawEvent>>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn new() -> (Self, std::sync::Arc<Mutex<Vec<RawEvent>>>) {
        let log = std::sync::Arc::new(Mutex::new(Vec::new()));
        (Self { log: log.clone() }, log)
    }
}

#[cfg(test)]
impl EventSink for RecordingSink {
    fn write_frame(&mut self, events: &[RawEvent]) -> io::Result<()> {
        let mut log = self.log.lock().unwrap();
        log.extend_from_slice(events);
        log.push(RawEvent::syn());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn press(key: Key) -> RawEvent {
        RawEvent::key(key.code(), KEY_PRESSED)
    }

    fn release(key: Key) -> RawEvent {
        RawEvent::key(key.code(), KEY_RELEASED)
    }

    #[test]
    fn chord_emits_modifiers_first_then_mirrored_releases() {
        let (sink, log) = RecordingSink::new();
        let out = VirtualOutput::new(Box::new(sink));

        out.send_chord(&[Key::KEY_INSERT.code(), Key::KEY_LEFTCTRL.code()]);

        let events = log.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                press(Key::KEY_LEFTCTRL),
                press(Key::KEY_INSERT),
                RawEvent::syn(),
                release(Key::KEY_LEFTCTRL),
                release(Key::KEY_INSERT),
                RawEvent::syn(),
            ]
        );
    }

    #[test]
    fn replay_preserves_frame_boundaries() {
        let (sink, log) = RecordingSink::new();
        let out = VirtualOutput::new(Box::new(sink));

        out.forward_frames(&[
            vec![press(Key::KEY_A)],
            vec![release(Key::KEY_A)],
        ]);

        let events = log.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                press(Key::KEY_A),
                RawEvent::syn(),
                release(Key::KEY_A),
                RawEvent::syn(),
            ]
        );
    }
}
