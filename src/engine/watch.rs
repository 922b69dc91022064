//! Chord watch set: the fast-path filter's lookup structure.
//!
//! Chords are keyed as sorted code tuples padded to a fixed width, so
//! membership is one hash probe with no allocation. Chords wider than the
//! padding can never be watched (nobody holds 17 keys).

use std::collections::HashSet;

pub const WATCH_WIDTH: usize = 16;

/// Sorted, zero-padded code tuple. Code 0 (KEY_RESERVED) never occurs in a
/// chord, so padding cannot collide with a real key.
pub type ChordKey = [u16; WATCH_WIDTH];

/// Builds the canonical key for a sorted, deduplicated code list.
pub fn chord_key(sorted_codes: &[u16]) -> Option<ChordKey> {
    if sorted_codes.is_empty() || sorted_codes.len() > WATCH_WIDTH {
        return None;
    }
    let mut key = [0u16; WATCH_WIDTH];
    key[..sorted_codes.len()].copy_from_slice(sorted_codes);
    Some(key)
}

/// Set of chords the script declared interest in via `on_key_press`.
/// Populated during the first evaluation, read-only thereafter.
#[derive(Debug, Default)]
pub struct ChordWatch {
    chords: HashSet<ChordKey>,
}

impl ChordWatch {
    pub fn insert(&mut self, sorted_codes: &[u16]) {
        if let Some(key) = chord_key(sorted_codes) {
            self.chords.insert(key);
        }
    }

    pub fn contains(&self, sorted_codes: &[u16]) -> bool {
        chord_key(sorted_codes).is_some_and(|key| self.chords.contains(&key))
    }

    pub fn len(&self) -> usize {
        self.chords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chords.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_ignores_padding() {
        let mut watch = ChordWatch::default();
        watch.insert(&[29, 46]);
        assert!(watch.contains(&[29, 46]));
        assert!(!watch.contains(&[29]));
        assert!(!watch.contains(&[29, 45]));
        assert!(!watch.contains(&[29, 46, 47]));
    }

    #[test]
    fn empty_and_oversized_chords_are_never_watchable() {
        assert!(chord_key(&[]).is_none());
        let wide: Vec<u16> = (1..=17).collect();
        assert!(chord_key(&wide).is_none());

        let mut watch = ChordWatch::default();
        watch.insert(&wide);
        assert!(watch.is_empty());
    }
}
