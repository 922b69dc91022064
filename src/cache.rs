//! Single-flight memoization.
//!
//! `SingleFlight` guarantees that concurrent `get` calls for the same key run
//! the compute closure exactly once; every caller receives the same result.
//! A failed compute is not retained, so the next caller retries. Readers
//! block on the per-entry `OnceLock`; the structural lock is held only while
//! looking up or inserting the placeholder.
//!
//! `ChordCache` builds on it to memoize rule-key-list resolution: the cache
//! key is the comma-joined sorted lowercase name list, the value the resolved
//! code list (sorted).

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, OnceLock};

use crate::error::Error;
use crate::keys::KeyCatalog;

// ---------------------------------------------------------------------------
// Generic single-flight group
// ---------------------------------------------------------------------------

type Entry<V, E> = Arc<OnceLock<Result<V, E>>>;

pub struct SingleFlight<K, V, E> {
    entries: Mutex<HashMap<K, Entry<V, E>>>,
}

impl<K, V, E> SingleFlight<K, V, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
    E: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the value for `key`, computing it at most once across all
    /// concurrent callers. Callers arriving while a compute is in flight
    /// block until it finishes and share its outcome; on an error outcome
    /// the entry is dropped so a later call starts a fresh compute.
    pub fn get<F>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let entry = {
            let mut entries = self.entries.lock().unwrap();
            entries
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceLock::new()))
                .clone()
        };

        // Exactly one caller runs `compute`; the rest block here until the
        // cell is filled.
        let result = entry.get_or_init(compute).clone();

        if result.is_err() {
            let mut entries = self.entries.lock().unwrap();
            // Only evict the entry we observed failing; a concurrent retry
            // may already have installed a replacement.
            if let Some(current) = entries.get(&key) {
                if Arc::ptr_eq(current, &entry) {
                    entries.remove(&key);
                }
            }
        }

        result
    }
}

impl<K, V, E> Default for SingleFlight<K, V, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
    E: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Chord resolution cache
// ---------------------------------------------------------------------------

/// Memoizes name-list -> code-list resolution for rule matching and emission.
pub struct ChordCache {
    catalog: Arc<KeyCatalog>,
    resolved: SingleFlight<String, Vec<u16>, String>,
}

impl ChordCache {
    pub fn new(catalog: Arc<KeyCatalog>) -> Self {
        Self {
            catalog,
            resolved: SingleFlight::new(),
        }
    }

    /// Resolves a list of key names to a sorted code list.
    ///
    /// The memoization key is canonical (lowercased, sorted, comma-joined),
    /// so `["ctrl","c"]` and `["C","Ctrl"]` share one entry. Unknown names
    /// fail the whole list and are not cached.
    pub fn resolve(&self, names: &[String]) -> Result<Vec<u16>, Error> {
        let mut parts: Vec<String> = names.iter().map(|n| n.to_ascii_lowercase()).collect();
        parts.sort_unstable();
        let key = parts.join(",");

        let catalog = &self.catalog;
        self.resolved
            .get(key, || {
                let mut codes = Vec::with_capacity(parts.len());
                for name in &parts {
                    let code = catalog
                        .code_of(name)
                        .map_err(|_| name.clone())?;
                    codes.push(code.code());
                }
                codes.sort_unstable();
                // Aliases may collapse onto one code ("ctrl" + "lctrl").
                codes.dedup();
                Ok(codes)
            })
            .map_err(Error::UnknownKey)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
