//! Semantic Memory: flat key→value facts.
//!
//! Last write wins. No eviction: the table is unbounded and the caller
//! decides what to keep. Persisted as a single JSON object.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use parking_lot::Mutex;

use crate::error::Result;
use crate::persistence;

/// Thread-safe fact table.
#[derive(Debug, Default)]
pub struct SemanticStore {
    facts: Mutex<HashMap<String, String>>,
}

impl SemanticStore {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from existing facts.
    #[must_use]
    pub fn from_facts(facts: HashMap<String, String>) -> Self {
        Self {
            facts: Mutex::new(facts),
        }
    }

    /// Insert or overwrite `key`.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.facts.lock().insert(key.into(), value.into());
    }

    /// Value stored under `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.facts.lock().get(key).cloned()
    }

    /// Remove `key`, returning its previous value.
    pub fn remove(&self, key: &str) -> Option<String> {
        self.facts.lock().remove(key)
    }

    /// Number of stored facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.facts.lock().len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.lock().is_empty()
    }

    /// All facts, sorted by key.
    #[must_use]
    pub fn facts(&self) -> BTreeMap<String, String> {
        self.facts
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Swap in a freshly loaded table.
    pub(crate) fn replace(&self, facts: HashMap<String, String>) {
        *self.facts.lock() = facts;
    }

    /// Write the table to `path`, keys sorted for stable diffs.
    ///
    /// # Errors
    ///
    /// Propagates [`persistence::write_json`] failures.
    pub fn save_to(&self, path: &Path, pretty: bool) -> Result<()> {
        let snapshot = self.facts();
        persistence::write_json(path, &snapshot, pretty)
    }
}
