//! Durable storage of suites in a key-value store.
//!
//! Key = suite id, value = the codec's pre-compression text. A suite is only
//! written back automatically when its id is already in the saved-suites index,
//! i.e. when the user saved it at some point.

use std::collections::BTreeMap;

use crate::codec;
use crate::suite::Suite;
use crate::types::{Result, SuiteId};

/// Minimal string key-value store.
pub trait KeyValueStore {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&mut self, key: &str, value: String);
    fn remove_item(&mut self, key: &str);
    fn keys(&self) -> Vec<String>;
}

/// In-process store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    items: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: String) {
        self.items.insert(key.to_string(), value);
    }

    fn remove_item(&mut self, key: &str) {
        self.items.remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }
}

/// Suites found in a store, newest first.
#[derive(Debug, Clone, Default)]
pub struct SavedSuites {
    entries: Vec<(SuiteId, Suite)>,
}

impl SavedSuites {
    /// Collect every entry that holds a suite with a title and at least one
    /// test. Anything else in the store is skipped.
    pub fn scan(store: &dyn KeyValueStore) -> Self {
        let mut entries: Vec<(SuiteId, Suite)> = store
            .keys()
            .into_iter()
            .filter_map(|key| {
                let text = store.get_item(&key)?;
                let suite = parse_saved(&text)?;
                let id = SuiteId::from_string(key).ok()?;
                Some((id, suite))
            })
            .collect();
        entries.sort_by(|a, b| b.1.updated.cmp(&a.1.updated));
        Self { entries }
    }

    pub fn contains(&self, id: &SuiteId) -> bool {
        self.entries.iter().any(|(saved, _)| saved == id)
    }

    pub fn get(&self, id: &SuiteId) -> Option<&Suite> {
        self.entries
            .iter()
            .find(|(saved, _)| saved == id)
            .map(|(_, suite)| suite)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(SuiteId, Suite)> {
        self.entries.iter()
    }

    /// Saved suites whose title contains `term`, ignoring case.
    pub fn search<'a>(&'a self, term: &'a str) -> impl Iterator<Item = &'a (SuiteId, Suite)> + 'a {
        let term = term.to_lowercase();
        self.entries
            .iter()
            .filter(move |(_, suite)| suite.title.to_lowercase().contains(&term))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_saved(text: &str) -> Option<Suite> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let has_title = value.get("title").is_some_and(|t| t.is_string());
    let has_tests = value
        .get("tests")
        .and_then(|t| t.as_array())
        .is_some_and(|t| !t.is_empty());
    if !(has_title && has_tests) {
        return None;
    }
    codec::from_text(text).ok().filter(Suite::is_valid)
}

/// Save `suite` unconditionally, adding it to the index.
pub fn save(store: &mut dyn KeyValueStore, suite: &Suite) -> Result<()> {
    let text = codec::to_text(suite)?;
    store.set_item(suite.id.as_str(), text);
    tracing::info!(suite = %suite.id, "Suite saved");
    Ok(())
}

/// Write `suite` only if its id is already in `saved`. Returns whether it was
/// written.
pub fn persist_if_saved(
    store: &mut dyn KeyValueStore,
    saved: &SavedSuites,
    suite: &Suite,
) -> Result<bool> {
    if !saved.contains(&suite.id) {
        return Ok(false);
    }
    let text = codec::to_text(suite)?;
    store.set_item(suite.id.as_str(), text);
    tracing::debug!(suite = %suite.id, "Saved suite updated");
    Ok(true)
}

/// Remove a suite from the store.
pub fn forget(store: &mut dyn KeyValueStore, id: &SuiteId) {
    store.remove_item(id.as_str());
}
