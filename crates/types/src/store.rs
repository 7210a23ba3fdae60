//! In-memory key-value store.

use dashmap::DashMap;
use std::collections::BTreeMap;

/// Snapshot of a store's contents, ordered by key.
pub type Dataset = BTreeMap<String, String>;

/// Concurrency-safe string map.
///
/// Has no transactional semantics of its own; callers decide what is legal
/// to apply. Individual operations are atomic per key, which is all the
/// replica read path needs while the protocol path mutates it.
#[derive(Debug, Default)]
pub struct KvStore {
    entries: DashMap<String, String>,
}

impl KvStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Insert or overwrite `key`. Returns the previous value.
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    /// Remove `key`. Returns the removed value.
    pub fn delete(&self, key: &str) -> Option<String> {
        self.entries.remove(key).map(|(_, value)| value)
    }

    /// Check if `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Merge `dataset` into the store, overwriting keys that already exist.
    ///
    /// Keys not mentioned in `dataset` are left alone.
    pub fn bulk_load<I, K, V>(&self, dataset: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in dataset {
            self.entries.insert(key.into(), value.into());
        }
    }

    /// Copy the contents into an ordered dataset.
    pub fn snapshot(&self) -> Dataset {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
