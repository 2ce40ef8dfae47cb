//! Copy-on-write property maps
//!
//! Provides [`PropertyMap`], the immutable key/value store held by each node.
//! Updates return a new map that shares structure with the old one, so a
//! reader holding a snapshot never observes a partially applied write.

use crate::string_pool::StringPool;
use im::OrdMap;
use std::sync::Arc;

/// Immutable mapping from key to value
///
/// Cloning is O(1). Iteration is ordered by key, which keeps persisted files
/// and exports deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyMap {
    entries: OrdMap<Arc<str>, Arc<str>>,
}

impl PropertyMap {
    /// Create empty map
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for key
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(AsRef::as_ref)
    }

    /// Shared value for key
    #[inline]
    #[must_use]
    pub fn get_shared(&self, key: &str) -> Option<Arc<str>> {
        self.entries.get(key).cloned()
    }

    /// Check if key is present
    #[inline]
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// New map with `key` set to `value`
    #[must_use]
    pub fn insert(&self, key: &str, value: &str) -> Self {
        self.insert_shared(Arc::from(key), Arc::from(value))
    }

    /// New map with `key` set to `value`, reusing the given allocations
    #[must_use]
    pub fn insert_shared(&self, key: Arc<str>, value: Arc<str>) -> Self {
        Self {
            entries: self.entries.update(key, value),
        }
    }

    /// New map without `key`
    #[must_use]
    pub fn remove(&self, key: &str) -> Self {
        Self {
            entries: self.entries.without(key),
        }
    }

    /// Keys in order
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().map(|k| k.to_string()).collect()
    }

    /// Iterate over `(key, value)` pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_ref(), v.as_ref()))
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if map is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Equivalent map whose strings come from `pool`
    #[must_use]
    pub fn intern(&self, pool: &mut StringPool) -> Self {
        let entries = self
            .entries
            .iter()
            .map(|(k, v)| (pool.add_shared(k), pool.add_shared(v)))
            .collect();
        Self { entries }
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|(k, v)| (Arc::from(k.as_ref()), Arc::from(v.as_ref())))
            .collect();
        Self { entries }
    }
}
