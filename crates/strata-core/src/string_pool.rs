//! String interning for bulk loads and exports
//!
//! Provides [`StringPool`], which collapses equal strings into one shared
//! `Arc<str>` so that many nodes repeating the same keys and values hold a
//! single allocation.

use std::collections::HashSet;
use std::sync::Arc;

/// Intern table for preference strings
///
/// Created per bulk operation (load, save, import) and dropped afterwards.
#[derive(Debug, Default)]
pub struct StringPool {
    strings: HashSet<Arc<str>>,
    savings: usize,
}

impl StringPool {
    /// Create empty pool
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical instance equal to `s`, registering it if none exists
    pub fn add(&mut self, s: &str) -> Arc<str> {
        if let Some(existing) = self.strings.get(s) {
            self.savings += s.len();
            return Arc::clone(existing);
        }
        let shared: Arc<str> = Arc::from(s);
        self.strings.insert(Arc::clone(&shared));
        shared
    }

    /// Canonical instance equal to an already shared string
    ///
    /// Registers `s` itself as canonical when it is new, so no copy is made.
    pub fn add_shared(&mut self, s: &Arc<str>) -> Arc<str> {
        if let Some(existing) = self.strings.get(s.as_ref()) {
            if !Arc::ptr_eq(existing, s) {
                self.savings += s.len();
            }
            return Arc::clone(existing);
        }
        self.strings.insert(Arc::clone(s));
        Arc::clone(s)
    }

    /// Number of distinct strings
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Check if pool is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Bytes that were not duplicated thanks to the pool
    #[inline]
    #[must_use]
    pub fn savings(&self) -> usize {
        self.savings
    }
}
