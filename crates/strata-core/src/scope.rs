//! Scope provider contract
//!
//! Provides the [`ScopeProvider`] trait that encapsulates everything that
//! differs between root-level scopes (where a node is stored, which ancestor
//! is the unit of persistence, how that unit is loaded, saved and migrated),
//! the injected [`LoadTracker`] load-once cache, and the [`ScopeResolver`]
//! seam through which the tree instantiates providers on demand.

use crate::error::Result;
use crate::node::Preferences;
use crate::path::NodePath;
use dashmap::DashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// How loaded entries are applied to the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// First load of a freshly created node: values are installed without
    /// dirty marking or change events
    Initial,
    /// Reload during `sync`: values go through `put` so listeners observe
    /// external changes
    Sync,
}

/// Strategy for one root-level scope
///
/// # Contract
/// - `load_level_depth` counts segments from the root, so `2` names the
///   `/<scope>/<qualifier>` node; `None` means nothing is ever persisted
/// - `load` and `save` operate on the whole subtree of a load-level node
/// - a missing backing file loads as empty content, other I/O errors fail
pub trait ScopeProvider: Send + Sync + fmt::Debug {
    /// Scope name (first path segment)
    fn name(&self) -> &str;

    /// Segment count of load-level nodes
    fn load_level_depth(&self) -> Option<usize>;

    /// Storage address backing the load level containing `path`
    fn location(&self, path: &NodePath) -> Option<PathBuf>;

    /// Child names that exist in storage before being materialized
    fn known_children(&self, _path: &NodePath) -> Vec<String> {
        Vec::new()
    }

    /// Migrate an older per-component format into a load-level node
    ///
    /// Invoked once per load-level node, before the primary load.
    ///
    /// # Errors
    /// Returns error if the legacy source exists but cannot be read
    fn migrate_legacy(&self, _node: &Preferences) -> Result<()> {
        Ok(())
    }

    /// Load the subtree rooted at a load-level node
    ///
    /// # Errors
    /// Returns backing-store error on I/O failure other than a missing file
    fn load(&self, node: &Preferences, mode: LoadMode) -> Result<()>;

    /// Persist the subtree rooted at a load-level node
    ///
    /// # Errors
    /// Returns backing-store error on I/O failure
    fn save(&self, node: &Preferences) -> Result<()>;

    /// Delete the storage of a removed load-level node
    ///
    /// # Errors
    /// Returns backing-store error on I/O failure
    fn delete(&self, _path: &NodePath) -> Result<()> {
        Ok(())
    }

    /// Whether `flush` and `sync` do anything for this scope
    fn persists(&self) -> bool {
        true
    }
}

/// Instantiates providers for scope names the tree has not seen yet
pub trait ScopeResolver: Send + Sync + fmt::Debug {
    /// Provider for `name`, if one is available
    fn resolve(&self, name: &str) -> Option<Arc<dyn ScopeProvider>>;
}

/// Resolver that knows no scopes
#[derive(Debug, Default, Clone, Copy)]
pub struct NoScopes;

impl ScopeResolver for NoScopes {
    fn resolve(&self, _name: &str) -> Option<Arc<dyn ScopeProvider>> {
        None
    }
}

/// In-memory scope for root children without a registered provider
#[derive(Debug, Clone)]
pub struct TransientScope {
    name: String,
}

impl TransientScope {
    /// Create transient scope
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ScopeProvider for TransientScope {
    fn name(&self) -> &str {
        &self.name
    }

    fn load_level_depth(&self) -> Option<usize> {
        None
    }

    fn location(&self, _path: &NodePath) -> Option<PathBuf> {
        None
    }

    fn load(&self, _node: &Preferences, _mode: LoadMode) -> Result<()> {
        Ok(())
    }

    fn save(&self, _node: &Preferences) -> Result<()> {
        Ok(())
    }

    fn persists(&self) -> bool {
        false
    }
}

/// Load-once cache of load-level paths
///
/// Shared by every scope of a tree and injected at construction, so tests
/// can create a fresh tracker or [`reset`](Self::reset) between runs.
#[derive(Debug, Default)]
pub struct LoadTracker {
    loaded: DashSet<NodePath>,
}

impl LoadTracker {
    /// Create empty tracker
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a load-level node was already loaded
    #[inline]
    #[must_use]
    pub fn is_loaded(&self, path: &NodePath) -> bool {
        self.loaded.contains(path)
    }

    /// Record a load; returns `false` if it was already recorded
    #[inline]
    pub fn mark_loaded(&self, path: NodePath) -> bool {
        self.loaded.insert(path)
    }

    /// Forget `path` and every recorded path below it
    pub fn forget(&self, path: &NodePath) {
        self.loaded.retain(|loaded| !path.is_prefix_of(loaded));
    }

    /// Forget everything
    #[inline]
    pub fn reset(&self) {
        self.loaded.clear();
    }

    /// Number of recorded load levels
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    /// Check if nothing was loaded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn p(s: &str) -> NodePath {
        NodePath::from_str(s).unwrap()
    }

    #[test]
    fn tracker_marks_once() {
        let tracker = LoadTracker::new();
        assert!(tracker.mark_loaded(p("/instance/app")));
        assert!(!tracker.mark_loaded(p("/instance/app")));
        assert!(tracker.is_loaded(&p("/instance/app")));
    }

    #[test]
    fn tracker_forgets_subtree() {
        let tracker = LoadTracker::new();
        tracker.mark_loaded(p("/instance/app"));
        tracker.mark_loaded(p("/instance/other"));
        tracker.mark_loaded(p("/default/app"));
        tracker.forget(&p("/instance"));
        assert!(!tracker.is_loaded(&p("/instance/app")));
        assert!(!tracker.is_loaded(&p("/instance/other")));
        assert!(tracker.is_loaded(&p("/default/app")));
    }

    #[test]
    fn tracker_reset() {
        let tracker = LoadTracker::new();
        tracker.mark_loaded(p("/instance/app"));
        tracker.reset();
        assert!(tracker.is_empty());
    }

    #[test]
    fn no_scopes_resolves_nothing() {
        assert!(NoScopes.resolve("instance").is_none());
    }

    #[test]
    fn transient_scope_never_persists() {
        let scope = TransientScope::new("scratch");
        assert_eq!(scope.name(), "scratch");
        assert!(!scope.persists());
        assert_eq!(scope.load_level_depth(), None);
    }
}
