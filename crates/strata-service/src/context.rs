//! Scope contexts
//!
//! A context supplies the node a multi-scope lookup reads for one scope
//! name. Passing a context overrides the default `/<scope>/<qualifier>`
//! placement, e.g. to read a project scope rooted below a workspace node.

use std::fmt;
use strata_core::{PreferenceTree, Preferences, Result};

/// Supplies the node for one scope during a lookup
pub trait ScopeContext: Send + Sync + fmt::Debug {
    /// Scope name this context answers for
    fn name(&self) -> &str;

    /// Node holding the preferences of `qualifier` in this scope
    ///
    /// # Errors
    /// Returns error if the node cannot be navigated to
    fn node(&self, qualifier: &str) -> Result<Preferences>;
}

/// Context that reads `/<name>/<qualifier>` from a tree
#[derive(Debug, Clone)]
pub struct RootScopeContext {
    tree: PreferenceTree,
    name: String,
}

impl RootScopeContext {
    /// Create context for a root-level scope
    #[must_use]
    pub fn new(tree: PreferenceTree, name: impl Into<String>) -> Self {
        Self { tree, name: name.into() }
    }
}

impl ScopeContext for RootScopeContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn node(&self, qualifier: &str) -> Result<Preferences> {
        self.tree.root().node(&self.name)?.node(qualifier)
    }
}

/// Context that reads `<base>/<qualifier>` for a scope name
#[derive(Debug, Clone)]
pub struct NodeScopeContext {
    name: String,
    base: Preferences,
}

impl NodeScopeContext {
    /// Answer lookups of scope `name` from below `base`
    #[must_use]
    pub fn new(name: impl Into<String>, base: Preferences) -> Self {
        Self { name: name.into(), base }
    }

    /// Node qualifiers are resolved against
    #[must_use]
    pub fn base(&self) -> &Preferences {
        &self.base
    }
}

impl ScopeContext for NodeScopeContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn node(&self, qualifier: &str) -> Result<Preferences> {
        self.base.node(qualifier)
    }
}
