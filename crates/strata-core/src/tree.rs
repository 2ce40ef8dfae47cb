//! Node arena and tree root
//!
//! Nodes live in an arena keyed by [`NodeId`]. Each node stores its parent
//! as a plain id (non-owning) and its children as a name → id table, so the
//! tree has no reference cycles. [`PreferenceTree`] owns the arena, the
//! registered scope providers and the injected [`LoadTracker`].

use crate::error::Result;
use crate::event::{ListenerList, NodeChangeEvent, NodeChangeKind, PreferenceChangeEvent};
use crate::node::Preferences;
use crate::path::NodePath;
use crate::property_map::PropertyMap;
use crate::scope::{LoadTracker, NoScopes, ScopeProvider, ScopeResolver, TransientScope};
use arc_swap::ArcSwap;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

pub(crate) type PreferenceCallback = dyn Fn(&PreferenceChangeEvent) + Send + Sync;
pub(crate) type NodeCallback = dyn Fn(&NodeChangeEvent) + Send + Sync;

/// Stable handle of a node in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

/// Entry in a node's child table
#[derive(Debug, Clone, Copy)]
pub(crate) enum ChildSlot {
    /// Known to exist in storage, not materialized yet
    Placeholder,
    /// Materialized node
    Node(NodeId),
}

/// Removed load level whose storage awaits deletion
#[derive(Debug, Clone)]
pub(crate) struct Orphan {
    pub(crate) path: NodePath,
    pub(crate) scope: Arc<dyn ScopeProvider>,
}

/// State guarded by the per-node lock
#[derive(Debug, Default)]
pub(crate) struct NodeState {
    pub(crate) children: BTreeMap<String, ChildSlot>,
    pub(crate) node_listeners: ListenerList<NodeCallback>,
    pub(crate) preference_listeners: ListenerList<PreferenceCallback>,
}

/// One node of the tree
#[derive(Debug)]
pub(crate) struct NodeData {
    pub(crate) id: NodeId,
    pub(crate) path: NodePath,
    /// Absolute path string, computed once
    pub(crate) absolute: String,
    pub(crate) parent: Option<NodeId>,
    /// `None` only for the root
    pub(crate) scope: Option<Arc<dyn ScopeProvider>>,
    /// Copy-on-write map; readers load a snapshot without taking `state`
    pub(crate) properties: ArcSwap<PropertyMap>,
    pub(crate) dirty: AtomicBool,
    pub(crate) removed: AtomicBool,
    pub(crate) loading: AtomicBool,
    pub(crate) state: Mutex<NodeState>,
}

impl NodeData {
    fn new(
        id: NodeId,
        path: NodePath,
        parent: Option<NodeId>,
        scope: Option<Arc<dyn ScopeProvider>>,
    ) -> Self {
        Self {
            id,
            absolute: path.to_string(),
            path,
            parent,
            scope,
            properties: ArcSwap::from_pointee(PropertyMap::new()),
            dirty: AtomicBool::new(false),
            removed: AtomicBool::new(false),
            loading: AtomicBool::new(false),
            state: Mutex::new(NodeState::default()),
        }
    }

    #[inline]
    pub(crate) fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn depth(&self) -> usize {
        self.path.len()
    }

    /// Load-level depth of this node's scope
    pub(crate) fn load_depth(&self) -> Option<usize> {
        self.scope.as_ref().and_then(|s| s.load_level_depth())
    }

    pub(crate) fn is_load_level(&self) -> bool {
        self.load_depth() == Some(self.depth())
    }
}

/// Shared tree state behind every [`Preferences`] handle
pub(crate) struct TreeInner {
    pub(crate) nodes: DashMap<NodeId, Arc<NodeData>>,
    next_id: AtomicU64,
    pub(crate) root: Arc<NodeData>,
    pub(crate) tracker: Arc<LoadTracker>,
    resolver: Arc<dyn ScopeResolver>,
    scopes: RwLock<HashMap<String, Arc<dyn ScopeProvider>>>,
    /// Deleted on the next flush of an ancestor
    pub(crate) orphans: Mutex<Vec<Orphan>>,
}

impl fmt::Debug for TreeInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeInner")
            .field("nodes", &self.nodes.len())
            .field("scopes", &self.scopes.read().keys().collect::<Vec<_>>())
            .field("orphans", &self.orphans.lock().len())
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl TreeInner {
    fn new(tracker: Arc<LoadTracker>, resolver: Arc<dyn ScopeResolver>) -> Self {
        let root = Arc::new(NodeData::new(NodeId(0), NodePath::root(), None, None));
        let nodes = DashMap::new();
        nodes.insert(root.id, Arc::clone(&root));
        Self {
            nodes,
            next_id: AtomicU64::new(1),
            root,
            tracker,
            resolver,
            scopes: RwLock::new(HashMap::new()),
            orphans: Mutex::new(Vec::new()),
        }
    }

    /// Allocate a node and register it in the arena
    pub(crate) fn allocate(
        &self,
        path: NodePath,
        parent: NodeId,
        scope: Arc<dyn ScopeProvider>,
    ) -> Arc<NodeData> {
        let id = NodeId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let node = Arc::new(NodeData::new(id, path, Some(parent), Some(scope)));
        self.nodes.insert(id, Arc::clone(&node));
        node
    }

    #[inline]
    pub(crate) fn get(&self, id: NodeId) -> Option<Arc<NodeData>> {
        self.nodes.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    #[inline]
    pub(crate) fn parent_of(&self, node: &NodeData) -> Option<Arc<NodeData>> {
        node.parent.and_then(|id| self.get(id))
    }

    /// Provider for a root child, resolving and caching it on first use
    pub(crate) fn provider_for(&self, name: &str) -> Arc<dyn ScopeProvider> {
        if let Some(provider) = self.scopes.read().get(name) {
            return Arc::clone(provider);
        }
        let provider = self.resolver.resolve(name).unwrap_or_else(|| {
            tracing::debug!(scope = name, "no provider for scope; using transient scope");
            Arc::new(TransientScope::new(name))
        });
        let mut scopes = self.scopes.write();
        Arc::clone(scopes.entry(name.to_string()).or_insert(provider))
    }

    /// Mark `node` and its ancestors dirty
    ///
    /// Stops at the first ancestor that is already dirty or removed.
    pub(crate) fn make_dirty(&self, node: &Arc<NodeData>) {
        let mut current = Some(Arc::clone(node));
        while let Some(n) = current {
            if n.is_removed() || n.dirty.swap(true, Ordering::AcqRel) {
                break;
            }
            current = self.parent_of(&n);
        }
    }

    /// Ancestor-or-self at the scope's load-level depth
    pub(crate) fn load_level_of(&self, node: &Arc<NodeData>) -> Option<Arc<NodeData>> {
        let depth = node.load_depth()?;
        if node.depth() < depth {
            return None;
        }
        let mut current = Arc::clone(node);
        while current.depth() > depth {
            current = self.parent_of(&current)?;
        }
        Some(current)
    }

    /// Check if storage at `path` is scheduled for deletion
    pub(crate) fn is_orphaned(&self, path: &NodePath) -> bool {
        self.orphans.lock().iter().any(|orphan| &orphan.path == path)
    }

    /// Take the orphans at or below `path`
    pub(crate) fn take_orphans(&self, path: &NodePath) -> Vec<Orphan> {
        let mut orphans = self.orphans.lock();
        let (taken, kept) = orphans
            .drain(..)
            .partition(|orphan| path.is_prefix_of(&orphan.path));
        *orphans = kept;
        taken
    }

    /// Materialized children in name order
    pub(crate) fn materialized_children(&self, node: &NodeData) -> Vec<Arc<NodeData>> {
        let ids: Vec<NodeId> = node
            .state
            .lock()
            .children
            .values()
            .filter_map(|slot| match slot {
                ChildSlot::Node(id) => Some(*id),
                ChildSlot::Placeholder => None,
            })
            .collect();
        ids.into_iter().filter_map(|id| self.get(id)).collect()
    }

    /// Mark a subtree removed and drop it from the arena
    ///
    /// No keys are cleared and no events fire; used when a whole scope is
    /// detached.
    pub(crate) fn discard_subtree(&self, node: &Arc<NodeData>) {
        for child in self.materialized_children(node) {
            self.discard_subtree(&child);
        }
        node.removed.store(true, Ordering::Release);
        {
            let mut state = node.state.lock();
            state.node_listeners.clear();
            state.preference_listeners.clear();
        }
        self.nodes.remove(&node.id);
    }
}

/// Hierarchical, multi-scope preference tree
///
/// Cloning is cheap; clones share the same tree.
///
/// # Example
/// ```
/// use strata_core::PreferenceTree;
///
/// let tree = PreferenceTree::new();
/// let node = tree.root().node("scratch/app").unwrap();
/// node.put("color", "red").unwrap();
/// assert_eq!(node.get("color").unwrap().as_deref(), Some("red"));
/// ```
#[derive(Debug, Clone)]
pub struct PreferenceTree {
    inner: Arc<TreeInner>,
}

impl PreferenceTree {
    /// Create a tree with a fresh load tracker and no scope resolver
    #[must_use]
    pub fn new() -> Self {
        Self::with_resolver(Arc::new(LoadTracker::new()), Arc::new(NoScopes))
    }

    /// Create a tree with an injected tracker and scope resolver
    #[must_use]
    pub fn with_resolver(tracker: Arc<LoadTracker>, resolver: Arc<dyn ScopeResolver>) -> Self {
        Self {
            inner: Arc::new(TreeInner::new(tracker, resolver)),
        }
    }

    /// Root node (`/`)
    #[inline]
    #[must_use]
    pub fn root(&self) -> Preferences {
        Preferences::from_parts(Arc::clone(&self.inner), Arc::clone(&self.inner.root))
    }

    /// Node at an absolute path, creating missing nodes
    ///
    /// # Errors
    /// Returns error for an invalid path
    pub fn node(&self, path: &str) -> Result<Preferences> {
        self.root().node(path)
    }

    /// Load-once cache shared by this tree's scopes
    #[inline]
    #[must_use]
    pub fn tracker(&self) -> &Arc<LoadTracker> {
        &self.inner.tracker
    }

    /// Register a scope provider and create its root-level node
    ///
    /// Replaces any previous provider of the same name; an existing scope
    /// node keeps the provider it was created with.
    ///
    /// # Errors
    /// Returns error if the scope name is not a valid path segment
    pub fn register_scope(&self, provider: Arc<dyn ScopeProvider>) -> Result<Preferences> {
        let name = provider.name().to_string();
        self.inner
            .scopes
            .write()
            .insert(name.clone(), Arc::clone(&provider));
        tracing::info!(scope = %name, "registered scope");
        self.root().node(&name)
    }

    /// Unregister a scope and detach its subtree without touching storage
    ///
    /// Returns `false` if the scope was not known.
    pub fn unregister_scope(&self, name: &str) -> bool {
        let provider = self.inner.scopes.write().remove(name);
        let slot = self.inner.root.state.lock().children.remove(name);
        let node = match slot {
            Some(ChildSlot::Node(id)) => self.inner.get(id),
            _ => None,
        };
        if let Some(node) = &node {
            self.inner.discard_subtree(node);
            self.inner.tracker.forget(&node.path);
            self.root().fire_node_event(name, NodeChangeKind::Removed);
        }
        let known = provider.is_some() || slot.is_some();
        if known {
            tracing::info!(scope = name, "unregistered scope");
        }
        known
    }

    /// Names of scopes with a registered or resolved provider
    #[must_use]
    pub fn scope_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.scopes.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for PreferenceTree {
    fn default() -> Self {
        Self::new()
    }
}
