//! Preference node handle
//!
//! [`Preferences`] is a cheap, cloneable handle onto one node of a
//! [`PreferenceTree`](crate::PreferenceTree). Reads load a snapshot of the
//! node's [`PropertyMap`] without locking; writes swap in a new map under the
//! node lock, propagate the dirty flag and notify listeners after the lock is
//! released.
//!
//! # Locking
//! Locks are only ever taken parent before child. Navigating to a load-level
//! node loads its whole subtree while the parent lock is held, so no other
//! thread observes a half-loaded unit.

use crate::error::{PreferenceError, Result};
use crate::convert::{apply_properties, to_properties};
use crate::event::{
    dispatch, ListenerId, NodeChangeEvent, NodeChangeKind, PreferenceChangeEvent,
};
use crate::path::NodePath;
use crate::property_map::PropertyMap;
use crate::scope::{LoadMode, ScopeProvider};
use crate::string_pool::StringPool;
use crate::tree::{ChildSlot, NodeData, Orphan, TreeInner};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Pre-order traversal callback for [`Preferences::accept`]
///
/// Returning `false` skips the children of the visited node.
pub trait PreferenceVisitor {
    /// Visit one node
    ///
    /// # Errors
    /// An error aborts the traversal and is returned from `accept`
    fn visit(&mut self, node: &Preferences) -> Result<bool>;
}

impl<F> PreferenceVisitor for F
where
    F: FnMut(&Preferences) -> Result<bool>,
{
    fn visit(&mut self, node: &Preferences) -> Result<bool> {
        self(node)
    }
}

/// Handle onto one node of a preference tree
#[derive(Clone)]
pub struct Preferences {
    tree: Arc<TreeInner>,
    data: Arc<NodeData>,
}

impl fmt::Debug for Preferences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Preferences")
            .field(&self.data.absolute)
            .finish()
    }
}

impl PartialEq for Preferences {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.tree, &other.tree) && self.data.id == other.data.id
    }
}

impl Eq for Preferences {}

impl Hash for Preferences {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.data.id.hash(state);
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(PreferenceError::InvalidKey(key.to_string()));
    }
    Ok(())
}

impl Preferences {
    pub(crate) fn from_parts(tree: Arc<TreeInner>, data: Arc<NodeData>) -> Self {
        Self { tree, data }
    }

    #[inline]
    fn wrap(&self, data: Arc<NodeData>) -> Self {
        Self::from_parts(Arc::clone(&self.tree), data)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.data.is_removed() {
            return Err(PreferenceError::removed(&self.data.absolute));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    /// Node name, the last path segment (empty for the root)
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        self.data.path.name()
    }

    /// Absolute path string (`/` for the root)
    #[inline]
    #[must_use]
    pub fn absolute_path(&self) -> &str {
        &self.data.absolute
    }

    /// Absolute path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &NodePath {
        &self.data.path
    }

    /// Scope name (first path segment)
    #[inline]
    #[must_use]
    pub fn scope_name(&self) -> Option<&str> {
        self.data.path.scope()
    }

    /// Qualifier (second path segment)
    #[inline]
    #[must_use]
    pub fn qualifier(&self) -> Option<&str> {
        self.data.path.qualifier()
    }

    /// Provider of this node's scope (`None` for the root)
    #[must_use]
    pub fn scope(&self) -> Option<Arc<dyn ScopeProvider>> {
        self.data.scope.clone()
    }

    /// Parent node (`None` for the root)
    ///
    /// # Errors
    /// Returns error if the node was removed
    pub fn parent(&self) -> Result<Option<Self>> {
        self.ensure_live()?;
        Ok(self.tree.parent_of(&self.data).map(|p| self.wrap(p)))
    }

    /// Check if the node or a descendant has unsaved changes
    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.data.is_dirty()
    }

    /// Check if the node was removed
    #[inline]
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.data.is_removed()
    }

    // ------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------

    /// Value for key, `None` if absent
    ///
    /// # Errors
    /// Returns error if the node was removed
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.ensure_live()?;
        Ok(self.data.properties.load().get(key).map(str::to_string))
    }

    /// Value for key, or `default` if absent
    ///
    /// # Errors
    /// Returns error if the node was removed
    pub fn get_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self.get(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// Set a value
    ///
    /// Writing the value already stored is a no-op: no dirty marking, no
    /// event.
    ///
    /// # Errors
    /// Returns error if the key is empty or the node was removed
    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        self.update(key, Some(value))
    }

    /// Remove a value; removing an absent key is a no-op
    ///
    /// # Errors
    /// Returns error if the key is empty or the node was removed
    pub fn remove(&self, key: &str) -> Result<()> {
        self.update(key, None)
    }

    /// Remove every key, notifying once per key
    ///
    /// # Errors
    /// Returns error if the node was removed
    pub fn clear(&self) -> Result<()> {
        for key in self.keys()? {
            self.remove(&key)?;
        }
        Ok(())
    }

    /// Keys in order
    ///
    /// # Errors
    /// Returns error if the node was removed
    pub fn keys(&self) -> Result<Vec<String>> {
        self.ensure_live()?;
        Ok(self.data.properties.load().keys())
    }

    /// Current property map; stays valid across later writes
    ///
    /// # Errors
    /// Returns error if the node was removed
    pub fn snapshot(&self) -> Result<Arc<PropertyMap>> {
        self.ensure_live()?;
        Ok(self.data.properties.load_full())
    }

    fn update(&self, key: &str, value: Option<&str>) -> Result<()> {
        validate_key(key)?;
        let (old_value, listeners) = {
            let state = self.data.state.lock();
            self.ensure_live()?;
            let current = self.data.properties.load();
            let old = current.get(key);
            if old == value {
                return Ok(());
            }
            let old_value = old.map(str::to_string);
            let next = match value {
                Some(v) => current.insert(key, v),
                None => current.remove(key),
            };
            self.data.properties.store(Arc::new(next));
            (old_value, state.preference_listeners.snapshot())
        };

        self.tree.make_dirty(&self.data);

        if !listeners.is_empty() {
            let event = PreferenceChangeEvent {
                node: self.clone(),
                key: key.to_string(),
                old_value,
                new_value: value.map(str::to_string),
            };
            dispatch(&listeners, &event, || {
                format!("preference change {}:{key}", self.data.absolute)
            });
        }
        Ok(())
    }

    /// Merge entries without dirty marking or events
    pub(crate) fn install<I, K, V>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let _state = self.data.state.lock();
        self.ensure_live()?;
        let mut map = PropertyMap::clone(&self.data.properties.load());
        for (key, value) in entries {
            validate_key(key.as_ref())?;
            map = map.insert(key.as_ref(), value.as_ref());
        }
        self.data.properties.store(Arc::new(map));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Typed values
    // ------------------------------------------------------------------

    /// Parsed value, or `default` if absent or unparseable
    ///
    /// # Errors
    /// Returns error if the node was removed
    pub fn get_parsed<T: FromStr>(&self, key: &str, default: T) -> Result<T> {
        Ok(self
            .get(key)?
            .and_then(|v| v.parse().ok())
            .unwrap_or(default))
    }

    /// Boolean value; only `true` and `false` (any case) parse
    ///
    /// # Errors
    /// Returns error if the node was removed
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        Ok(self.get(key)?.map_or(default, |v| parse_bool(&v, default)))
    }

    /// Set a boolean value
    ///
    /// # Errors
    /// Returns error if the key is empty or the node was removed
    pub fn put_bool(&self, key: &str, value: bool) -> Result<()> {
        self.put(key, if value { "true" } else { "false" })
    }

    /// `i32` value
    ///
    /// # Errors
    /// Returns error if the node was removed
    pub fn get_i32(&self, key: &str, default: i32) -> Result<i32> {
        self.get_parsed(key, default)
    }

    /// Set an `i32` value
    ///
    /// # Errors
    /// Returns error if the key is empty or the node was removed
    pub fn put_i32(&self, key: &str, value: i32) -> Result<()> {
        self.put(key, &value.to_string())
    }

    /// `i64` value
    ///
    /// # Errors
    /// Returns error if the node was removed
    pub fn get_i64(&self, key: &str, default: i64) -> Result<i64> {
        self.get_parsed(key, default)
    }

    /// Set an `i64` value
    ///
    /// # Errors
    /// Returns error if the key is empty or the node was removed
    pub fn put_i64(&self, key: &str, value: i64) -> Result<()> {
        self.put(key, &value.to_string())
    }

    /// `f32` value
    ///
    /// # Errors
    /// Returns error if the node was removed
    pub fn get_f32(&self, key: &str, default: f32) -> Result<f32> {
        self.get_parsed(key, default)
    }

    /// Set an `f32` value
    ///
    /// # Errors
    /// Returns error if the key is empty or the node was removed
    pub fn put_f32(&self, key: &str, value: f32) -> Result<()> {
        self.put(key, &value.to_string())
    }

    /// `f64` value
    ///
    /// # Errors
    /// Returns error if the node was removed
    pub fn get_f64(&self, key: &str, default: f64) -> Result<f64> {
        self.get_parsed(key, default)
    }

    /// Set an `f64` value
    ///
    /// # Errors
    /// Returns error if the key is empty or the node was removed
    pub fn put_f64(&self, key: &str, value: f64) -> Result<()> {
        self.put(key, &value.to_string())
    }

    /// Binary value stored as base64 text
    ///
    /// # Errors
    /// Returns error if the node was removed
    pub fn get_bytes(&self, key: &str, default: &[u8]) -> Result<Vec<u8>> {
        Ok(self
            .get(key)?
            .and_then(|v| STANDARD.decode(v.as_bytes()).ok())
            .unwrap_or_else(|| default.to_vec()))
    }

    /// Set a binary value, stored as base64 text
    ///
    /// # Errors
    /// Returns error if the key is empty or the node was removed
    pub fn put_bytes(&self, key: &str, value: &[u8]) -> Result<()> {
        self.put(key, &STANDARD.encode(value))
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Names of children, including ones known in storage but not yet
    /// materialized
    ///
    /// # Errors
    /// Returns error if the node was removed
    pub fn children_names(&self) -> Result<Vec<String>> {
        let state = self.data.state.lock();
        self.ensure_live()?;
        Ok(state.children.keys().cloned().collect())
    }

    /// Navigate to a node, creating missing ones
    ///
    /// Absolute paths start at the root, relative ones at this node and the
    /// empty path is this node. A node-added event fires once per newly
    /// created node.
    ///
    /// # Errors
    /// Returns error for an invalid path or if the node was removed
    pub fn node(&self, path: &str) -> Result<Self> {
        self.ensure_live()?;
        let (start, target) = self.locate(path)?;
        let mut current = start;
        for segment in &target.segments()[current.data.depth()..] {
            current = current
                .child(segment, true)?
                .ok_or_else(|| PreferenceError::removed(current.absolute_path()))?;
        }
        Ok(current)
    }

    /// Check if a node exists, without creating it
    ///
    /// On a removed node `node_exists("")` returns `false` instead of
    /// failing.
    ///
    /// # Errors
    /// Returns error for an invalid path or if the node was removed
    pub fn node_exists(&self, path: &str) -> Result<bool> {
        if path.is_empty() {
            return Ok(!self.is_removed());
        }
        self.ensure_live()?;
        let (start, target) = self.locate(path)?;
        let mut current = start;
        for segment in &target.segments()[current.data.depth()..] {
            match current.child(segment, false)? {
                Some(child) => current = child,
                None => return Ok(false),
            }
        }
        Ok(true)
    }

    fn locate(&self, path: &str) -> Result<(Self, NodePath)> {
        let target = self.data.path.resolve(path)?;
        let start = if path.starts_with('/') {
            self.wrap(Arc::clone(&self.tree.root))
        } else {
            self.clone()
        };
        Ok((start, target))
    }

    /// Child by name, materializing placeholders; creates it if `create`
    fn child(&self, name: &str, create: bool) -> Result<Option<Self>> {
        let (child, added) = {
            let mut state = self.data.state.lock();
            self.ensure_live()?;
            let added = match state.children.get(name).copied() {
                Some(ChildSlot::Node(id)) => {
                    if let Some(existing) = self.tree.get(id) {
                        return Ok(Some(self.wrap(existing)));
                    }
                    false
                }
                Some(ChildSlot::Placeholder) => false,
                None if !create => return Ok(None),
                None => true,
            };

            let scope = match &self.data.scope {
                Some(scope) => Arc::clone(scope),
                None => self.tree.provider_for(name),
            };
            let path = self.data.path.child(name)?;
            let data = self.tree.allocate(path, self.data.id, Arc::clone(&scope));
            state
                .children
                .insert(name.to_string(), ChildSlot::Node(data.id));
            let child = self.wrap(data);
            child.add_placeholders(scope.as_ref());
            child.initialize(&scope);
            (child, added)
        };

        if added {
            self.fire_node_event(name, NodeChangeKind::Added);
        }
        Ok(Some(child))
    }

    fn add_placeholders(&self, scope: &dyn ScopeProvider) {
        let names = scope.known_children(&self.data.path);
        if names.is_empty() {
            return;
        }
        let mut state = self.data.state.lock();
        for name in names {
            if !name.is_empty() && !name.contains('/') {
                state.children.entry(name).or_insert(ChildSlot::Placeholder);
            }
        }
    }

    /// Load a freshly created load-level node once per process
    fn initialize(&self, scope: &Arc<dyn ScopeProvider>) {
        if !self.data.is_load_level() || self.tree.tracker.is_loaded(&self.data.path) {
            return;
        }
        if self.tree.is_orphaned(&self.data.path) {
            // storage is about to be deleted; start empty
            self.tree.tracker.mark_loaded(self.data.path.clone());
            return;
        }
        if self.data.loading.swap(true, Ordering::AcqRel) {
            return;
        }
        let outcome = self.load_unit(scope);
        self.data.loading.store(false, Ordering::Release);

        match outcome.and_then(|()| self.share_strings(&mut StringPool::new())) {
            Ok(()) => {}
            Err(err) => tracing::error!(
                path = %self.data.absolute,
                scope = scope.name(),
                error = %err,
                "failed to load preferences"
            ),
        }
    }

    fn load_unit(&self, scope: &Arc<dyn ScopeProvider>) -> Result<()> {
        scope.migrate_legacy(self)?;
        scope.load(self, LoadMode::Initial)?;
        self.tree.tracker.mark_loaded(self.data.path.clone());
        tracing::debug!(path = %self.data.absolute, scope = scope.name(), "loaded preferences");
        if self.is_dirty() {
            self.flush()?;
        }
        Ok(())
    }

    fn materialized_children(&self) -> Vec<Self> {
        self.tree
            .materialized_children(&self.data)
            .into_iter()
            .map(|data| self.wrap(data))
            .collect()
    }

    /// Ancestor-or-self that is the unit of load and save
    ///
    /// `None` above the load level or for scopes without one.
    ///
    /// # Errors
    /// Returns error if the node was removed
    pub fn load_level(&self) -> Result<Option<Self>> {
        self.ensure_live()?;
        Ok(self.tree.load_level_of(&self.data).map(|data| self.wrap(data)))
    }

    /// Pre-order traversal of this node and its descendants
    ///
    /// # Errors
    /// Returns the first error raised by the visitor, or an error if the node
    /// was removed
    pub fn accept<V>(&self, visitor: &mut V) -> Result<()>
    where
        V: PreferenceVisitor + ?Sized,
    {
        self.ensure_live()?;
        if !visitor.visit(self)? {
            return Ok(());
        }
        for name in self.children_names()? {
            if let Some(child) = self.child(&name, false)? {
                child.accept(visitor)?;
            }
        }
        Ok(())
    }

    /// Re-intern the strings of this subtree through `pool`
    ///
    /// # Errors
    /// Returns error if the node was removed
    pub fn share_strings(&self, pool: &mut StringPool) -> Result<()> {
        {
            let _state = self.data.state.lock();
            self.ensure_live()?;
            let interned = self.data.properties.load().intern(pool);
            self.data.properties.store(Arc::new(interned));
        }
        for child in self.materialized_children() {
            child.share_strings(pool)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------

    /// Remove this node and its subtree
    ///
    /// Keys are cleared first (one event each), then children are removed
    /// depth-first. Removing a load-level node schedules deletion of its
    /// storage on the next flush of an ancestor.
    ///
    /// # Errors
    /// Returns error for the root or if the node was already removed
    pub fn remove_node(&self) -> Result<()> {
        self.ensure_live()?;
        let parent = self
            .tree
            .parent_of(&self.data)
            .ok_or(PreferenceError::Unsupported("the root node cannot be removed"))?;
        self.clear()?;
        for name in self.children_names()? {
            if let Some(child) = self.child(&name, false)? {
                child.remove_node()?;
            }
        }

        let name = self.name().to_string();
        {
            let mut state = parent.state.lock();
            if self.data.removed.swap(true, Ordering::AcqRel) {
                return Err(PreferenceError::removed(&self.data.absolute));
            }
            state.children.remove(&name);
        }
        {
            let mut state = self.data.state.lock();
            state.children.clear();
            state.preference_listeners.clear();
        }
        self.tree.nodes.remove(&self.data.id);
        self.tree.tracker.forget(&self.data.path);

        if let Some(scope) = &self.data.scope {
            if self.data.is_load_level() && scope.persists() {
                self.tree.orphans.lock().push(Orphan {
                    path: self.data.path.clone(),
                    scope: Arc::clone(scope),
                });
            }
        }

        let parent = self.wrap(parent);
        parent.tree.make_dirty(&parent.data);
        parent.fire_node_event(&name, NodeChangeKind::Removed);
        self.data.state.lock().node_listeners.clear();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Persist unsaved changes
    ///
    /// Below the load level the enclosing load-level node is saved; above it
    /// pending deletions are applied and dirty children are flushed.
    /// Non-persisting scopes only mark the subtree clean.
    ///
    /// # Errors
    /// Returns the first backing-store failure
    pub fn flush(&self) -> Result<()> {
        self.ensure_live()?;
        let Some(scope) = self.data.scope.clone() else {
            return self.flush_children();
        };
        let Some(depth) = scope.load_level_depth().filter(|_| scope.persists()) else {
            self.clear_dirty();
            return Ok(());
        };
        if self.data.depth() >= depth {
            match self.load_level()? {
                Some(unit) => unit.save_unit(&scope),
                None => Ok(()),
            }
        } else {
            self.flush_children()
        }
    }

    fn flush_children(&self) -> Result<()> {
        let mut first_error = self.apply_orphans().err();
        let mut clean = first_error.is_none();
        for child in self.materialized_children() {
            if !child.is_dirty() {
                continue;
            }
            if let Err(err) = child.flush() {
                first_error.get_or_insert(err);
            }
            clean &= !child.is_dirty();
        }
        if clean {
            self.data.dirty.store(false, Ordering::Release);
        }
        first_error.map_or(Ok(()), Err)
    }

    fn apply_orphans(&self) -> Result<()> {
        let orphans = self.tree.take_orphans(&self.data.path);
        let mut first_error = None;
        let mut failed = Vec::new();
        for orphan in orphans {
            match orphan.scope.delete(&orphan.path) {
                Ok(()) => tracing::debug!(path = %orphan.path, "deleted preference storage"),
                Err(err) => {
                    tracing::error!(path = %orphan.path, error = %err, "failed to delete preference storage");
                    first_error.get_or_insert(err);
                    failed.push(orphan);
                }
            }
        }
        self.tree.orphans.lock().extend(failed);
        first_error.map_or(Ok(()), Err)
    }

    fn save_unit(&self, scope: &Arc<dyn ScopeProvider>) -> Result<()> {
        // storage of a removed predecessor goes before anything is written
        self.apply_orphans()?;
        if !self.is_dirty() {
            return Ok(());
        }
        if !self.tree.tracker.is_loaded(&self.data.path) {
            self.reload_before_save(scope)?;
        }
        self.clear_dirty();
        if let Err(err) = scope.save(self) {
            tracing::error!(
                path = %self.data.absolute,
                scope = scope.name(),
                error = %err,
                "failed to save preferences"
            );
            self.tree.make_dirty(&self.data);
            return Err(err);
        }
        tracing::debug!(path = %self.data.absolute, scope = scope.name(), "saved preferences");
        Ok(())
    }

    /// Merge stored values under unsaved ones after a failed first load
    fn reload_before_save(&self, scope: &Arc<dyn ScopeProvider>) -> Result<()> {
        let pending = to_properties(self)?;
        let outcome = scope
            .migrate_legacy(self)
            .and_then(|()| scope.load(self, LoadMode::Initial))
            .and_then(|()| apply_properties(self, &pending, LoadMode::Initial));
        if let Err(err) = outcome {
            tracing::error!(
                path = %self.data.absolute,
                scope = scope.name(),
                error = %err,
                "preferences were never loaded; refusing to overwrite storage"
            );
            return Err(err);
        }
        self.tree.tracker.mark_loaded(self.data.path.clone());
        tracing::info!(
            path = %self.data.absolute,
            scope = scope.name(),
            "loaded preferences before saving"
        );
        Ok(())
    }

    fn clear_dirty(&self) {
        self.data.dirty.store(false, Ordering::Release);
        for child in self.materialized_children() {
            child.clear_dirty();
        }
    }

    /// Reload from storage, then flush
    ///
    /// Values changed externally are applied through [`put`](Self::put), so
    /// listeners observe them.
    ///
    /// # Errors
    /// Returns the first backing-store failure
    pub fn sync(&self) -> Result<()> {
        self.ensure_live()?;
        let Some(scope) = self.data.scope.clone() else {
            return self.sync_children();
        };
        let Some(depth) = scope.load_level_depth().filter(|_| scope.persists()) else {
            self.clear_dirty();
            return Ok(());
        };
        if self.data.depth() >= depth {
            match self.load_level()? {
                Some(unit) => unit.sync_unit(&scope),
                None => Ok(()),
            }
        } else {
            self.add_placeholders(scope.as_ref());
            self.sync_children()
        }
    }

    fn sync_children(&self) -> Result<()> {
        let mut first_error = self.apply_orphans().err();
        let mut clean = first_error.is_none();
        for child in self.materialized_children() {
            if let Err(err) = child.sync() {
                first_error.get_or_insert(err);
            }
            clean &= !child.is_dirty();
        }
        if clean {
            self.data.dirty.store(false, Ordering::Release);
        }
        first_error.map_or(Ok(()), Err)
    }

    fn sync_unit(&self, scope: &Arc<dyn ScopeProvider>) -> Result<()> {
        // never reload storage that is waiting to be deleted
        self.apply_orphans()?;
        if let Err(err) = scope.load(self, LoadMode::Sync) {
            tracing::error!(
                path = %self.data.absolute,
                scope = scope.name(),
                error = %err,
                "failed to reload preferences"
            );
            return Err(err);
        }
        self.tree.tracker.mark_loaded(self.data.path.clone());
        self.save_unit(scope)
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    /// Register a preference-change listener
    ///
    /// # Errors
    /// Returns error if the node was removed
    pub fn add_preference_change_listener<F>(&self, listener: F) -> Result<ListenerId>
    where
        F: Fn(&PreferenceChangeEvent) + Send + Sync + 'static,
    {
        let mut state = self.data.state.lock();
        self.ensure_live()?;
        Ok(state.preference_listeners.add(Arc::new(listener)))
    }

    /// Unregister a preference-change listener
    ///
    /// # Errors
    /// Returns error if the node was removed
    pub fn remove_preference_change_listener(&self, id: ListenerId) -> Result<bool> {
        let mut state = self.data.state.lock();
        self.ensure_live()?;
        Ok(state.preference_listeners.remove(id))
    }

    /// Register a node-change listener
    ///
    /// # Errors
    /// Returns error if the node was removed
    pub fn add_node_change_listener<F>(&self, listener: F) -> Result<ListenerId>
    where
        F: Fn(&NodeChangeEvent) + Send + Sync + 'static,
    {
        let mut state = self.data.state.lock();
        self.ensure_live()?;
        Ok(state.node_listeners.add(Arc::new(listener)))
    }

    /// Unregister a node-change listener
    ///
    /// # Errors
    /// Returns error if the node was removed
    pub fn remove_node_change_listener(&self, id: ListenerId) -> Result<bool> {
        let mut state = self.data.state.lock();
        self.ensure_live()?;
        Ok(state.node_listeners.remove(id))
    }

    pub(crate) fn fire_node_event(&self, child: &str, kind: NodeChangeKind) {
        let listeners = self.data.state.lock().node_listeners.snapshot();
        if listeners.is_empty() {
            return;
        }
        let event = NodeChangeEvent {
            parent: self.clone(),
            child: child.to_string(),
            kind,
        };
        dispatch(&listeners, &event, || {
            format!("node {kind:?} {}/{child}", self.data.absolute)
        });
    }
}

fn parse_bool(value: &str, default: bool) -> bool {
    if value.eq_ignore_ascii_case("true") {
        true
    } else if value.eq_ignore_ascii_case("false") {
        false
    } else {
        default
    }
}
