//! Change events and listener registries
//!
//! Two listener kinds per node: node-change (child added or removed) and
//! preference-change (key added, removed or changed). Registries are mutated
//! under the owning node's lock; dispatch works on a snapshot taken under
//! that lock and runs after it is released. A panicking listener is logged
//! and skipped, the remaining listeners still run.

use crate::node::Preferences;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handle returned on registration, used to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A key was added, removed or changed
///
/// `old_value: None` marks an addition, `new_value: None` a removal.
#[derive(Debug, Clone)]
pub struct PreferenceChangeEvent {
    /// Node owning the key
    pub node: Preferences,
    /// Key that changed
    pub key: String,
    /// Previous value
    pub old_value: Option<String>,
    /// Current value
    pub new_value: Option<String>,
}

/// Kind of structural change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeChangeKind {
    /// Child was created
    Added,
    /// Child was removed
    Removed,
}

/// A child node was added or removed
#[derive(Debug, Clone)]
pub struct NodeChangeEvent {
    /// Parent whose children changed
    pub parent: Preferences,
    /// Name of the child
    pub child: String,
    /// What happened
    pub kind: NodeChangeKind,
}

/// Callback for preference changes
pub type PreferenceListener = Arc<dyn Fn(&PreferenceChangeEvent) + Send + Sync>;

/// Callback for node changes
pub type NodeListener = Arc<dyn Fn(&NodeChangeEvent) + Send + Sync>;

/// Ordered set of listeners of one kind
pub(crate) struct ListenerList<L: ?Sized> {
    entries: Vec<(ListenerId, Arc<L>)>,
}

impl<L: ?Sized> Default for ListenerList<L> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<L: ?Sized> fmt::Debug for ListenerList<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerList")
            .field("len", &self.entries.len())
            .finish()
    }
}

impl<L: ?Sized> ListenerList<L> {
    pub(crate) fn add(&mut self, listener: Arc<L>) -> ListenerId {
        let id = ListenerId::next();
        self.entries.push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| *existing != id);
        self.entries.len() != before
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<L>> {
        self.entries.iter().map(|(_, l)| Arc::clone(l)).collect()
    }
}

/// Invoke each listener, logging and swallowing panics
pub(crate) fn dispatch<E, L>(listeners: &[Arc<L>], event: &E, describe: impl Fn() -> String)
where
    L: Fn(&E) + Send + Sync + ?Sized,
{
    for listener in listeners {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (**listener)(event)));
        if let Err(payload) = outcome {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(event = %describe(), %reason, "listener panicked; continuing delivery");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    type Callback = dyn Fn(&u32) + Send + Sync;

    #[test]
    fn ids_are_unique() {
        let mut list: ListenerList<Callback> = ListenerList::default();
        let a = list.add(Arc::new(|_: &u32| {}));
        let b = list.add(Arc::new(|_: &u32| {}));
        assert_ne!(a, b);
    }

    #[test]
    fn remove_by_id() {
        let mut list: ListenerList<Callback> = ListenerList::default();
        let id = list.add(Arc::new(|_: &u32| {}));
        assert!(list.remove(id));
        assert!(!list.remove(id));
        assert!(list.is_empty());
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut list: ListenerList<Callback> = ListenerList::default();
        list.add(Arc::new(|_: &u32| panic!("boom")));
        let counter = Arc::clone(&hits);
        list.add(Arc::new(move |v: &u32| {
            counter.fetch_add(*v as usize, Ordering::SeqCst);
        }));

        dispatch(&list.snapshot(), &5u32, || "test".to_string());
        assert_eq!(hits.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn snapshot_is_detached_from_registry() {
        let mut list: ListenerList<Callback> = ListenerList::default();
        let id = list.add(Arc::new(|_: &u32| {}));
        let snapshot = list.snapshot();
        list.remove(id);
        assert_eq!(snapshot.len(), 1);
    }
}
