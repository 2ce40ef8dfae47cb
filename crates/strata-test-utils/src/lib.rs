//! Testing utilities for strata workspace
//!
//! Shared storage doubles, tracing setup and fixtures.

#![allow(missing_docs)]

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use strata_core::{LoadTracker, PreferenceTree, Properties};
use strata_scopes::{CustomizerRegistry, Locations, ScopeRegistry, Storage};

/// Install a test subscriber honoring `RUST_LOG`; safe to call repeatedly
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// In-memory [`Storage`]; directories are implied by file paths
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: Mutex<BTreeMap<PathBuf, String>>,
    writes: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.files.lock().insert(path.into(), contents.into());
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files.lock().get(path.as_ref()).cloned()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.lock().keys().cloned().collect()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl Storage for MemoryStorage {
    fn read_to_string(&self, path: &Path) -> io::Result<Option<String>> {
        Ok(self.contents(path))
    }

    fn write_atomic(&self, path: &Path, contents: &str) -> io::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.insert(path, contents);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files
            .lock()
            .keys()
            .any(|p| p == path || p.starts_with(path))
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.files.lock().remove(path);
        Ok(())
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut names: Vec<String> = self
            .files
            .lock()
            .keys()
            .filter_map(|p| p.strip_prefix(path).ok())
            .filter_map(|rest| rest.components().next())
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn create_dir_all(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}

/// [`Storage`] wrapper that fails on demand
#[derive(Debug)]
pub struct FailingStorage<S> {
    inner: S,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl<S: Storage> FailingStorage<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, path: &Path) -> io::Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("injected failure at {}", path.display()),
            ));
        }
        Ok(())
    }
}

impl<S: Storage> Storage for FailingStorage<S> {
    fn read_to_string(&self, path: &Path) -> io::Result<Option<String>> {
        Self::check(&self.fail_reads, path)?;
        self.inner.read_to_string(path)
    }

    fn write_atomic(&self, path: &Path, contents: &str) -> io::Result<()> {
        Self::check(&self.fail_writes, path)?;
        self.inner.write_atomic(path, contents)
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        Self::check(&self.fail_writes, path)?;
        self.inner.remove(path)
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        Self::check(&self.fail_reads, path)?;
        self.inner.list_dir(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        Self::check(&self.fail_writes, path)?;
        self.inner.create_dir_all(path)
    }
}

/// Locations with every area under `root`
pub fn locations_under(root: &Path) -> Locations {
    Locations::new()
        .with_install_dir(root.join("install"))
        .with_user_dir(root.join("user"))
        .with_instance_dir(root.join("instance"))
}

/// Tree over the standard scopes with a fresh load tracker
pub fn standard_tree(
    locations: &Locations,
    storage: Arc<dyn Storage>,
    customizers: Arc<CustomizerRegistry>,
) -> PreferenceTree {
    init_tracing();
    let registry = ScopeRegistry::with_standard_scopes(locations, storage, customizers);
    PreferenceTree::with_resolver(Arc::new(LoadTracker::new()), Arc::new(registry))
}

/// Tree over the standard scopes backed by a [`MemoryStorage`] rooted at `/mem`
pub fn memory_tree() -> (PreferenceTree, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let tree = standard_tree(
        &locations_under(Path::new("/mem")),
        storage.clone(),
        Arc::new(CustomizerRegistry::new()),
    );
    (tree, storage)
}

/// Build properties from pairs
pub fn props(entries: &[(&str, &str)]) -> Properties {
    entries
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_lists_direct_children() {
        let storage = MemoryStorage::new();
        storage.insert("/a/.settings/x.prefs", "k=v");
        storage.insert("/a/.settings/y.prefs", "k=v");
        storage.insert("/a/other/z.prefs", "k=v");
        assert_eq!(
            storage.list_dir(Path::new("/a/.settings")).unwrap(),
            vec!["x.prefs", "y.prefs"]
        );
        assert_eq!(storage.list_dir(Path::new("/a")).unwrap(), vec![".settings", "other"]);
        assert!(storage.exists(Path::new("/a/other")));
    }

    #[test]
    fn failing_storage_injects_errors() {
        let storage = FailingStorage::new(MemoryStorage::new());
        storage.write_atomic(Path::new("/f"), "x").unwrap();
        storage.fail_reads(true);
        assert!(storage.read_to_string(Path::new("/f")).is_err());
        storage.fail_reads(false);
        assert_eq!(storage.read_to_string(Path::new("/f")).unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn memory_tree_persists_instance_scope() {
        let (tree, storage) = memory_tree();
        let app = tree.node("/instance/app").unwrap();
        app.put("k", "v").unwrap();
        app.flush().unwrap();
        assert_eq!(
            storage.contents("/mem/instance/.settings/app.prefs").as_deref(),
            Some("k=v\npreferences.version=1\n")
        );
    }
}
