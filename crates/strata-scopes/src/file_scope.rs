//! File-backed persistence shared by the persistent scopes
//!
//! One file per load-level node holds that node's whole subtree as
//! `encode_path(relative, key)=value` lines plus the version key. A corrupt
//! or unreadable file only affects its own load level.

use crate::storage::Storage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strata_core::codec::{self, VERSION_KEY, VERSION_VALUE};
use strata_core::convert::{apply_properties, to_properties};
use strata_core::{LoadMode, NodePath, PreferenceError, Preferences, Result};

/// File extension of scope files
pub const PREFS_EXTENSION: &str = "prefs";

/// Directory name under a base area holding scope files
pub const SETTINGS_DIR: &str = ".settings";

/// Load and save of one scope's files under a root directory
#[derive(Debug, Clone)]
pub struct FileScope {
    name: String,
    root: Option<PathBuf>,
    depth: usize,
    storage: Arc<dyn Storage>,
}

impl FileScope {
    /// Scope whose load-level files live directly under `root`
    ///
    /// `root: None` means the area is not configured; such a scope never
    /// persists.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        root: Option<PathBuf>,
        depth: usize,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            name: name.into(),
            root,
            depth: depth.max(2),
            storage,
        }
    }

    /// Scope name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Segment count of load-level nodes
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Directory holding this scope's files
    #[inline]
    #[must_use]
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Storage the files are read from and written to
    #[inline]
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Check if a root directory is configured
    #[inline]
    #[must_use]
    pub fn persists(&self) -> bool {
        self.root.is_some()
    }

    /// File backing the load level that contains `path`, or the directory
    /// for nodes above the load level
    #[must_use]
    pub fn location(&self, path: &NodePath) -> Option<PathBuf> {
        let root = self.root.as_ref()?;
        if path.len() < 2 {
            return Some(root.clone());
        }
        let unit = path.ancestor(self.depth).unwrap_or_else(|| path.clone());
        let segments = &unit.segments()[1..];
        let mut location = root.clone();
        for segment in segments {
            location.push(segment);
        }
        if unit.len() == self.depth {
            location.set_file_name(format!("{}.{PREFS_EXTENSION}", unit.name()));
        }
        Some(location)
    }

    /// Names of stored children under a node above the load level
    #[must_use]
    pub fn known_children(&self, path: &NodePath) -> Vec<String> {
        if path.is_root() || path.len() >= self.depth {
            return Vec::new();
        }
        let Some(dir) = self.location(path) else {
            return Vec::new();
        };
        let names = match self.storage.list_dir(&dir) {
            Ok(names) => names,
            Err(err) => {
                tracing::warn!(dir = %dir.display(), error = %err, "failed to list scope directory");
                return Vec::new();
            }
        };
        let suffix = format!(".{PREFS_EXTENSION}");
        let leaf = path.len() + 1 == self.depth;
        names
            .into_iter()
            .filter(|name| !name.starts_with('.'))
            .filter_map(|name| {
                if leaf {
                    name.strip_suffix(&suffix).map(str::to_string)
                } else if name.ends_with(&suffix) {
                    None
                } else {
                    Some(name)
                }
            })
            .filter(|name| !name.is_empty())
            .collect()
    }

    /// Load the file of a load-level node into it
    ///
    /// Lines that fail to parse are logged and skipped.
    ///
    /// # Errors
    /// Returns backing-store error if the file exists but cannot be read
    pub fn load(&self, node: &Preferences, mode: LoadMode) -> Result<()> {
        let Some(file) = self.location(node.path()) else {
            return Ok(());
        };
        let contents = self
            .storage
            .read_to_string(&file)
            .map_err(|e| PreferenceError::backing_store(&file, e))?;
        let Some(contents) = contents else {
            tracing::debug!(file = %file.display(), "no preference file; starting empty");
            return Ok(());
        };

        let parsed = codec::parse_lenient(&contents);
        for issue in &parsed.issues {
            tracing::warn!(
                file = %file.display(),
                line = issue.line,
                message = %issue.message,
                "skipping malformed preference line"
            );
        }
        match parsed.entries.get(VERSION_KEY) {
            Some(version) if version != VERSION_VALUE => {
                tracing::debug!(file = %file.display(), %version, "unexpected file version; loading anyway");
            }
            _ => {}
        }
        let applied = apply_properties(node, &parsed.entries, mode)?;
        tracing::debug!(file = %file.display(), entries = applied, "read preference file");
        Ok(())
    }

    /// Write a load-level node's subtree to its file
    ///
    /// An empty subtree deletes the file instead.
    ///
    /// # Errors
    /// Returns backing-store error if the file cannot be written
    pub fn save(&self, node: &Preferences) -> Result<()> {
        let Some(file) = self.location(node.path()) else {
            return Ok(());
        };
        let mut entries = to_properties(node)?;
        if entries.is_empty() {
            return self
                .storage
                .remove(&file)
                .map_err(|e| PreferenceError::backing_store(&file, e));
        }
        entries.insert(VERSION_KEY.to_string(), VERSION_VALUE.to_string());
        self.storage
            .write_atomic(&file, &codec::write(&entries))
            .map_err(|e| PreferenceError::backing_store(&file, e))
    }

    /// Delete the file of a removed load-level node
    ///
    /// # Errors
    /// Returns backing-store error if the file cannot be deleted
    pub fn delete(&self, path: &NodePath) -> Result<()> {
        let Some(file) = self.location(path) else {
            return Ok(());
        };
        self.storage
            .remove(&file)
            .map_err(|e| PreferenceError::backing_store(&file, e))
    }
}

/// Implements [`ScopeProvider`](strata_core::ScopeProvider) by delegating
/// to a [`FileScope`] field
macro_rules! delegate_to_file_scope {
    ($ty:ty, $field:ident) => {
        impl strata_core::ScopeProvider for $ty {
            fn name(&self) -> &str {
                self.$field.name()
            }

            fn load_level_depth(&self) -> Option<usize> {
                Some(self.$field.depth())
            }

            fn location(&self, path: &strata_core::NodePath) -> Option<std::path::PathBuf> {
                self.$field.location(path)
            }

            fn known_children(&self, path: &strata_core::NodePath) -> Vec<String> {
                self.$field.known_children(path)
            }

            fn load(
                &self,
                node: &strata_core::Preferences,
                mode: strata_core::LoadMode,
            ) -> strata_core::Result<()> {
                self.$field.load(node, mode)
            }

            fn save(&self, node: &strata_core::Preferences) -> strata_core::Result<()> {
                self.$field.save(node)
            }

            fn delete(&self, path: &strata_core::NodePath) -> strata_core::Result<()> {
                self.$field.delete(path)
            }

            fn persists(&self) -> bool {
                self.$field.persists()
            }
        }
    };
}

pub(crate) use delegate_to_file_scope;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{LocalStorage, MockStorage};
    use std::io;
    use strata_core::PreferenceTree;

    fn p(s: &str) -> NodePath {
        s.parse().unwrap()
    }

    fn scope(root: &Path, depth: usize) -> FileScope {
        FileScope::new("test", Some(root.to_path_buf()), depth, Arc::new(LocalStorage::new()))
    }

    #[test]
    fn location_of_load_level_and_below() {
        let s = scope(Path::new("/base"), 2);
        assert_eq!(s.location(&p("/test/app")), Some(PathBuf::from("/base/app.prefs")));
        assert_eq!(
            s.location(&p("/test/app/editor/colors")),
            Some(PathBuf::from("/base/app.prefs"))
        );
        assert_eq!(
            s.location(&p("/test/org.example.app")),
            Some(PathBuf::from("/base/org.example.app.prefs"))
        );
        assert_eq!(s.location(&p("/test")), Some(PathBuf::from("/base")));
    }

    #[test]
    fn location_with_deeper_load_level() {
        let s = scope(Path::new("/base"), 3);
        assert_eq!(
            s.location(&p("/test/team/app/x")),
            Some(PathBuf::from("/base/team/app.prefs"))
        );
        assert_eq!(s.location(&p("/test/team")), Some(PathBuf::from("/base/team")));
    }

    #[test]
    fn unconfigured_root_does_not_persist() {
        let s = FileScope::new("test", None, 2, Arc::new(LocalStorage::new()));
        assert!(!s.persists());
        assert_eq!(s.location(&p("/test/app")), None);
    }

    #[test]
    fn known_children_lists_prefs_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.prefs"), "k=v\n").unwrap();
        std::fs::write(dir.path().join("a.prefs"), "k=v\n").unwrap();
        std::fs::write(dir.path().join(".a.prefs.tmp"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let s = scope(dir.path(), 2);
        assert_eq!(s.known_children(&p("/test")), vec!["a", "b"]);
        assert!(s.known_children(&p("/test/a")).is_empty());
    }

    #[test]
    fn read_failure_is_backing_store_error() {
        let mut storage = MockStorage::new();
        storage
            .expect_read_to_string()
            .returning(|_| Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied")));

        let tree = PreferenceTree::new();
        let s = FileScope::new("test", Some(PathBuf::from("/base")), 2, Arc::new(storage));
        let node = tree.node("/scratch/app").unwrap();
        let err = s.load(&node, LoadMode::Initial).unwrap_err();
        assert!(err.is_backing_store());
    }

    #[test]
    fn write_failure_is_backing_store_error() {
        let mut storage = MockStorage::new();
        storage
            .expect_write_atomic()
            .returning(|_, _| Err(io::Error::new(io::ErrorKind::Other, "disk full")));

        let tree = PreferenceTree::new();
        let node = tree.node("/scratch/app").unwrap();
        node.put("k", "v").unwrap();
        let s = FileScope::new("test", Some(PathBuf::from("/base")), 2, Arc::new(storage));
        assert!(s.save(&node).unwrap_err().is_backing_store());
    }

    #[test]
    fn empty_subtree_removes_file() {
        let mut storage = MockStorage::new();
        storage
            .expect_remove()
            .withf(|path| path.ends_with("app.prefs"))
            .times(1)
            .returning(|_| Ok(()));

        let tree = PreferenceTree::new();
        let node = tree.node("/scratch/app").unwrap();
        let s = FileScope::new("test", Some(PathBuf::from("/base")), 2, Arc::new(storage));
        s.save(&node).unwrap();
    }

    #[test]
    fn save_writes_version_and_relative_keys() {
        let dir = tempfile::tempdir().unwrap();
        let tree = PreferenceTree::new();
        let node = tree.node("/scratch/app").unwrap();
        node.put("color", "red").unwrap();
        node.node("editor").unwrap().put("a/b", "x").unwrap();

        let s = scope(dir.path(), 2);
        s.save(&node).unwrap();

        let text = std::fs::read_to_string(dir.path().join("app.prefs")).unwrap();
        assert_eq!(text, "color=red\neditor//a/b=x\npreferences.version=1\n");
    }
}
