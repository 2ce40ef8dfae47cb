//! Workspace-instance scope
//!
//! Files live at `<instance>/.settings/<qualifier>.prefs`. Before the first
//! load of a qualifier, an old flat `<instance>/.plugins/<qualifier>/pref_store.ini`
//! is migrated into the qualifier node and deleted.

use crate::file_scope::{FileScope, SETTINGS_DIR};
use crate::storage::Storage;
use std::path::PathBuf;
use std::sync::Arc;
use strata_core::codec;
use strata_core::{LoadMode, NodePath, PreferenceError, Preferences, Result, ScopeProvider};

/// Name of the instance scope
pub const INSTANCE_SCOPE: &str = "instance";

/// Directory of per-component legacy stores under the instance area
pub const LEGACY_DIR: &str = ".plugins";

/// File name of a legacy per-component store
pub const LEGACY_FILE: &str = "pref_store.ini";

/// Scope of the current workspace instance
#[derive(Debug, Clone)]
pub struct InstanceScope {
    files: FileScope,
    base: Option<PathBuf>,
}

impl InstanceScope {
    /// Create instance scope over `<base>/.settings`
    #[must_use]
    pub fn new(base: Option<PathBuf>, storage: Arc<dyn Storage>) -> Self {
        let root = base.as_ref().map(|b| b.join(SETTINGS_DIR));
        Self {
            files: FileScope::new(INSTANCE_SCOPE, root, 2, storage),
            base,
        }
    }

    /// Legacy store of a qualifier
    #[must_use]
    pub fn legacy_location(&self, qualifier: &str) -> Option<PathBuf> {
        self.base
            .as_ref()
            .map(|b| b.join(LEGACY_DIR).join(qualifier).join(LEGACY_FILE))
    }
}

impl ScopeProvider for InstanceScope {
    fn name(&self) -> &str {
        self.files.name()
    }

    fn load_level_depth(&self) -> Option<usize> {
        Some(self.files.depth())
    }

    fn location(&self, path: &NodePath) -> Option<PathBuf> {
        self.files.location(path)
    }

    fn known_children(&self, path: &NodePath) -> Vec<String> {
        self.files.known_children(path)
    }

    fn migrate_legacy(&self, node: &Preferences) -> Result<()> {
        let Some(file) = node.qualifier().and_then(|q| self.legacy_location(q)) else {
            return Ok(());
        };
        let storage = self.files.storage();
        let Some(contents) = storage
            .read_to_string(&file)
            .map_err(|e| PreferenceError::backing_store(&file, e))?
        else {
            return Ok(());
        };

        let parsed = codec::parse_lenient(&contents);
        for issue in &parsed.issues {
            tracing::warn!(file = %file.display(), line = issue.line, message = %issue.message, "skipping malformed legacy line");
        }
        for (key, value) in &parsed.entries {
            if !key.is_empty() {
                node.put(key, value)?;
            }
        }
        storage
            .remove(&file)
            .map_err(|e| PreferenceError::backing_store(&file, e))?;
        tracing::info!(
            path = %node.absolute_path(),
            file = %file.display(),
            entries = parsed.entries.len(),
            "migrated legacy preferences"
        );
        Ok(())
    }

    fn load(&self, node: &Preferences, mode: LoadMode) -> Result<()> {
        self.files.load(node, mode)
    }

    fn save(&self, node: &Preferences) -> Result<()> {
        self.files.save(node)
    }

    fn delete(&self, path: &NodePath) -> Result<()> {
        self.files.delete(path)
    }

    fn persists(&self) -> bool {
        self.files.persists()
    }
}
