//! Configuration, user and custom scopes
//!
//! Plain file-backed scopes without a legacy format.

use crate::error::ScopeError;
use crate::file_scope::{delegate_to_file_scope, FileScope, SETTINGS_DIR};
use crate::storage::Storage;
use std::path::PathBuf;
use std::sync::Arc;

/// Name of the configuration (install area) scope
pub const CONFIGURATION_SCOPE: &str = "configuration";

/// Name of the per-user scope
pub const USER_SCOPE: &str = "user";

/// Machine-wide scope stored in the install area
#[derive(Debug, Clone)]
pub struct ConfigurationScope {
    files: FileScope,
}

impl ConfigurationScope {
    /// Create configuration scope over `<install>/.settings`
    #[must_use]
    pub fn new(install_dir: Option<PathBuf>, storage: Arc<dyn Storage>) -> Self {
        let root = install_dir.map(|d| d.join(SETTINGS_DIR));
        Self {
            files: FileScope::new(CONFIGURATION_SCOPE, root, 2, storage),
        }
    }
}

delegate_to_file_scope!(ConfigurationScope, files);

/// Per-user scope stored in the user's roaming area
#[derive(Debug, Clone)]
pub struct UserScope {
    files: FileScope,
}

impl UserScope {
    /// Create user scope over `<user>/.settings`
    #[must_use]
    pub fn new(user_dir: Option<PathBuf>, storage: Arc<dyn Storage>) -> Self {
        let root = user_dir.map(|d| d.join(SETTINGS_DIR));
        Self {
            files: FileScope::new(USER_SCOPE, root, 2, storage),
        }
    }
}

delegate_to_file_scope!(UserScope, files);

/// Named scope stored at `<base>/<name>/<qualifier>.prefs`
#[derive(Debug, Clone)]
pub struct CustomScope {
    files: FileScope,
}

impl CustomScope {
    /// Create custom scope
    ///
    /// # Errors
    /// Returns [`ScopeError::InvalidDepth`] for a depth below 2
    pub fn new(
        name: impl Into<String>,
        base: impl Into<PathBuf>,
        depth: usize,
        storage: Arc<dyn Storage>,
    ) -> Result<Self, ScopeError> {
        let name = name.into();
        if depth < 2 {
            return Err(ScopeError::InvalidDepth { scope: name, depth });
        }
        let root = base.into().join(&name);
        Ok(Self {
            files: FileScope::new(name, Some(root), depth, storage),
        })
    }
}

delegate_to_file_scope!(CustomScope, files);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use pretty_assertions::assert_eq;
    use strata_core::{NodePath, PreferenceTree, ScopeProvider};

    fn p(s: &str) -> NodePath {
        s.parse().unwrap()
    }

    #[test]
    fn configuration_location() {
        let scope = ConfigurationScope::new(Some("/opt/app".into()), Arc::new(LocalStorage::new()));
        assert_eq!(scope.name(), "configuration");
        assert_eq!(
            scope.location(&p("/configuration/app/x")),
            Some(PathBuf::from("/opt/app/.settings/app.prefs"))
        );
    }

    #[test]
    fn user_without_dir_is_transient() {
        let scope = UserScope::new(None, Arc::new(LocalStorage::new()));
        assert!(!scope.persists());
    }

    #[test]
    fn custom_scope_layout_and_depth() {
        let scope = CustomScope::new("project", "/work", 3, Arc::new(LocalStorage::new())).unwrap();
        assert_eq!(scope.load_level_depth(), Some(3));
        assert_eq!(
            scope.location(&p("/project/team/app/k")),
            Some(PathBuf::from("/work/project/team/app.prefs"))
        );
        assert!(matches!(
            CustomScope::new("bad", "/w", 1, Arc::new(LocalStorage::new())),
            Err(ScopeError::InvalidDepth { depth: 1, .. })
        ));
    }

    #[test]
    fn user_scope_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let make = || UserScope::new(Some(dir.path().to_path_buf()), Arc::new(LocalStorage::new()));

        let tree = PreferenceTree::new();
        tree.register_scope(Arc::new(make())).unwrap();
        let app = tree.node("/user/app").unwrap();
        app.put("theme", "dark").unwrap();
        app.node("editor").unwrap().put_i32("tabs", 4).unwrap();
        tree.root().flush().unwrap();

        let fresh = PreferenceTree::new();
        fresh.register_scope(Arc::new(make())).unwrap();
        assert_eq!(fresh.node("/user").unwrap().children_names().unwrap(), vec!["app"]);
        let app = fresh.node("/user/app").unwrap();
        assert_eq!(app.get("theme").unwrap().as_deref(), Some("dark"));
        assert_eq!(app.node("editor").unwrap().get_i32("tabs", 0).unwrap(), 4);
    }
}
