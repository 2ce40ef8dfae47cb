//! Base directories and override files for the standard scopes
//!
//! [`Locations`] is read from a TOML file and/or the environment:
//!
//! | variable | field |
//! |---|---|
//! | `STRATA_INSTALL_DIR` | `install_dir` |
//! | `STRATA_USER_DIR` | `user_dir` |
//! | `STRATA_INSTANCE_DIR` | `instance_dir` |
//! | `STRATA_PRODUCT_CUSTOMIZATION` | `product_customization` |
//! | `STRATA_CUSTOMIZATION` | `customization` |
//!
//! When no user directory is configured it defaults to
//! `<platform config dir>/strata`.

use crate::error::{Result, ScopeError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable naming the install area
pub const INSTALL_DIR_ENV: &str = "STRATA_INSTALL_DIR";
/// Environment variable naming the per-user area
pub const USER_DIR_ENV: &str = "STRATA_USER_DIR";
/// Environment variable naming the workspace-instance area
pub const INSTANCE_DIR_ENV: &str = "STRATA_INSTANCE_DIR";
/// Environment variable naming the product-wide defaults override file
pub const PRODUCT_CUSTOMIZATION_ENV: &str = "STRATA_PRODUCT_CUSTOMIZATION";
/// Environment variable naming the command-line defaults override file
pub const CUSTOMIZATION_ENV: &str = "STRATA_CUSTOMIZATION";

/// A file-backed scope declared in configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CustomScopeConfig {
    /// Directory holding `<scope>/<qualifier>.prefs`
    pub base: PathBuf,
    /// Segment count of load-level nodes
    #[serde(default = "default_depth")]
    pub depth: usize,
}

fn default_depth() -> usize {
    2
}

/// Where each scope keeps its data
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Locations {
    /// Install area, backing the `configuration` scope
    pub install_dir: Option<PathBuf>,
    /// Per-user area, backing the `user` scope
    pub user_dir: Option<PathBuf>,
    /// Workspace-instance area, backing the `instance` scope
    pub instance_dir: Option<PathBuf>,
    /// Product-wide defaults override file
    pub product_customization: Option<PathBuf>,
    /// Command-line defaults override file
    pub customization: Option<PathBuf>,
    /// Per-qualifier module directories holding `preferences.ini`
    pub module_dirs: BTreeMap<String, PathBuf>,
    /// Process-wide lookup order
    pub default_lookup_order: Option<Vec<String>>,
    /// Additional file-backed scopes by name
    pub custom_scopes: BTreeMap<String, CustomScopeConfig>,
}

impl Locations {
    /// Empty locations: only in-memory behavior
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// Returns [`ScopeError::Config`] if the text does not parse
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Self::parse(text, Path::new("<inline>"))
    }

    /// Read a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or does not parse
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ScopeError::io(path, e))?;
        Self::parse(&text, path)
    }

    fn parse(text: &str, origin: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|source| ScopeError::Config {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Locations from the environment alone
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Override fields from environment variables, then fill the user
    /// directory default
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var_os(name).map(PathBuf::from))
            .with_default_user_dir()
    }

    /// Override fields from an arbitrary variable source
    #[must_use]
    pub fn with_overrides(mut self, var: impl Fn(&str) -> Option<PathBuf>) -> Self {
        let non_empty = |name: &str| var(name).filter(|p| !p.as_os_str().is_empty());
        if let Some(dir) = non_empty(INSTALL_DIR_ENV) {
            self.install_dir = Some(dir);
        }
        if let Some(dir) = non_empty(USER_DIR_ENV) {
            self.user_dir = Some(dir);
        }
        if let Some(dir) = non_empty(INSTANCE_DIR_ENV) {
            self.instance_dir = Some(dir);
        }
        if let Some(file) = non_empty(PRODUCT_CUSTOMIZATION_ENV) {
            self.product_customization = Some(file);
        }
        if let Some(file) = non_empty(CUSTOMIZATION_ENV) {
            self.customization = Some(file);
        }
        self
    }

    fn with_default_user_dir(mut self) -> Self {
        if self.user_dir.is_none() {
            self.user_dir = directories::BaseDirs::new().map(|dirs| dirs.config_dir().join("strata"));
        }
        self
    }

    /// Set the install area
    #[must_use]
    pub fn with_install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install_dir = Some(dir.into());
        self
    }

    /// Set the per-user area
    #[must_use]
    pub fn with_user_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.user_dir = Some(dir.into());
        self
    }

    /// Set the workspace-instance area
    #[must_use]
    pub fn with_instance_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.instance_dir = Some(dir.into());
        self
    }

    /// Set the product-wide defaults override file
    #[must_use]
    pub fn with_product_customization(mut self, file: impl Into<PathBuf>) -> Self {
        self.product_customization = Some(file.into());
        self
    }

    /// Set the command-line defaults override file
    #[must_use]
    pub fn with_customization(mut self, file: impl Into<PathBuf>) -> Self {
        self.customization = Some(file.into());
        self
    }

    /// Register the module directory of a qualifier
    #[must_use]
    pub fn with_module_dir(mut self, qualifier: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.module_dirs.insert(qualifier.into(), dir.into());
        self
    }

    /// Declare a file-backed custom scope
    #[must_use]
    pub fn with_custom_scope(mut self, name: impl Into<String>, base: impl Into<PathBuf>, depth: usize) -> Self {
        self.custom_scopes.insert(
            name.into(),
            CustomScopeConfig {
                base: base.into(),
                depth,
            },
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn parses_toml() {
        let locations = Locations::from_toml_str(
            r#"
            install_dir = "/opt/app"
            instance_dir = "/work"
            default_lookup_order = ["instance", "default"]

            [module_dirs]
            editor = "/opt/app/modules/editor"

            [custom_scopes.project]
            base = "/work/project"
            "#,
        )
        .unwrap();

        assert_eq!(locations.install_dir, Some(PathBuf::from("/opt/app")));
        assert_eq!(locations.user_dir, None);
        assert_eq!(
            locations.default_lookup_order,
            Some(vec!["instance".to_string(), "default".to_string()])
        );
        assert_eq!(
            locations.module_dirs.get("editor"),
            Some(&PathBuf::from("/opt/app/modules/editor"))
        );
        assert_eq!(locations.custom_scopes["project"].depth, 2);
    }

    #[test]
    fn bad_toml_is_config_error() {
        let err = Locations::from_toml_str("install_dir = [").unwrap_err();
        assert!(matches!(err, ScopeError::Config { .. }));
    }

    #[test]
    fn overrides_replace_fields() {
        let vars: HashMap<&str, &str> = [
            (INSTANCE_DIR_ENV, "/env/instance"),
            (CUSTOMIZATION_ENV, "/env/custom.ini"),
            (USER_DIR_ENV, ""),
        ]
        .into_iter()
        .collect();

        let locations = Locations::new()
            .with_user_dir("/cfg/user")
            .with_overrides(|name| vars.get(name).map(PathBuf::from));

        assert_eq!(locations.instance_dir, Some(PathBuf::from("/env/instance")));
        assert_eq!(locations.customization, Some(PathBuf::from("/env/custom.ini")));
        assert_eq!(locations.user_dir, Some(PathBuf::from("/cfg/user")));
    }

    #[test]
    fn builder_sets_fields() {
        let locations = Locations::new()
            .with_install_dir("/i")
            .with_product_customization("/p.ini")
            .with_custom_scope("team", "/t", 3);
        assert_eq!(locations.install_dir, Some(PathBuf::from("/i")));
        assert_eq!(locations.product_customization, Some(PathBuf::from("/p.ini")));
        assert_eq!(locations.custom_scopes["team"].depth, 3);
    }
}
