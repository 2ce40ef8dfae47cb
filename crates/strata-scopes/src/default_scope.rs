//! Default-value scope
//!
//! Never persisted. Loading a qualifier layers four optional sources, later
//! ones overriding earlier ones:
//! 1. the qualifier's customizer, else its programmatic initializer
//! 2. `<module dir>/preferences.ini`
//! 3. the product customization file
//! 4. the command-line customization file
//!
//! Sources 3 and 4 cover every qualifier, so their keys carry it as a
//! prefix (`qualifier/key`, `qualifier/sub/key`, `qualifier//a/b`). They are
//! read once and cached.

use crate::customizer::CustomizerRegistry;
use crate::storage::Storage;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strata_core::codec::{self, Properties};
use strata_core::convert::apply_properties;
use strata_core::path::{DOUBLE_SEPARATOR, SEPARATOR};
use strata_core::{LoadMode, NodePath, Preferences, Result, ScopeProvider};

/// Name of the default scope
pub const DEFAULT_SCOPE: &str = "default";

/// File name of a module's bundled defaults
pub const MODULE_DEFAULTS_FILE: &str = "preferences.ini";

/// Scope computing default values from layered sources
#[derive(Debug)]
pub struct DefaultScope {
    storage: Arc<dyn Storage>,
    customizers: Arc<CustomizerRegistry>,
    module_dirs: RwLock<BTreeMap<String, PathBuf>>,
    product_file: Option<PathBuf>,
    command_line_file: Option<PathBuf>,
    product: OnceCell<Properties>,
    command_line: OnceCell<Properties>,
}

impl DefaultScope {
    /// Create default scope without override files or module directories
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, customizers: Arc<CustomizerRegistry>) -> Self {
        Self {
            storage,
            customizers,
            module_dirs: RwLock::new(BTreeMap::new()),
            product_file: None,
            command_line_file: None,
            product: OnceCell::new(),
            command_line: OnceCell::new(),
        }
    }

    /// Set the product-wide override file
    #[must_use]
    pub fn with_product_customization(mut self, file: Option<PathBuf>) -> Self {
        self.product_file = file;
        self
    }

    /// Set the command-line override file
    #[must_use]
    pub fn with_command_line_customization(mut self, file: Option<PathBuf>) -> Self {
        self.command_line_file = file;
        self
    }

    /// Set the module directories of several qualifiers
    #[must_use]
    pub fn with_module_dirs(self, dirs: impl IntoIterator<Item = (String, PathBuf)>) -> Self {
        self.module_dirs.write().extend(dirs);
        self
    }

    /// Register where a qualifier's `preferences.ini` lives
    pub fn register_module_dir(&self, qualifier: impl Into<String>, dir: impl Into<PathBuf>) {
        self.module_dirs.write().insert(qualifier.into(), dir.into());
    }

    /// Customizer registry consulted first
    #[inline]
    #[must_use]
    pub fn customizers(&self) -> &Arc<CustomizerRegistry> {
        &self.customizers
    }

    /// All layers merged for one qualifier, keys relative to its node
    #[must_use]
    pub fn defaults_for(&self, qualifier: &str) -> Properties {
        let mut merged = self.customizers.defaults_for(qualifier);

        let module_file = self
            .module_dirs
            .read()
            .get(qualifier)
            .map(|dir| dir.join(MODULE_DEFAULTS_FILE));
        if let Some(file) = module_file {
            merged.extend(self.read_file(&file));
        }

        let product = self
            .product
            .get_or_init(|| self.read_optional(self.product_file.as_deref()));
        merged.extend(scoped_to(product, qualifier));

        let command_line = self
            .command_line
            .get_or_init(|| self.read_optional(self.command_line_file.as_deref()));
        merged.extend(scoped_to(command_line, qualifier));

        merged
    }

    fn read_optional(&self, file: Option<&Path>) -> Properties {
        file.map(|f| self.read_file(f)).unwrap_or_default()
    }

    fn read_file(&self, file: &Path) -> Properties {
        let contents = match self.storage.read_to_string(file) {
            Ok(Some(contents)) => contents,
            Ok(None) => return Properties::new(),
            Err(err) => {
                tracing::warn!(file = %file.display(), error = %err, "skipping unreadable defaults file");
                return Properties::new();
            }
        };
        let parsed = codec::parse_lenient(&contents);
        for issue in &parsed.issues {
            tracing::warn!(file = %file.display(), line = issue.line, message = %issue.message, "skipping malformed defaults line");
        }
        parsed.entries
    }
}

/// Entries of a multi-qualifier source that belong to `qualifier`, with the
/// qualifier prefix stripped
fn scoped_to<'a>(
    source: &'a Properties,
    qualifier: &'a str,
) -> impl Iterator<Item = (String, String)> + 'a {
    source.iter().filter_map(move |(entry, value)| {
        let rest = entry.strip_prefix(qualifier)?;
        let relative = if rest.starts_with(DOUBLE_SEPARATOR) {
            rest
        } else {
            rest.strip_prefix(SEPARATOR)?
        };
        (!relative.is_empty()).then(|| (relative.to_string(), value.clone()))
    })
}

impl ScopeProvider for DefaultScope {
    fn name(&self) -> &str {
        DEFAULT_SCOPE
    }

    fn load_level_depth(&self) -> Option<usize> {
        Some(2)
    }

    fn location(&self, path: &NodePath) -> Option<PathBuf> {
        let qualifier = path.qualifier()?;
        self.module_dirs
            .read()
            .get(qualifier)
            .map(|dir| dir.join(MODULE_DEFAULTS_FILE))
    }

    fn load(&self, node: &Preferences, mode: LoadMode) -> Result<()> {
        let Some(qualifier) = node.qualifier() else {
            return Ok(());
        };
        let defaults = self.defaults_for(qualifier);
        let applied = apply_properties(node, &defaults, mode)?;
        tracing::debug!(qualifier, entries = applied, "applied default preferences");
        Ok(())
    }

    fn save(&self, _node: &Preferences) -> Result<()> {
        Ok(())
    }

    fn persists(&self) -> bool {
        false
    }
}
