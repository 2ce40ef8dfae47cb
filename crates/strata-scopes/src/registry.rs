//! Scope provider registry
//!
//! Maps scope names to factories. A tree built with a registry as its
//! [`ScopeResolver`] instantiates a provider the first time a root child of
//! that name is navigated to.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use strata_core::{LoadTracker, PreferenceTree};
//! use strata_scopes::{CustomizerRegistry, LocalStorage, Locations, ScopeRegistry};
//!
//! let registry = ScopeRegistry::with_standard_scopes(
//!     &Locations::new(),
//!     Arc::new(LocalStorage::new()),
//!     Arc::new(CustomizerRegistry::new()),
//! );
//! let tree = PreferenceTree::with_resolver(Arc::new(LoadTracker::new()), Arc::new(registry));
//! assert_eq!(tree.node("/default/app").unwrap().get("missing").unwrap(), None);
//! ```

use crate::customizer::CustomizerRegistry;
use crate::default_scope::{DefaultScope, DEFAULT_SCOPE};
use crate::instance::{InstanceScope, INSTANCE_SCOPE};
use crate::locations::Locations;
use crate::persistent::{ConfigurationScope, CustomScope, UserScope, CONFIGURATION_SCOPE, USER_SCOPE};
use crate::storage::Storage;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use strata_core::{ScopeProvider, ScopeResolver};

/// Creates the provider of one scope
pub type ScopeFactory = Arc<dyn Fn() -> Arc<dyn ScopeProvider> + Send + Sync>;

/// Named scope factories
#[derive(Default)]
pub struct ScopeRegistry {
    factories: RwLock<BTreeMap<String, ScopeFactory>>,
}

impl fmt::Debug for ScopeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeRegistry")
            .field("scopes", &self.names())
            .finish()
    }
}

impl ScopeRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `instance`, `configuration`, `user`, `default` and every
    /// custom scope declared in `locations`
    #[must_use]
    pub fn with_standard_scopes(
        locations: &Locations,
        storage: Arc<dyn Storage>,
        customizers: Arc<CustomizerRegistry>,
    ) -> Self {
        let registry = Self::new();

        let instance: Arc<dyn ScopeProvider> =
            Arc::new(InstanceScope::new(locations.instance_dir.clone(), Arc::clone(&storage)));
        registry.register_provider(INSTANCE_SCOPE, instance);

        let configuration: Arc<dyn ScopeProvider> = Arc::new(ConfigurationScope::new(
            locations.install_dir.clone(),
            Arc::clone(&storage),
        ));
        registry.register_provider(CONFIGURATION_SCOPE, configuration);

        let user: Arc<dyn ScopeProvider> =
            Arc::new(UserScope::new(locations.user_dir.clone(), Arc::clone(&storage)));
        registry.register_provider(USER_SCOPE, user);

        let defaults: Arc<dyn ScopeProvider> = Arc::new(
            DefaultScope::new(Arc::clone(&storage), customizers)
                .with_module_dirs(locations.module_dirs.clone())
                .with_product_customization(locations.product_customization.clone())
                .with_command_line_customization(locations.customization.clone()),
        );
        registry.register_provider(DEFAULT_SCOPE, defaults);

        for (name, config) in &locations.custom_scopes {
            match CustomScope::new(name.as_str(), &config.base, config.depth, Arc::clone(&storage)) {
                Ok(scope) => {
                    let scope: Arc<dyn ScopeProvider> = Arc::new(scope);
                    registry.register_provider(name.clone(), scope);
                }
                Err(err) => tracing::warn!(scope = %name, error = %err, "skipping custom scope"),
            }
        }
        registry
    }

    /// Register a factory, replacing any previous one of the same name
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn ScopeProvider> + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(scope = %name, "registered scope factory");
        self.factories.write().insert(name, Arc::new(factory));
    }

    /// Register one shared provider instance
    pub fn register_provider(&self, name: impl Into<String>, provider: Arc<dyn ScopeProvider>) {
        self.register(name, move || Arc::clone(&provider));
    }

    /// Remove a factory; returns `false` if none was registered
    pub fn unregister(&self, name: &str) -> bool {
        self.factories.write().remove(name).is_some()
    }

    /// Check if a scope name is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.read().contains_key(name)
    }

    /// Registered scope names in order
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.factories.read().keys().cloned().collect()
    }

    /// Instantiate the provider of a scope
    #[must_use]
    pub fn create(&self, name: &str) -> Option<Arc<dyn ScopeProvider>> {
        let factory = self.factories.read().get(name).cloned()?;
        Some(factory())
    }
}

impl ScopeResolver for ScopeRegistry {
    fn resolve(&self, name: &str) -> Option<Arc<dyn ScopeProvider>> {
        self.create(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use strata_core::TransientScope;

    fn standard(locations: &Locations) -> ScopeRegistry {
        ScopeRegistry::with_standard_scopes(
            locations,
            Arc::new(LocalStorage::new()),
            Arc::new(CustomizerRegistry::new()),
        )
    }

    #[test]
    fn standard_scopes_registered() {
        let registry = standard(&Locations::new().with_custom_scope("project", "/w", 2));
        assert_eq!(
            registry.names(),
            vec!["configuration", "default", "instance", "project", "user"]
        );
        assert_eq!(registry.create("instance").unwrap().name(), "instance");
    }

    #[test]
    fn invalid_custom_scope_skipped() {
        let registry = standard(&Locations::new().with_custom_scope("flat", "/w", 1));
        assert!(!registry.contains("flat"));
    }

    #[test]
    fn shared_provider_instance() {
        let registry = standard(&Locations::new());
        let a = registry.create("default").unwrap();
        let b = registry.create("default").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn register_and_unregister() {
        let registry = ScopeRegistry::new();
        registry.register("session", || Arc::new(TransientScope::new("session")));
        assert!(registry.resolve("session").is_some());
        assert!(registry.unregister("session"));
        assert!(registry.resolve("session").is_none());
    }
}
