//! Default-value customizers
//!
//! Components contribute defaults in one of two ways:
//! - a declarative customizer, registered as a factory and built on demand
//! - a programmatic initializer, registered as a ready instance
//!
//! When both exist for a qualifier the customizer wins. A factory that fails
//! is logged and contributes nothing.

use crate::error::ScopeError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use strata_core::Properties;

/// Contributes default values for one qualifier
///
/// Keys are relative to the qualifier node: `key`, `sub/key`, or
/// `sub//a/b` for a key containing the separator.
pub trait DefaultsCustomizer: Send + Sync {
    /// Add or replace entries in `defaults`
    fn initialize(&self, defaults: &mut Properties);
}

impl<F> DefaultsCustomizer for F
where
    F: Fn(&mut Properties) + Send + Sync,
{
    fn initialize(&self, defaults: &mut Properties) {
        self(defaults);
    }
}

/// Builds a declarative customizer on demand
pub type CustomizerFactory =
    Arc<dyn Fn() -> Result<Arc<dyn DefaultsCustomizer>, ScopeError> + Send + Sync>;

/// Customizers and initializers by qualifier
#[derive(Default)]
pub struct CustomizerRegistry {
    customizers: RwLock<HashMap<String, CustomizerFactory>>,
    initializers: RwLock<HashMap<String, Arc<dyn DefaultsCustomizer>>>,
}

impl fmt::Debug for CustomizerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut customizers: Vec<String> = self.customizers.read().keys().cloned().collect();
        let mut initializers: Vec<String> = self.initializers.read().keys().cloned().collect();
        customizers.sort();
        initializers.sort();
        f.debug_struct("CustomizerRegistry")
            .field("customizers", &customizers)
            .field("initializers", &initializers)
            .finish()
    }
}

impl CustomizerRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a declarative customizer factory
    pub fn register_customizer<F>(&self, qualifier: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<Arc<dyn DefaultsCustomizer>, ScopeError> + Send + Sync + 'static,
    {
        self.customizers
            .write()
            .insert(qualifier.into(), Arc::new(factory));
    }

    /// Register a programmatic initializer
    pub fn register_initializer(
        &self,
        qualifier: impl Into<String>,
        initializer: impl DefaultsCustomizer + 'static,
    ) {
        self.initializers
            .write()
            .insert(qualifier.into(), Arc::new(initializer));
    }

    /// Check if anything is registered for `qualifier`
    #[must_use]
    pub fn contains(&self, qualifier: &str) -> bool {
        self.customizers.read().contains_key(qualifier)
            || self.initializers.read().contains_key(qualifier)
    }

    /// Defaults contributed for `qualifier`
    #[must_use]
    pub fn defaults_for(&self, qualifier: &str) -> Properties {
        let mut defaults = Properties::new();
        let factory = self.customizers.read().get(qualifier).cloned();
        if let Some(factory) = factory {
            match factory() {
                Ok(customizer) => customizer.initialize(&mut defaults),
                Err(err) => {
                    tracing::warn!(qualifier, error = %err, "skipping defaults customizer");
                }
            }
            return defaults;
        }
        let initializer = self.initializers.read().get(qualifier).cloned();
        if let Some(initializer) = initializer {
            initializer.initialize(&mut defaults);
        }
        defaults
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initializer_used_without_customizer() {
        let registry = CustomizerRegistry::new();
        registry.register_initializer("app", |d: &mut Properties| {
            d.insert("color".into(), "black".into());
        });
        assert_eq!(registry.defaults_for("app")["color"], "black");
        assert!(registry.defaults_for("other").is_empty());
    }

    #[test]
    fn customizer_takes_precedence() {
        let registry = CustomizerRegistry::new();
        registry.register_initializer("app", |d: &mut Properties| {
            d.insert("from".into(), "initializer".into());
        });
        registry.register_customizer("app", || {
            let customizer: Arc<dyn DefaultsCustomizer> = Arc::new(|d: &mut Properties| {
                d.insert("from".into(), "customizer".into());
            });
            Ok(customizer)
        });
        assert_eq!(registry.defaults_for("app")["from"], "customizer");
    }

    #[test]
    fn failing_factory_is_skipped() {
        let registry = CustomizerRegistry::new();
        registry.register_initializer("app", |d: &mut Properties| {
            d.insert("from".into(), "initializer".into());
        });
        registry.register_customizer("app", || Err(ScopeError::customizer("app", "broken")));
        assert!(registry.defaults_for("app").is_empty());
        assert!(registry.contains("app"));
    }
}
