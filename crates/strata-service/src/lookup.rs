//! Lookup order registry
//!
//! Resolution order for `(qualifier, key)`:
//! 1. an order registered for exactly `(qualifier, key)`
//! 2. an order registered for `qualifier`
//! 3. the process-wide default
//!
//! Orders only affect multi-scope reads, never writes.

use crate::error::{Result, ServiceError};
use parking_lot::RwLock;
use std::collections::HashMap;
use strata_scopes::{CONFIGURATION_SCOPE, DEFAULT_SCOPE, INSTANCE_SCOPE, USER_SCOPE};

/// Default scope order when nothing else is configured
pub const DEFAULT_LOOKUP_ORDER: [&str; 4] =
    [INSTANCE_SCOPE, USER_SCOPE, CONFIGURATION_SCOPE, DEFAULT_SCOPE];

type OrderKey = (String, Option<String>);

/// Default order plus per-qualifier and per-key overrides
#[derive(Debug)]
pub struct LookupOrders {
    default: RwLock<Vec<String>>,
    overrides: RwLock<HashMap<OrderKey, Vec<String>>>,
}

impl Default for LookupOrders {
    fn default() -> Self {
        Self {
            default: RwLock::new(DEFAULT_LOOKUP_ORDER.iter().map(|s| (*s).to_string()).collect()),
            overrides: RwLock::new(HashMap::new()),
        }
    }
}

fn validate(order: &[String]) -> Result<()> {
    if order.is_empty() {
        return Err(ServiceError::InvalidLookupOrder("order is empty".into()));
    }
    if let Some(bad) = order.iter().find(|s| s.is_empty() || s.contains('/')) {
        return Err(ServiceError::InvalidLookupOrder(format!(
            "invalid scope name '{bad}'"
        )));
    }
    Ok(())
}

impl LookupOrders {
    /// Registry with the built-in default order
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a custom default order
    ///
    /// # Errors
    /// Returns error if the order is empty or names an invalid scope
    pub fn with_default(order: Vec<String>) -> Result<Self> {
        validate(&order)?;
        let orders = Self::default();
        *orders.default.write() = order;
        Ok(orders)
    }

    /// Process-wide default order
    #[must_use]
    pub fn default_order(&self) -> Vec<String> {
        self.default.read().clone()
    }

    /// Replace the process-wide default order
    ///
    /// # Errors
    /// Returns error if the order is empty or names an invalid scope
    pub fn set_default_order(&self, order: Vec<String>) -> Result<()> {
        validate(&order)?;
        *self.default.write() = order;
        Ok(())
    }

    /// Register (`Some`) or clear (`None`) the order for a qualifier, or for
    /// one key of it
    ///
    /// # Errors
    /// Returns error for an empty qualifier or an invalid order
    pub fn set(&self, qualifier: &str, key: Option<&str>, order: Option<Vec<String>>) -> Result<()> {
        if qualifier.is_empty() {
            return Err(ServiceError::InvalidLookupOrder("qualifier is empty".into()));
        }
        let slot = (qualifier.to_string(), key.map(str::to_string));
        match order {
            Some(order) => {
                validate(&order)?;
                tracing::debug!(qualifier, key, ?order, "set lookup order");
                self.overrides.write().insert(slot, order);
            }
            None => {
                self.overrides.write().remove(&slot);
            }
        }
        Ok(())
    }

    /// Order registered for exactly `(qualifier, key)`
    #[must_use]
    pub fn get(&self, qualifier: &str, key: Option<&str>) -> Option<Vec<String>> {
        self.overrides
            .read()
            .get(&(qualifier.to_string(), key.map(str::to_string)))
            .cloned()
    }

    /// Effective order for a lookup
    #[must_use]
    pub fn resolve(&self, qualifier: &str, key: &str) -> Vec<String> {
        let overrides = self.overrides.read();
        overrides
            .get(&(qualifier.to_string(), Some(key.to_string())))
            .or_else(|| overrides.get(&(qualifier.to_string(), None)))
            .cloned()
            .unwrap_or_else(|| self.default_order())
    }
}
