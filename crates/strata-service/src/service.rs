//! Multi-scope preference lookup
//!
//! [`PreferencesService`] answers "what is the effective value of
//! `qualifier/key`" by walking scopes in lookup order and returning the
//! first hit. It also fronts import/export of subtrees.
//!
//! # Example
//!
//! ```rust
//! use strata_core::PreferenceTree;
//! use strata_service::PreferencesService;
//!
//! let tree = PreferenceTree::new();
//! tree.node("/default/app").unwrap().put("color", "black").unwrap();
//! tree.node("/instance/app").unwrap().put("color", "blue").unwrap();
//!
//! let service = PreferencesService::new(tree);
//! assert_eq!(service.get_string("app", "color", "none", &[]).unwrap(), "blue");
//! ```

use crate::context::ScopeContext;
use crate::error::Result;
use crate::lookup::LookupOrders;
use crate::transfer::{self, ImportStatus};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::io::{Read, Write};
use std::str::FromStr;
use strata_core::{ParsedProperties, PreferenceTree, Preferences};
use strata_scopes::Locations;

/// Lookup, lookup-order and import/export facade over one tree
#[derive(Debug)]
pub struct PreferencesService {
    tree: PreferenceTree,
    orders: LookupOrders,
}

fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

impl PreferencesService {
    /// Service with the built-in default lookup order
    #[must_use]
    pub fn new(tree: PreferenceTree) -> Self {
        Self::with_lookup_orders(tree, LookupOrders::new())
    }

    /// Service with explicit lookup orders
    #[must_use]
    pub fn with_lookup_orders(tree: PreferenceTree, orders: LookupOrders) -> Self {
        Self { tree, orders }
    }

    /// Service using the default lookup order configured in `locations`
    ///
    /// # Errors
    /// Returns error if the configured order is invalid
    pub fn from_locations(tree: PreferenceTree, locations: &Locations) -> Result<Self> {
        let orders = match &locations.default_lookup_order {
            Some(order) => LookupOrders::with_default(order.clone())?,
            None => LookupOrders::new(),
        };
        Ok(Self::with_lookup_orders(tree, orders))
    }

    /// Underlying tree
    #[inline]
    #[must_use]
    pub fn tree(&self) -> &PreferenceTree {
        &self.tree
    }

    /// Root node of the tree
    #[must_use]
    pub fn root(&self) -> Preferences {
        self.tree.root()
    }

    // ------------------------------------------------------------------
    // Lookup orders
    // ------------------------------------------------------------------

    /// Registry of lookup orders
    #[inline]
    #[must_use]
    pub fn lookup_orders(&self) -> &LookupOrders {
        &self.orders
    }

    /// Register (`Some`) or clear (`None`) a lookup order for a qualifier or
    /// one of its keys
    ///
    /// # Errors
    /// Returns error for an empty qualifier or an invalid order
    pub fn set_lookup_order(
        &self,
        qualifier: &str,
        key: Option<&str>,
        order: Option<Vec<String>>,
    ) -> Result<()> {
        self.orders.set(qualifier, key, order)
    }

    /// Order registered for exactly `(qualifier, key)`
    #[must_use]
    pub fn lookup_order(&self, qualifier: &str, key: Option<&str>) -> Option<Vec<String>> {
        self.orders.get(qualifier, key)
    }

    /// Process-wide default order
    #[must_use]
    pub fn default_lookup_order(&self) -> Vec<String> {
        self.orders.default_order()
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Nodes consulted for `(qualifier, key)`, in lookup order
    ///
    /// A context whose name matches a scope supplies that scope's node;
    /// other scopes read `/<scope>/<qualifier>`.
    ///
    /// # Errors
    /// Returns error if a node cannot be navigated to
    pub fn lookup_nodes(
        &self,
        qualifier: &str,
        key: &str,
        contexts: &[&dyn ScopeContext],
    ) -> Result<Vec<Preferences>> {
        let root = self.tree.root();
        self.orders
            .resolve(qualifier, key)
            .iter()
            .map(|scope| -> Result<Preferences> {
                let node = match contexts.iter().find(|c| c.name() == scope.as_str()) {
                    Some(context) => context.node(qualifier)?,
                    None => root.node(scope)?.node(qualifier)?,
                };
                Ok(node)
            })
            .collect()
    }

    /// First value found for `(qualifier, key)` in lookup order
    ///
    /// # Errors
    /// Returns error if a node cannot be navigated to or was removed
    pub fn get(
        &self,
        qualifier: &str,
        key: &str,
        contexts: &[&dyn ScopeContext],
    ) -> Result<Option<String>> {
        for node in self.lookup_nodes(qualifier, key, contexts)? {
            if let Some(value) = node.get(key)? {
                tracing::trace!(qualifier, key, node = %node.absolute_path(), "lookup hit");
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// String value, or `default` when no scope has one
    ///
    /// # Errors
    /// Returns error if a node cannot be navigated to or was removed
    pub fn get_string(
        &self,
        qualifier: &str,
        key: &str,
        default: &str,
        contexts: &[&dyn ScopeContext],
    ) -> Result<String> {
        Ok(self
            .get(qualifier, key, contexts)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// Parsed value; a missing or unparseable value yields `default`
    ///
    /// # Errors
    /// Returns error if a node cannot be navigated to or was removed
    pub fn get_parsed<T: FromStr>(
        &self,
        qualifier: &str,
        key: &str,
        default: T,
        contexts: &[&dyn ScopeContext],
    ) -> Result<T> {
        Ok(self
            .get(qualifier, key, contexts)?
            .and_then(|v| v.parse().ok())
            .unwrap_or(default))
    }

    /// Boolean value; only `true` and `false` (any case) parse
    ///
    /// # Errors
    /// Returns error if a node cannot be navigated to or was removed
    pub fn get_bool(
        &self,
        qualifier: &str,
        key: &str,
        default: bool,
        contexts: &[&dyn ScopeContext],
    ) -> Result<bool> {
        Ok(self
            .get(qualifier, key, contexts)?
            .and_then(|v| parse_bool(&v))
            .unwrap_or(default))
    }

    /// `i32` value
    ///
    /// # Errors
    /// Returns error if a node cannot be navigated to or was removed
    pub fn get_i32(
        &self,
        qualifier: &str,
        key: &str,
        default: i32,
        contexts: &[&dyn ScopeContext],
    ) -> Result<i32> {
        self.get_parsed(qualifier, key, default, contexts)
    }

    /// `i64` value
    ///
    /// # Errors
    /// Returns error if a node cannot be navigated to or was removed
    pub fn get_i64(
        &self,
        qualifier: &str,
        key: &str,
        default: i64,
        contexts: &[&dyn ScopeContext],
    ) -> Result<i64> {
        self.get_parsed(qualifier, key, default, contexts)
    }

    /// `f32` value
    ///
    /// # Errors
    /// Returns error if a node cannot be navigated to or was removed
    pub fn get_f32(
        &self,
        qualifier: &str,
        key: &str,
        default: f32,
        contexts: &[&dyn ScopeContext],
    ) -> Result<f32> {
        self.get_parsed(qualifier, key, default, contexts)
    }

    /// `f64` value
    ///
    /// # Errors
    /// Returns error if a node cannot be navigated to or was removed
    pub fn get_f64(
        &self,
        qualifier: &str,
        key: &str,
        default: f64,
        contexts: &[&dyn ScopeContext],
    ) -> Result<f64> {
        self.get_parsed(qualifier, key, default, contexts)
    }

    /// Binary value stored as base64; invalid encodings yield `default`
    ///
    /// # Errors
    /// Returns error if a node cannot be navigated to or was removed
    pub fn get_bytes(
        &self,
        qualifier: &str,
        key: &str,
        default: &[u8],
        contexts: &[&dyn ScopeContext],
    ) -> Result<Vec<u8>> {
        Ok(self
            .get(qualifier, key, contexts)?
            .and_then(|v| STANDARD.decode(v.as_bytes()).ok())
            .unwrap_or_else(|| default.to_vec()))
    }

    /// Load level of `/<scope>/<qualifier>`
    ///
    /// # Errors
    /// Returns error if the node cannot be navigated to
    pub fn load_level(&self, scope: &str, qualifier: &str) -> Result<Option<Preferences>> {
        Ok(self
            .tree
            .root()
            .node(scope)?
            .node(qualifier)?
            .load_level()?)
    }

    // ------------------------------------------------------------------
    // Import / export
    // ------------------------------------------------------------------

    /// Export `node` and its subtree, skipping `excludes` (relative paths)
    ///
    /// # Errors
    /// Returns error if the subtree cannot be walked or the writer fails
    pub fn export_preferences<W: Write + ?Sized>(
        &self,
        node: &Preferences,
        writer: &mut W,
        excludes: &[&str],
    ) -> Result<usize> {
        transfer::export_preferences(node, writer, excludes)
    }

    /// Parse an export document without applying it
    ///
    /// # Errors
    /// Returns error if the reader fails
    pub fn read_preferences<R: Read + ?Sized>(&self, reader: &mut R) -> Result<ParsedProperties> {
        transfer::read_preferences(reader)
    }

    /// Apply an export document; problems are reported in the status
    ///
    /// # Errors
    /// Returns error only if the reader fails
    pub fn import_preferences<R: Read + ?Sized>(&self, reader: &mut R) -> Result<ImportStatus> {
        transfer::import_preferences(&self.tree, reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NodeScopeContext;

    fn service() -> PreferencesService {
        let tree = PreferenceTree::new();
        tree.node("/default/app").unwrap().put("color", "black").unwrap();
        tree.node("/configuration/app").unwrap().put("color", "red").unwrap();
        PreferencesService::new(tree)
    }

    #[test]
    fn first_scope_with_value_wins() {
        let service = service();
        assert_eq!(service.get_string("app", "color", "none", &[]).unwrap(), "red");
        service.tree().node("/instance/app").unwrap().put("color", "blue").unwrap();
        assert_eq!(service.get_string("app", "color", "none", &[]).unwrap(), "blue");
        assert_eq!(service.get_string("app", "missing", "none", &[]).unwrap(), "none");
    }

    #[test]
    fn context_replaces_scope_node() {
        let service = service();
        let base = service.tree().node("/project/alpha").unwrap();
        base.node("app").unwrap().put("color", "green").unwrap();
        service
            .set_lookup_order("app", None, Some(vec!["project".into(), "default".into()]))
            .unwrap();

        let context = NodeScopeContext::new("project", base);
        assert_eq!(service.get("app", "color", &[&context]).unwrap().as_deref(), Some("green"));
        assert_eq!(service.get("app", "color", &[]).unwrap().as_deref(), Some("black"));
    }

    #[test]
    fn typed_lookups_fall_back_on_bad_values() {
        let service = service();
        let node = service.tree().node("/instance/app").unwrap();
        node.put("count", "12").unwrap();
        node.put("flag", "TRUE").unwrap();
        node.put("ratio", "oops").unwrap();
        node.put_bytes("blob", &[1, 2, 3]).unwrap();

        assert_eq!(service.get_i32("app", "count", 0, &[]).unwrap(), 12);
        assert_eq!(service.get_i64("app", "count", 0, &[]).unwrap(), 12);
        assert!(service.get_bool("app", "flag", false, &[]).unwrap());
        assert!((service.get_f64("app", "ratio", 0.5, &[]).unwrap() - 0.5).abs() < f64::EPSILON);
        assert_eq!(service.get_bytes("app", "blob", &[], &[]).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn configured_default_order() {
        let locations = Locations {
            default_lookup_order: Some(vec!["default".into()]),
            ..Locations::default()
        };
        let service = PreferencesService::from_locations(PreferenceTree::new(), &locations).unwrap();
        assert_eq!(service.default_lookup_order(), vec!["default".to_string()]);
    }
}
