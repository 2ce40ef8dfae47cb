//! Strata Service - reading preferences across scopes
//!
//! Built on the tree from `strata-core` and the providers from
//! `strata-scopes`:
//! - [`PreferencesService`] resolves values through an ordered list of
//!   scopes, with per-qualifier and per-key [`LookupOrders`]
//! - [`ScopeContext`] lets a caller substitute the node read for a scope
//! - Subtree export and import in the versioned properties format
//! - [`LegacyPreferences`], a flat store view with defaults

#![warn(unreachable_pub)]

pub mod context;
pub mod error;
pub mod legacy;
pub mod lookup;
pub mod service;
pub mod transfer;

// Re-exports for convenience
pub use context::{NodeScopeContext, RootScopeContext, ScopeContext};
pub use error::{Result, ServiceError};
pub use legacy::{LegacyListener, LegacyPreferences, PropertyChangeEvent, PropertySource};
pub use lookup::{LookupOrders, DEFAULT_LOOKUP_ORDER};
pub use service::PreferencesService;
pub use transfer::{ImportIssue, ImportStatus, EXPORT_ROOT_PREFIX, LEGACY_IMPORT_SCOPE};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for service users
    pub use crate::{
        LegacyPreferences, LookupOrders, PreferencesService, ScopeContext, ServiceError,
    };
    pub use strata_core::prelude::*;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
