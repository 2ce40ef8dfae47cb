//! Strata Scopes - the standard scope providers
//!
//! Everything that differs between root-level scopes lives here:
//! - [`Storage`] abstraction and the local file-system implementation
//! - [`Locations`] configuration (TOML + environment)
//! - File-backed persistence shared by [`InstanceScope`],
//!   [`ConfigurationScope`], [`UserScope`] and [`CustomScope`]
//! - [`DefaultScope`] with its layered default sources and
//!   [`CustomizerRegistry`]
//! - [`ScopeRegistry`], the resolver handed to the tree

#![warn(unreachable_pub)]

pub mod customizer;
pub mod default_scope;
pub mod error;
pub mod file_scope;
pub mod instance;
pub mod locations;
pub mod persistent;
pub mod registry;
pub mod storage;

// Re-exports for convenience
pub use customizer::{CustomizerFactory, CustomizerRegistry, DefaultsCustomizer};
pub use default_scope::{DefaultScope, DEFAULT_SCOPE};
pub use error::{Result, ScopeError};
pub use file_scope::FileScope;
pub use instance::{InstanceScope, INSTANCE_SCOPE};
pub use locations::{CustomScopeConfig, Locations};
pub use persistent::{
    ConfigurationScope, CustomScope, UserScope, CONFIGURATION_SCOPE, USER_SCOPE,
};
pub use registry::{ScopeFactory, ScopeRegistry};
pub use storage::{LocalStorage, Storage};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
