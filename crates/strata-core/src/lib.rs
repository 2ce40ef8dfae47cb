//! Strata Core - hierarchical preference tree
//!
//! The in-memory model shared by every scope:
//! - Slash-separated node paths and the path/key flattening rule
//! - Copy-on-write property maps with lock-free snapshot reads
//! - A node arena addressed through cheap [`Preferences`] handles
//! - Change events with panic-isolated listener dispatch
//! - The [`ScopeProvider`] contract and the injected [`LoadTracker`]
//!
//! # Example
//!
//! ```rust
//! use strata_core::PreferenceTree;
//!
//! let tree = PreferenceTree::new();
//! let node = tree.node("/scratch/editor").unwrap();
//! node.put_i32("tab.width", 4).unwrap();
//! assert_eq!(node.get_i32("tab.width", 8).unwrap(), 4);
//! ```

#![warn(unreachable_pub)]

pub mod codec;
pub mod convert;
pub mod error;
pub mod event;
pub mod node;
pub mod path;
pub mod property_map;
pub mod scope;
pub mod string_pool;
pub mod tree;

// Re-exports for convenience
pub use codec::{ParseIssue, ParsedProperties, Properties};
pub use error::{PreferenceError, Result};
pub use event::{
    ListenerId, NodeChangeEvent, NodeChangeKind, NodeListener, PreferenceChangeEvent,
    PreferenceListener,
};
pub use node::{PreferenceVisitor, Preferences};
pub use path::{decode_path, encode_path, NodePath, PathError};
pub use property_map::PropertyMap;
pub use scope::{LoadMode, LoadTracker, NoScopes, ScopeProvider, ScopeResolver, TransientScope};
pub use string_pool::StringPool;
pub use tree::{NodeId, PreferenceTree};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with preference trees
    pub use crate::{
        LoadMode, NodeChangeKind, NodePath, PreferenceError, PreferenceTree, Preferences,
        ScopeProvider, ScopeResolver,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
