//! Error types for the preference tree
//!
//! Absent keys and children are never errors; reads resolve them through
//! caller-supplied defaults. What remains:
//! - illegal-state: any operation on a removed node
//! - backing-store: I/O failures while loading, saving, syncing or flushing
//! - malformed input: unparseable persisted or imported text

use crate::path::PathError;
use std::path::PathBuf;

/// Main preference error type
#[derive(Debug, thiserror::Error)]
pub enum PreferenceError {
    /// Node was removed; it accepts no further operations
    #[error("node has been removed: {path}")]
    Removed { path: String },

    /// Invalid node path
    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),

    /// Invalid key (keys must be non-empty)
    #[error("invalid key: '{0}'")]
    InvalidKey(String),

    /// I/O failure against the backing store
    #[error("backing store failure at {location}: {source}")]
    BackingStore {
        location: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed persisted or imported text
    #[error("malformed input at line {line}: {message}")]
    Malformed { line: usize, message: String },

    /// Scope has no registered provider
    #[error("unknown scope: '{0}'")]
    UnknownScope(String),

    /// Operation is not allowed on this node
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

impl PreferenceError {
    /// Create removed-node error
    pub fn removed(path: impl ToString) -> Self {
        Self::Removed {
            path: path.to_string(),
        }
    }

    /// Create backing-store error for a storage location
    pub fn backing_store(location: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::BackingStore {
            location: location.into(),
            source,
        }
    }

    /// Create malformed-input error
    pub fn malformed(line: usize, message: impl Into<String>) -> Self {
        Self::Malformed {
            line,
            message: message.into(),
        }
    }

    /// Check if error is an illegal-state (removed node) failure
    #[inline]
    #[must_use]
    pub fn is_removed(&self) -> bool {
        matches!(self, Self::Removed { .. })
    }

    /// Check if error came from the backing store
    #[inline]
    #[must_use]
    pub fn is_backing_store(&self) -> bool {
        matches!(self, Self::BackingStore { .. })
    }
}

/// Result type alias for preference operations
pub type Result<T> = std::result::Result<T, PreferenceError>;
