//! Error types for scope providers and their configuration

use std::path::PathBuf;
use strata_core::PreferenceError;

/// Scope-layer errors
#[derive(Debug, thiserror::Error)]
pub enum ScopeError {
    /// Storage I/O failed
    #[error("I/O failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Locations file is not valid TOML for [`Locations`](crate::Locations)
    #[error("invalid locations config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Defaults customizer could not be constructed
    #[error("customizer for '{qualifier}' failed: {message}")]
    Customizer { qualifier: String, message: String },

    /// Custom scope declared with an unusable load-level depth
    #[error("scope '{scope}' needs a load-level depth of at least 2, got {depth}")]
    InvalidDepth { scope: String, depth: usize },
}

impl ScopeError {
    /// Create I/O error for a storage path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create customizer construction error
    pub fn customizer(qualifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Customizer {
            qualifier: qualifier.into(),
            message: message.into(),
        }
    }
}

impl From<ScopeError> for PreferenceError {
    fn from(err: ScopeError) -> Self {
        match err {
            ScopeError::Io { path, source } => PreferenceError::backing_store(path, source),
            ScopeError::Config { path, source } => PreferenceError::backing_store(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, source),
            ),
            other => PreferenceError::backing_store(
                PathBuf::new(),
                std::io::Error::new(std::io::ErrorKind::Other, other.to_string()),
            ),
        }
    }
}

/// Result type alias for scope operations
pub type Result<T> = std::result::Result<T, ScopeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_converts_to_backing_store() {
        let err = ScopeError::io(
            "/tmp/x.prefs",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let pref: PreferenceError = err.into();
        assert!(pref.is_backing_store());
        assert!(pref.to_string().contains("/tmp/x.prefs"));
    }

    #[test]
    fn customizer_display() {
        let err = ScopeError::customizer("app", "boom");
        assert_eq!(err.to_string(), "customizer for 'app' failed: boom");
    }
}
