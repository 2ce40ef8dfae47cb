//! Error types for the service facade
//!
//! Import problems are not errors; they are reported through
//! [`ImportStatus`](crate::ImportStatus).

use strata_core::PreferenceError;

/// Service-layer errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Tree operation failed
    #[error(transparent)]
    Preference(#[from] PreferenceError),

    /// Lookup order registration rejected
    #[error("invalid lookup order: {0}")]
    InvalidLookupOrder(String),

    /// Reading or writing an import/export stream failed
    #[error("stream I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    /// Check if the error is an illegal-state (removed node) failure
    #[inline]
    #[must_use]
    pub fn is_removed(&self) -> bool {
        matches!(self, Self::Preference(err) if err.is_removed())
    }
}

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_errors_pass_through() {
        let err: ServiceError = PreferenceError::removed("/instance/app").into();
        assert!(err.is_removed());
        assert_eq!(err.to_string(), "node has been removed: /instance/app");
    }

    #[test]
    fn lookup_order_display() {
        let err = ServiceError::InvalidLookupOrder("empty".into());
        assert_eq!(err.to_string(), "invalid lookup order: empty");
    }
}
