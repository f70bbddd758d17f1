//! Error types for the Parkchat assistant backend.

use thiserror::Error;

/// Result type alias using the Parkchat error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for Parkchat services.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input or request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Persistent store error (relational session/message store)
    #[error("Store error: {0}")]
    Store(String),

    /// Write rejected by a uniqueness constraint (e.g. a second active
    /// session for the same user). Callers converge by re-reading the
    /// winner instead of failing the request.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Cache store error (Redis or equivalent). Always absorbed by the
    /// caching components; never propagates past them.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Agent handle construction or invocation error
    #[error("Agent error: {0}")]
    Agent(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Check if this is a uniqueness-constraint conflict.
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Check if this is a cache-layer error.
    pub const fn is_cache(&self) -> bool {
        matches!(self, Self::Cache(_))
    }

    /// Check if this is a persistent-store error.
    pub const fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Store("connection refused".to_string());
        assert_eq!(err.to_string(), "Store error: connection refused");
    }

    #[test]
    fn test_error_predicates() {
        assert!(Error::Conflict("dup".into()).is_conflict());
        assert!(!Error::Store("down".into()).is_conflict());
        assert!(Error::Cache("down".into()).is_cache());
        assert!(Error::Store("down".into()).is_store());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
