//! Error types for veil

use thiserror::Error;

/// Result type for veil operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for veil
#[derive(Debug, Error)]
pub enum Error {
    /// The host refused to redefine a property (non-configurable)
    #[error("Property '{key}' on {object} is not configurable")]
    PropertyImmutable { object: String, key: String },

    /// A subtree or object could not be inspected (cross-origin, detached)
    #[error("Inaccessible: {0}")]
    Inaccessible(String),

    /// An exception raised by host behavior that must reach page code unchanged
    #[error("Uncaught {0}")]
    Thrown(String),

    /// A host value had an unexpected shape
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// A URL could not be parsed
    #[error("Malformed URL: {0}")]
    MalformedUrl(String),

    /// Configuration could not be interpreted
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a property-immutable error
    pub fn immutable(object: impl Into<String>, key: impl Into<String>) -> Self {
        Self::PropertyImmutable {
            object: object.into(),
            key: key.into(),
        }
    }

    /// Create a host `TypeError` that propagates to page code
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Thrown(format!("TypeError: {}", message.into()))
    }

    /// Create a DOM `IndexSizeError` that propagates to page code
    pub fn index_size(message: impl Into<String>) -> Self {
        Self::Thrown(format!("IndexSizeError: {}", message.into()))
    }

    /// Create a type mismatch error
    pub fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Check if this error is a page-visible exception rather than an internal failure
    pub fn is_thrown(&self) -> bool {
        matches!(self, Error::Thrown(_))
    }

    /// Check if this error means a hook could not be installed
    pub fn is_immutable(&self) -> bool {
        matches!(self, Error::PropertyImmutable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thrown_is_distinguished_from_internal() {
        assert!(Error::type_error("x is not a function").is_thrown());
        assert!(!Error::Inaccessible("iframe".into()).is_thrown());
        assert!(!Error::immutable("Window", "opener").is_thrown());
        assert!(Error::index_size("too large").is_thrown());
    }

    #[test]
    fn test_messages() {
        let err = Error::immutable("Navigator", "plugins");
        assert_eq!(
            err.to_string(),
            "Property 'plugins' on Navigator is not configurable"
        );
        assert!(err.is_immutable());
        assert_eq!(
            Error::type_error("boom").to_string(),
            "Uncaught TypeError: boom"
        );
    }
}
