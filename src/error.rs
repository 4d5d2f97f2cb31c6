//! Session error types

use thiserror::Error;

/// Errors that can occur during session operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SessionError {
    /// A cookie token failed authentication, expired, or a stored record is malformed
    #[error("Session decode error: {0}")]
    Decode(String),
    /// Session values could not be serialized for storage
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error from the document store
    #[error("Session store error: {0}")]
    Store(String),
    /// The cookie referenced a record that does not exist
    #[error("Session not found: {0}")]
    NotFound(String),
    /// Invalid store construction input (keys, collection names)
    #[error("Invalid session configuration: {0}")]
    Config(String),
}

impl SessionError {
    /// Whether the caller can continue with a fresh session.
    ///
    /// Tampered or expired tokens, corrupt records and records that no longer
    /// exist all fall into this category. Transient store failures do not.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SessionError::Decode(_) | SessionError::NotFound(_))
    }

    /// Whether the error was reported by the document store.
    pub fn is_store_error(&self) -> bool {
        matches!(self, SessionError::Store(_) | SessionError::NotFound(_))
    }
}

#[cfg(feature = "redis-store")]
impl From<redis::RedisError> for SessionError {
    fn from(err: redis::RedisError) -> Self {
        SessionError::Store(err.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(SessionError::Decode("bad mac".into()).is_recoverable());
        assert!(SessionError::NotFound("abc".into()).is_recoverable());
        assert!(SessionError::NotFound("abc".into()).is_store_error());
        assert!(!SessionError::Store("connection reset".into()).is_recoverable());
        assert!(SessionError::Store("connection reset".into()).is_store_error());
        assert!(!SessionError::Serialization("key".into()).is_recoverable());
    }
}
