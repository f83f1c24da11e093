//! Error types for named lock operations.

use thiserror::Error;

/// Errors that can occur during lock operations.
///
/// Contention is never an error: a lock held by someone else is reported as
/// `Ok(false)`. These variants are reserved for the backend being unable to
/// answer at all, so callers can tell "try again later" from "give up".
#[derive(Error, Debug)]
pub enum LockError {
    /// Backend connection failed or was lost mid-operation.
    #[error("connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Backend answered, but not with anything the adapter understands.
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Invalid lock name.
    #[error("invalid lock name: {0}")]
    InvalidName(String),

    /// Configuration that cannot be honored and was not allowed to degrade.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl LockError {
    /// Wraps any driver error as a connection failure.
    pub fn connection(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Connection(Box::new(err))
    }

    /// Wraps a message as a backend failure.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(Box::new(std::io::Error::other(message.into())))
    }

    /// Returns true if the error means the backend could not be reached.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_message_is_displayed() {
        let err = LockError::backend("GET_LOCK returned NULL");
        assert_eq!(err.to_string(), "backend error: GET_LOCK returned NULL");
        assert!(!err.is_connection());
    }

    #[test]
    fn test_connection_wraps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = LockError::connection(io);
        assert!(err.is_connection());
        assert!(std::error::Error::source(&err).is_some());
    }
}
