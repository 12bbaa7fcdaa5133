//! Unified error system for Tether
//!
//! One error type covers the store, the bridge and the state manager. Each
//! variant maps onto an [`ErrorKind`] so failures can cross the bridge as
//! plain data inside an [`Envelope`](crate::Envelope).

use serde::{Deserialize, Serialize};

use crate::envelope::{EnvelopeError, ErrorKind};

/// Unified error type for all Tether operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum TetherError {
    /// Requested id does not exist
    #[error("Not found: {message}")]
    NotFound {
        /// What was looked up
        message: String,
    },

    /// A dependent entity referenced an owner that does not exist
    #[error("Owner not found: {owner_id}")]
    OwnerNotFound {
        /// The unresolved owner id
        owner_id: String,
    },

    /// Neither the real nor the simulated target exposes the operation
    #[error("Unsupported operation: {operation}")]
    UnsupportedOperation {
        /// The operation name that was requested
        operation: String,
    },

    /// The real backend raised or reported a failure
    #[error("Backend error: {message}")]
    Backend {
        /// Original backend message, preserved verbatim
        message: String,
    },

    /// Patch or arguments contained unknown or malformed fields
    #[error("Validation error: {message}")]
    Validation {
        /// Description of the rejected input
        message: String,
    },

    /// A caller-imposed deadline expired before the call completed
    #[error("Operation {operation} timed out after {after_ms}ms")]
    Timeout {
        /// The operation that was raced against the deadline
        operation: String,
        /// The deadline in milliseconds
        after_ms: u64,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the serialization failure
        message: String,
    },

    /// Snapshot or file I/O failed
    #[error("Storage error: {message}")]
    Storage {
        /// Error message describing the storage failure
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl TetherError {
    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create an owner not found error
    pub fn owner_not_found(owner_id: impl Into<String>) -> Self {
        Self::OwnerNotFound {
            owner_id: owner_id.into(),
        }
    }

    /// Create an unsupported operation error
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            operation: operation.into(),
        }
    }

    /// Create a backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, after_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after_ms,
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The envelope-level kind of this error.
    ///
    /// Serialization and storage failures only happen inside the store's
    /// snapshot path and surface to callers as `Internal`.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::OwnerNotFound { .. } => ErrorKind::OwnerNotFound,
            Self::UnsupportedOperation { .. } => ErrorKind::UnsupportedOperation,
            Self::Backend { .. } => ErrorKind::BackendError,
            Self::Validation { .. } => ErrorKind::ValidationError,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Serialization { .. } | Self::Storage { .. } | Self::Internal { .. } => {
                ErrorKind::Internal
            }
        }
    }

    /// Convert into the data-level error descriptor carried by envelopes.
    #[must_use]
    pub fn to_envelope_error(&self) -> EnvelopeError {
        EnvelopeError::new(self.kind(), self.to_string())
    }
}

/// Standard Result type for Tether operations
pub type Result<T> = std::result::Result<T, TetherError>;

impl From<TetherError> for EnvelopeError {
    fn from(err: TetherError) -> Self {
        err.to_envelope_error()
    }
}

impl From<serde_json::Error> for TetherError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<std::io::Error> for TetherError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            _ => Self::storage(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(TetherError::not_found("x").kind(), ErrorKind::NotFound);
        assert_eq!(
            TetherError::owner_not_found("c1").kind(),
            ErrorKind::OwnerNotFound
        );
        assert_eq!(
            TetherError::unsupported("frobnicate").kind(),
            ErrorKind::UnsupportedOperation
        );
        assert_eq!(TetherError::backend("boom").kind(), ErrorKind::BackendError);
        assert_eq!(
            TetherError::validation("bad").kind(),
            ErrorKind::ValidationError
        );
        assert_eq!(TetherError::timeout("op", 5).kind(), ErrorKind::Timeout);
        assert_eq!(TetherError::storage("disk").kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_backend_message_preserved() {
        let err = TetherError::backend("connection reset by peer");
        let envelope_error = err.to_envelope_error();
        assert_eq!(envelope_error.kind, ErrorKind::BackendError);
        assert!(envelope_error.message.contains("connection reset by peer"));
    }

    #[test]
    fn test_io_error_conversion() {
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(
            TetherError::from(missing),
            TetherError::NotFound { .. }
        ));

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(
            TetherError::from(denied),
            TetherError::Storage { .. }
        ));
    }
}
