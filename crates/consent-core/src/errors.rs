//! Unified error type for consent operations
//!
//! Effect-specific errors live beside their traits in [`crate::effects`];
//! this type is what callers above the effect layer see.

use crate::effects::{StorageError, TimeError};
use serde::{Deserialize, Serialize};

/// Unified error type for consent-domain operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ConsentError {
    /// Invalid input or configuration
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// Durable store operation failed
    #[error("Storage error: {message}")]
    Storage {
        /// Error message describing the storage failure
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the serialization failure
        message: String,
    },

    /// Clock or timer operation failed
    #[error("Time error: {message}")]
    Time {
        /// Error message describing the time failure
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl ConsentError {
    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a time error
    pub fn time(message: impl Into<String>) -> Self {
        Self::Time {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Standard Result type for consent operations
pub type Result<T> = std::result::Result<T, ConsentError>;

impl From<StorageError> for ConsentError {
    fn from(err: StorageError) -> Self {
        Self::storage(err.to_string())
    }
}

impl From<TimeError> for ConsentError {
    fn from(err: TimeError) -> Self {
        Self::time(err.to_string())
    }
}

impl From<serde_json::Error> for ConsentError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
