//! Durable key-value store interface.
//!
//! Atomic per key, no ordering guarantees across keys. Values are opaque
//! bytes; typed access lives above this layer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Error type for storage operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum StorageError {
    #[error("Read failed for {key}: {reason}")]
    ReadFailed { key: String, reason: String },
    #[error("Write failed for {key}: {reason}")]
    WriteFailed { key: String, reason: String },
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait StorageEffects: Send + Sync {
    async fn store(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;
    async fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    async fn remove(&self, key: &str) -> Result<bool, StorageError>;
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;
    async fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<String>, StorageError>;
}

/// Blanket implementation for Arc<T> where T: StorageEffects
#[async_trait]
impl<T: StorageEffects + ?Sized> StorageEffects for Arc<T> {
    async fn store(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        (**self).store(key, value).await
    }

    async fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).retrieve(key).await
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        (**self).remove(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        (**self).exists(key).await
    }

    async fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<String>, StorageError> {
        (**self).list_keys(prefix).await
    }
}
