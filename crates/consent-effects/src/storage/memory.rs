//! In-memory storage handler for testing

use async_trait::async_trait;
use consent_core::effects::{StorageEffects, StorageError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory storage handler for testing
#[derive(Debug, Clone, Default)]
pub struct MemoryStorageHandler {
    data: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorageHandler {
    /// Create a new memory storage handler
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

#[async_trait]
impl StorageEffects for MemoryStorageHandler {
    async fn store(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        data.insert(key.to_string(), value);
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let data = self.data.read().await;
        Ok(data.get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let mut data = self.data.write().await;
        Ok(data.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let data = self.data.read().await;
        Ok(data.contains_key(key))
    }

    async fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<String>, StorageError> {
        let data = self.data.read().await;
        let mut keys: Vec<String> = match prefix {
            Some(prefix) => data
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect(),
            None => data.keys().cloned().collect(),
        };
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_overwrites_and_remove_reports_presence() {
        let storage = MemoryStorageHandler::new();
        storage.store("consentTokens", b"[]".to_vec()).await.unwrap();
        storage.store("consentTokens", b"[1]".to_vec()).await.unwrap();

        assert_eq!(
            storage.retrieve("consentTokens").await.unwrap(),
            Some(b"[1]".to_vec())
        );
        assert!(storage.remove("consentTokens").await.unwrap());
        assert!(!storage.remove("consentTokens").await.unwrap());
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn list_keys_filters_by_prefix() {
        let storage = MemoryStorageHandler::new();
        for key in ["settings", "consentTokens", "detections"] {
            storage.store(key, Vec::new()).await.unwrap();
        }
        assert_eq!(
            storage.list_keys(Some("consent")).await.unwrap(),
            vec!["consentTokens".to_string()]
        );
        assert_eq!(storage.list_keys(None).await.unwrap().len(), 3);
    }
}
