//! Filesystem storage handler
//!
//! One file per key under a base directory. Writes go to a temporary file
//! that is synced and renamed over the target, so a reader sees either the
//! old value or the new one.

use async_trait::async_trait;
use consent_core::effects::{StorageEffects, StorageError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

const VALUE_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

/// Filesystem-backed durable store
#[derive(Debug, Clone)]
pub struct FilesystemStorageHandler {
    base_path: PathBuf,
}

impl FilesystemStorageHandler {
    /// Create a handler rooted at `base_path`, creating the directory if needed.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path).map_err(|e| {
            StorageError::Unavailable(format!(
                "Failed to create storage directory {}: {e}",
                base_path.display()
            ))
        })?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn validate_key(key: &str) -> Result<(), StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("Key cannot be empty".to_string()));
        }
        if key.len() > 255 {
            return Err(StorageError::InvalidKey(
                "Key too long (max 255 characters)".to_string(),
            ));
        }
        // Path traversal
        if key.contains("..") || key.contains('\0') || key.contains('/') || key.contains('\\') {
            return Err(StorageError::InvalidKey(format!(
                "Key contains invalid characters: {key}"
            )));
        }
        Ok(())
    }

    fn key_to_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{key}.{VALUE_EXTENSION}"))
    }

    async fn write_atomic(&self, key: &str, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        let write_failed = |reason: String| StorageError::WriteFailed {
            key: key.to_string(),
            reason,
        };

        let temp_path = path.with_extension(TEMP_EXTENSION);
        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| write_failed(format!("Failed to create temp file: {e}")))?;
        file.write_all(data)
            .await
            .map_err(|e| write_failed(format!("Failed to write data: {e}")))?;
        file.sync_all()
            .await
            .map_err(|e| write_failed(format!("Failed to sync: {e}")))?;

        fs::rename(&temp_path, path)
            .await
            .map_err(|e| write_failed(format!("Failed to rename temp file: {e}")))
    }
}

#[async_trait]
impl StorageEffects for FilesystemStorageHandler {
    async fn store(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        Self::validate_key(key)?;
        let path = self.key_to_path(key);
        self.write_atomic(key, &path, &value).await?;
        debug!(key, bytes = value.len(), "stored value");
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Self::validate_key(key)?;
        match fs::read(self.key_to_path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::ReadFailed {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        Self::validate_key(key)?;
        match fs::remove_file(self.key_to_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::WriteFailed {
                key: key.to_string(),
                reason: format!("Failed to remove file: {e}"),
            }),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Self::validate_key(key)?;
        fs::try_exists(self.key_to_path(key))
            .await
            .map_err(|e| StorageError::ReadFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    async fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<String>, StorageError> {
        let mut entries = fs::read_dir(&self.base_path)
            .await
            .map_err(|e| StorageError::Unavailable(format!("Failed to read directory: {e}")))?;

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::Unavailable(format!("Failed to read entry: {e}")))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(VALUE_EXTENSION) {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if prefix.map_or(true, |prefix| key.starts_with(prefix)) {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}
