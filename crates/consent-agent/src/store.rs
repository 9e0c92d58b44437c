//! Typed access to the durable store.
//!
//! Three keys, each read and written whole: `consentTokens`, `detections`,
//! and `settings`. Callers that read-modify-write a key must serialize
//! themselves; see [`crate::reconciler::Reconciler`].

use consent_core::effects::StorageEffects;
use consent_core::{ConsentToken, DetectionEvent, Result, Settings};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

pub const TOKENS_KEY: &str = "consentTokens";
pub const DETECTIONS_KEY: &str = "detections";
pub const SETTINGS_KEY: &str = "settings";

#[derive(Clone)]
pub struct ConsentStore {
    storage: Arc<dyn StorageEffects>,
}

impl ConsentStore {
    pub fn new(storage: Arc<dyn StorageEffects>) -> Self {
        Self { storage }
    }

    /// Seed the token list and settings when absent. Existing values are untouched.
    pub async fn initialize(&self) -> Result<()> {
        if !self.storage.exists(TOKENS_KEY).await? {
            self.save(TOKENS_KEY, &Vec::<ConsentToken>::new()).await?;
            debug!("initialized empty token collection");
        }
        if !self.storage.exists(SETTINGS_KEY).await? {
            self.save(SETTINGS_KEY, &Settings::default()).await?;
            debug!("initialized default settings");
        }
        Ok(())
    }

    pub async fn tokens(&self) -> Result<Vec<ConsentToken>> {
        self.load(TOKENS_KEY).await
    }

    pub async fn save_tokens(&self, tokens: &[ConsentToken]) -> Result<()> {
        self.save(TOKENS_KEY, &tokens).await
    }

    pub async fn detections(&self) -> Result<Vec<DetectionEvent>> {
        self.load(DETECTIONS_KEY).await
    }

    pub async fn save_detections(&self, detections: &[DetectionEvent]) -> Result<()> {
        self.save(DETECTIONS_KEY, &detections).await
    }

    pub async fn settings(&self) -> Result<Settings> {
        self.load(SETTINGS_KEY).await
    }

    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.save(SETTINGS_KEY, settings).await
    }

    async fn load<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        match self.storage.retrieve(key).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(T::default()),
        }
    }

    async fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.storage.store(key, bytes).await?;
        Ok(())
    }
}
