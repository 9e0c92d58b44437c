//! User-visible notifications.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    Detected,
    Issued,
    Revoked,
    ExpiryReminder,
}

/// Buttons offered alongside a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationAction {
    Renew,
    Revoke,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub actions: Vec<NotificationAction>,
}

impl Notification {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            actions: Vec::new(),
        }
    }

    pub fn with_actions(mut self, actions: impl IntoIterator<Item = NotificationAction>) -> Self {
        self.actions.extend(actions);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum NotificationError {
    #[error("Notification delivery failed: {0}")]
    DeliveryFailed(String),
}

#[async_trait]
pub trait NotificationEffects: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError>;
}

/// Blanket implementation for Arc<T> where T: NotificationEffects
#[async_trait]
impl<T: NotificationEffects + ?Sized> NotificationEffects for Arc<T> {
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        (**self).notify(notification).await
    }
}
