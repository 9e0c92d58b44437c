//! Notifications rendered as structured log events

use async_trait::async_trait;
use consent_core::effects::{Notification, NotificationEffects, NotificationError};
use tracing::info;

/// Emits every notification as an `info` event on the `consent::notify` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotificationHandler;

impl TracingNotificationHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationEffects for TracingNotificationHandler {
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        info!(
            target: "consent::notify",
            kind = ?notification.kind,
            actions = ?notification.actions,
            title = %notification.title,
            "{}",
            notification.message
        );
        Ok(())
    }
}
