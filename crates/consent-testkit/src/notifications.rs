//! Notification recorder

use async_trait::async_trait;
use consent_core::effects::{
    Notification, NotificationEffects, NotificationError, NotificationKind,
};
use parking_lot::Mutex;

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn count(&self, kind: NotificationKind) -> usize {
        self.sent.lock().iter().filter(|n| n.kind == kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }
}

#[async_trait]
impl NotificationEffects for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        self.sent.lock().push(notification);
        Ok(())
    }
}
