//! User preferences held in the durable store.

use serde::{Deserialize, Serialize};

/// Process-wide user settings.
///
/// Initialized once with every option enabled when the store has none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Gates automatic page scanning after navigation.
    pub auto_detection: bool,
    /// Gates every user-visible alert.
    pub notifications: bool,
    /// Gates the 24-hour expiry reminder.
    pub expiry_reminders: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_detection: true,
            notifications: true,
            expiry_reminders: true,
        }
    }
}
