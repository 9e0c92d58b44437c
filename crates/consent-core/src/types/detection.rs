//! Detection evidence posted by page contexts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Browser tab identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub u32);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The tab a message originated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
}

/// What a page reported when it saw a consent prompt.
///
/// This is unvalidated evidence; the recipient is kept as the raw string the
/// page supplied and is only normalized once a token is issued from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedConsent {
    pub site_name: String,
    #[serde(default)]
    pub data_types: Vec<String>,
    #[serde(default)]
    pub purpose: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_policy_url: Option<String>,
}

/// Locally generated, time-based detection identifier (`<millis>-<seq>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DetectionId(String);

impl DetectionId {
    /// Build an id from a millisecond timestamp and a per-process sequence.
    pub fn new(timestamp_ms: u64, sequence: u64) -> Self {
        Self(format!("{timestamp_ms}-{sequence}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DetectionStatus {
    #[default]
    Detected,
}

/// Append-only record of a detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionEvent {
    pub id: DetectionId,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<TabId>,
    pub consent_data: DetectedConsent,
    #[serde(default)]
    pub status: DetectionStatus,
}
