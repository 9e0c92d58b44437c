//! Domain error types for the consent agent
//!
//! Wraps the errors of the layers below so agent operations can use `?`
//! throughout.

use crate::config::ConfigError;
use consent_core::effects::{BridgeError, NotificationError, TimeError};
use consent_core::{ConsentError, ProtocolError};
use consent_ledger::LedgerError;
use thiserror::Error;

/// Result type for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    /// Store, serialization, or domain failure
    #[error(transparent)]
    Consent(#[from] ConsentError),

    /// A known action carried a malformed payload
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Page bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error("Time error: {0}")]
    Time(#[from] TimeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The router loop has shut down
    #[error("Message router is not running")]
    RouterStopped,
}
