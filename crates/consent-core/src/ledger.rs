//! Ledger wire types.
//!
//! Shapes exchanged with the consent contract through
//! [`crate::effects::ConsentContract`]. Timestamps here are epoch seconds,
//! as the contract stores them.

use crate::types::{Address, TokenId};
use serde::{Deserialize, Serialize};

/// A consent record exactly as the contract returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConsentRecord {
    /// Recipient as returned by the contract, not yet normalized.
    pub recipient: String,
    pub purpose: String,
    /// Epoch seconds.
    pub expiry_date: u64,
    pub is_revoked: bool,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub data_fields: Option<String>,
    /// Numeric lifecycle code; absent on contracts that predate it.
    #[serde(default)]
    pub status: Option<u8>,
    /// Epoch seconds.
    #[serde(default)]
    pub issued_at: u64,
}

/// Handle for a submitted, not yet confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHandle {
    pub hash: String,
}

/// One log entry of a confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Emitting contract; logs from other contracts never decode.
    pub address: Address,
    pub topics: Vec<[u8; 32]>,
    pub data: Vec<u8>,
}

/// Confirmation of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub logs: Vec<LogEntry>,
}

/// Events the consent contract emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractEvent {
    ConsentMinted {
        token_id: TokenId,
        recipient: Option<Address>,
    },
    ConsentRevoked {
        token_id: TokenId,
    },
    ConsentStatusChanged {
        token_id: TokenId,
        status: u8,
    },
}

/// A log entry did not match any event in the contract ABI.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("log does not decode against the consent ABI: {0}")]
pub struct AbiDecodeError(pub String);

/// Provider-level error codes surfaced by contract calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallErrorCode {
    /// Result bytes did not decode against the ABI.
    BadData,
    /// The call reverted or the function does not exist.
    CallException,
    /// The provider could not interpret the node's error.
    UnknownError,
    /// Transport-level failure talking to the node.
    NetworkError,
    /// The wallet or user refused the request.
    ActionRejected,
    Other(String),
}

/// Error returned by any contract call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct ContractCallError {
    pub code: CallErrorCode,
    pub message: String,
    /// Message carried in the node's error payload, when present.
    #[serde(default)]
    pub data_message: Option<String>,
}

impl ContractCallError {
    pub fn new(code: CallErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data_message: None,
        }
    }

    pub fn with_data_message(mut self, data_message: impl Into<String>) -> Self {
        self.data_message = Some(data_message.into());
        self
    }
}
