//! Read-path error classification
//!
//! Ledger read failures are never collapsed into one generic error: each
//! class carries its own user-facing message.

use consent_core::{Address, CallErrorCode, ContractCallError};
use serde::{Deserialize, Serialize};

const MISSING_TRIE_NODE: &str = "missing trie node";
const COULD_NOT_COALESCE: &str = "could not coalesce error";
const COULD_NOT_DECODE: &str = "could not decode result data";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum FetchError {
    /// No bytecode at the configured address.
    #[error("contract not deployed at {address}")]
    NotDeployed { address: Address },

    /// The response did not decode against the expected ABI.
    #[error("ABI mismatch: {detail}")]
    AbiMismatch { detail: String },

    /// The node could not locate historical state.
    #[error("RPC node out of sync: {detail}")]
    NodeDesync { detail: String },

    #[error("network connectivity failure: {detail}")]
    Connectivity { detail: String },

    /// The call reverted or the function does not exist.
    #[error("contract call failed: {detail}")]
    CallException { detail: String },

    #[error("{0}")]
    Unclassified(String),
}

impl FetchError {
    /// Single-line message for the persistent error banner.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotDeployed { address } => format!(
                "Contract not found at {address}. Please verify the contract is deployed on the configured network."
            ),
            Self::AbiMismatch { .. } => {
                "Contract ABI mismatch or contract not properly deployed. Please check the contract configuration.".to_string()
            }
            Self::NodeDesync { .. } => {
                "Blockchain node synchronization error: the RPC provider cannot retrieve contract data. Try again later or switch RPC endpoint.".to_string()
            }
            Self::Connectivity { .. } => {
                "Network connectivity issue: unable to reach the blockchain. Check your connection or switch RPC endpoint.".to_string()
            }
            Self::CallException { .. } => {
                "Contract function call failed. The contract may not be deployed or the function signature may be incorrect.".to_string()
            }
            Self::Unclassified(message) if message.is_empty() => "Failed to fetch consents".to_string(),
            Self::Unclassified(message) => message.clone(),
        }
    }
}

/// Classify a failed read call.
pub fn classify(error: &ContractCallError) -> FetchError {
    let detail = error.message.clone();

    if error
        .data_message
        .as_deref()
        .is_some_and(|message| message.contains(MISSING_TRIE_NODE))
    {
        return FetchError::NodeDesync { detail };
    }

    match &error.code {
        CallErrorCode::UnknownError if error.message.contains(COULD_NOT_COALESCE) => {
            FetchError::Connectivity { detail }
        }
        CallErrorCode::NetworkError => FetchError::Connectivity { detail },
        CallErrorCode::BadData => FetchError::AbiMismatch { detail },
        _ if error.message.contains(COULD_NOT_DECODE) => FetchError::AbiMismatch { detail },
        CallErrorCode::CallException => FetchError::CallException { detail },
        _ => FetchError::Unclassified(detail),
    }
}
