//! Ledger client errors

use crate::classify::FetchError;
use consent_core::ContractCallError;

/// Errors returned by mutating ledger operations.
///
/// The first three are precondition failures raised before any network call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Contract not initialized. Connect a wallet first.")]
    NotConnected,

    #[error("Contract error: {0}")]
    ContractError(FetchError),

    #[error("Wrong network: expected chain {expected}, wallet is on chain {actual}")]
    WrongNetwork { expected: u64, actual: u64 },

    #[error(transparent)]
    Call(#[from] ContractCallError),
}

impl LedgerError {
    /// True for failures raised before anything was sent to the ledger.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::ContractError(_) | Self::WrongNetwork { .. }
        )
    }
}
