//! Minted token id recovery from transaction receipts.

use consent_core::effects::ConsentContract;
use consent_core::{ContractEvent, LogEntry, TokenId};
use tracing::trace;

/// First `ConsentMinted` event among `logs`.
///
/// Entries that do not decode against the contract ABI are expected (other
/// contracts, other events) and skipped.
pub fn extract_minted_token_id<C>(contract: &C, logs: &[LogEntry]) -> Option<TokenId>
where
    C: ConsentContract + ?Sized,
{
    logs.iter().find_map(|log| match contract.parse_log(log) {
        Ok(ContractEvent::ConsentMinted { token_id, .. }) => Some(token_id),
        Ok(_) => None,
        Err(error) => {
            trace!(address = %log.address, %error, "skipping undecodable log entry");
            None
        }
    })
}
