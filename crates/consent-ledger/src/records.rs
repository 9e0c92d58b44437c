//! Mapping of raw ledger records into cached consent tokens.

use crate::classify::FetchError;
use consent_core::{Address, ConsentStatus, ConsentToken, RawConsentRecord, TokenId, TokenIdSource};

/// Status of a ledger record.
///
/// A raised revocation flag always wins so status and flag never disagree;
/// otherwise the numeric status code is used when present, and records from
/// contracts without one are `Active`.
pub fn derive_status(record: &RawConsentRecord) -> ConsentStatus {
    if record.is_revoked {
        return ConsentStatus::Revoked;
    }
    match record.status {
        Some(code) => ConsentStatus::from_ledger_code(code),
        None => ConsentStatus::from_revocation_flag(false),
    }
}

/// Pair records with the ids returned alongside them.
pub fn from_enumeration(
    owner: &Address,
    ids: Vec<u64>,
    records: Vec<RawConsentRecord>,
) -> Result<Vec<ConsentToken>, FetchError> {
    if ids.len() != records.len() {
        return Err(FetchError::AbiMismatch {
            detail: format!("{} token ids for {} records", ids.len(), records.len()),
        });
    }
    ids.into_iter()
        .zip(records)
        .map(|(id, record)| to_token(owner, TokenId::new(id), TokenIdSource::Ledger, record))
        .collect()
}

/// Legacy read: ids are 1-based positions in the returned list.
pub fn from_legacy(
    owner: &Address,
    records: Vec<RawConsentRecord>,
) -> Result<Vec<ConsentToken>, FetchError> {
    records
        .into_iter()
        .zip(1u64..)
        .map(|(record, position)| {
            to_token(
                owner,
                TokenId::new(position),
                TokenIdSource::Synthesized,
                record,
            )
        })
        .collect()
}

fn to_token(
    owner: &Address,
    token_id: TokenId,
    id_source: TokenIdSource,
    record: RawConsentRecord,
) -> Result<ConsentToken, FetchError> {
    let recipient = Address::parse(&record.recipient).map_err(|e| FetchError::AbiMismatch {
        detail: format!("token {token_id} recipient {:?}: {e}", record.recipient),
    })?;
    let status = derive_status(&record);

    Ok(ConsentToken {
        token_id: Some(token_id),
        status,
        recipient,
        purpose: record.purpose,
        website: record.website.unwrap_or_default(),
        data_fields: record.data_fields.unwrap_or_default(),
        issued_at: record.issued_at.saturating_mul(1000),
        expiry_date: (record.expiry_date > 0).then(|| record.expiry_date.saturating_mul(1000)),
        revoked_at: None,
        is_revoked: status == ConsentStatus::Revoked,
        owner: Some(owner.clone()),
        id_source,
    })
}
