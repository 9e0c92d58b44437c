//! Shared fixtures

use consent_core::{
    Address, ConsentStatus, ConsentToken, ExpiryDate, IssuedConsent, RawConsentRecord, TokenId,
    TokenIdSource,
};

/// Chain id the fixtures treat as correct.
pub const TEST_CHAIN_ID: u64 = 97;

/// Fixed starting time for controllable clocks (2023-11-14T22:13:20Z).
pub const T0_MS: u64 = 1_700_000_000_000;

pub const HOUR_MS: u64 = 60 * 60 * 1000;

pub fn contract_address() -> Address {
    Address::parse("0x5fbdb2315678afecb367f032d93f642f64180aa3").unwrap()
}

/// The connected wallet account.
pub fn account() -> Address {
    Address::parse("0x1111111111111111111111111111111111111111").unwrap()
}

pub fn other_account() -> Address {
    Address::parse("0x2222222222222222222222222222222222222222").unwrap()
}

pub fn recipient() -> Address {
    Address::parse("0x742d35Cc6634C0532925a3b8D4C9db96C4b5Da5e").unwrap()
}

/// Ledger record as a current contract returns it.
pub fn raw_record(purpose: &str, status: Option<u8>, is_revoked: bool) -> RawConsentRecord {
    RawConsentRecord {
        recipient: "0x742d35Cc6634C0532925a3b8D4C9db96C4b5Da5e".to_string(),
        purpose: purpose.to_string(),
        expiry_date: 1_800_000_000,
        is_revoked,
        website: Some("shop.example".to_string()),
        data_fields: Some("email, name".to_string()),
        status,
        issued_at: 1_700_000_000,
    }
}

/// `consentIssued` payload for `token_id`.
pub fn issued(token_id: u64, expiry_ms: Option<u64>) -> IssuedConsent {
    IssuedConsent {
        token_id: Some(TokenId::new(token_id)),
        status: Some(ConsentStatus::Pending),
        site_name: "shop.example".to_string(),
        purpose: "Order updates".to_string(),
        expiry_date: expiry_ms.map(ExpiryDate::from_millis),
        recipient: recipient(),
        data_fields: "email".to_string(),
        owner: None,
    }
}

/// Cached token as a ledger read for [`account`] would produce it.
pub fn ledger_token(token_id: u64, status: ConsentStatus) -> ConsentToken {
    ConsentToken {
        token_id: Some(TokenId::new(token_id)),
        status,
        recipient: recipient(),
        purpose: "analytics".to_string(),
        website: "shop.example".to_string(),
        data_fields: "email".to_string(),
        issued_at: T0_MS,
        expiry_date: None,
        revoked_at: None,
        is_revoked: status == ConsentStatus::Revoked,
        owner: Some(account()),
        id_source: TokenIdSource::Ledger,
    }
}
