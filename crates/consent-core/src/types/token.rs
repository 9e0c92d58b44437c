//! Consent-token records and their lifecycle status.

use super::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ledger-assigned token identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(u64);

impl TokenId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl From<u64> for TokenId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TokenId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Self)
    }
}

/// Lifecycle status of a consent token.
///
/// The ledger is authoritative once a token is confirmed; before that the
/// status is speculative and defaults to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConsentStatus {
    #[default]
    #[serde(alias = "pending")]
    Pending,
    #[serde(alias = "active")]
    Active,
    #[serde(alias = "revoked")]
    Revoked,
    #[serde(alias = "abandoned")]
    Abandoned,
}

impl ConsentStatus {
    /// Map the contract's numeric status code.
    pub fn from_ledger_code(code: u8) -> Self {
        match code {
            0 => Self::Pending,
            1 => Self::Active,
            _ => Self::Abandoned,
        }
    }

    /// Derive status from the legacy revocation flag when no status code exists.
    pub fn from_revocation_flag(is_revoked: bool) -> Self {
        if is_revoked {
            Self::Revoked
        } else {
            Self::Active
        }
    }

    /// `Revoked` and `Abandoned` can never leave their state.
    pub fn is_final(self) -> bool {
        matches!(self, Self::Revoked | Self::Abandoned)
    }
}

impl fmt::Display for ConsentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "Pending",
            Self::Active => "Active",
            Self::Revoked => "Revoked",
            Self::Abandoned => "Abandoned",
        };
        f.write_str(name)
    }
}

/// Where a record's token id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TokenIdSource {
    /// Reported by the issuing page after the mint was confirmed.
    #[default]
    Issued,
    /// Returned by the ledger's enumeration call.
    Ledger,
    /// Positional index assigned by the legacy read fallback. Only stable
    /// while the ledger's return order is stable; never authoritative.
    Synthesized,
}

/// A consent token as cached in the durable store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentToken {
    /// Absent for a speculative record the ledger has not confirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<TokenId>,
    #[serde(default)]
    pub status: ConsentStatus,
    pub recipient: Address,
    pub purpose: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub data_fields: String,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub issued_at: u64,
    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<u64>,
    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<u64>,
    #[serde(default)]
    pub is_revoked: bool,
    /// Account whose ledger read produced this record; `None` for records
    /// created locally from an issuance message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Address>,
    #[serde(default)]
    pub id_source: TokenIdSource,
}

impl ConsentToken {
    /// Human-facing name used in notifications.
    pub fn display_name(&self) -> &str {
        if self.website.is_empty() {
            self.recipient.as_str()
        } else {
            &self.website
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ConsentStatus::Pending
    }
}
