//! Normalized account and recipient addresses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors produced while normalizing an address string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("address must start with 0x")]
    MissingPrefix,
    #[error("address must be 40 hex characters, got {0}")]
    InvalidLength(usize),
    #[error("address contains non-hex characters")]
    InvalidHex,
}

/// A 20-byte ledger address held in canonical lower-case `0x…` form.
///
/// Two addresses compare equal iff they name the same account, regardless of
/// the checksum casing they were written with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse and normalize an address.
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or(AddressError::MissingPrefix)?;
        if body.len() != 40 {
            return Err(AddressError::InvalidLength(body.len()));
        }
        let bytes = hex::decode(body).map_err(|_| AddressError::InvalidHex)?;
        Ok(Self(format!("0x{}", hex::encode(bytes))))
    }

    /// Canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_casing_normalizes_to_same_address() {
        let checksummed = Address::parse("0x742d35Cc6634C0532925a3b8D4C9db96C4b5Da5e").unwrap();
        let lower = Address::parse("0x742d35cc6634c0532925a3b8d4c9db96c4b5da5e").unwrap();
        assert_eq!(checksummed, lower);
        assert_eq!(lower.as_str(), "0x742d35cc6634c0532925a3b8d4c9db96c4b5da5e");
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert_eq!(
            Address::parse("742d35cc6634c0532925a3b8d4c9db96c4b5da5e"),
            Err(AddressError::MissingPrefix)
        );
        assert_eq!(Address::parse("0x1234"), Err(AddressError::InvalidLength(4)));
        assert_eq!(
            Address::parse("0xzz2d35cc6634c0532925a3b8d4c9db96c4b5da5e"),
            Err(AddressError::InvalidHex)
        );
    }

    #[test]
    fn serde_normalizes_on_the_way_in() {
        let parsed: Address =
            serde_json::from_str("\"0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA\"").unwrap();
        assert_eq!(parsed.as_str(), "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    }
}
