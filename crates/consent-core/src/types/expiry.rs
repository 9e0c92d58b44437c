//! Expiry instants.
//!
//! Milliseconds internally, seconds at the ledger boundary.

use serde::{Deserialize, Deserializer, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpiryParseError {
    #[error("expiry date is empty")]
    Empty,
    #[error("unrecognized expiry date: {0}")]
    Unrecognized(String),
    #[error("expiry date precedes the Unix epoch")]
    BeforeEpoch,
}

/// An absolute expiry instant in epoch milliseconds.
///
/// Deserializes from either a millisecond number or a date string
/// (RFC 3339, `YYYY-MM-DD`, or `YYYY-MM-DDTHH:MM`; the latter two are read
/// as UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ExpiryDate(u64);

impl ExpiryDate {
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub const fn from_epoch_seconds(seconds: u64) -> Self {
        Self(seconds.saturating_mul(1000))
    }

    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Whole seconds, truncated, as the contract expects.
    pub const fn as_epoch_seconds(self) -> u64 {
        self.0 / 1000
    }

    pub fn parse(text: &str) -> Result<Self, ExpiryParseError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ExpiryParseError::Empty);
        }
        if let Ok(millis) = text.parse::<u64>() {
            return Ok(Self(millis));
        }
        if let Ok(instant) = OffsetDateTime::parse(text, &Rfc3339) {
            return Self::from_offset(instant);
        }
        if let Ok(local) =
            PrimitiveDateTime::parse(text, format_description!("[year]-[month]-[day]T[hour]:[minute]"))
        {
            return Self::from_offset(local.assume_utc());
        }
        if let Ok(date) = Date::parse(text, format_description!("[year]-[month]-[day]")) {
            return Self::from_offset(date.midnight().assume_utc());
        }
        Err(ExpiryParseError::Unrecognized(text.to_string()))
    }

    fn from_offset(instant: OffsetDateTime) -> Result<Self, ExpiryParseError> {
        let millis = instant.unix_timestamp_nanos() / 1_000_000;
        u64::try_from(millis)
            .map(Self)
            .map_err(|_| ExpiryParseError::BeforeEpoch)
    }
}

impl<'de> Deserialize<'de> for ExpiryDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Input {
            Millis(u64),
            Text(String),
        }

        match Input::deserialize(deserializer)? {
            Input::Millis(millis) => Ok(Self(millis)),
            Input::Text(text) => Self::parse(&text).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calendar_date_is_utc_midnight() {
        let expiry = ExpiryDate::parse("2025-01-02").unwrap();
        assert_eq!(expiry.as_millis(), 1_735_776_000_000);
        assert_eq!(expiry.as_epoch_seconds(), 1_735_776_000);
    }

    #[test]
    fn accepts_rfc3339_and_datetime_local() {
        let rfc = ExpiryDate::parse("2025-01-02T00:30:00Z").unwrap();
        let local = ExpiryDate::parse("2025-01-02T00:30").unwrap();
        assert_eq!(rfc, local);
        assert_eq!(rfc.as_millis(), 1_735_777_800_000);
    }

    #[test]
    fn json_accepts_number_or_string() {
        let from_number: ExpiryDate = serde_json::from_str("1735776000000").unwrap();
        let from_text: ExpiryDate = serde_json::from_str("\"2025-01-02\"").unwrap();
        assert_eq!(from_number, from_text);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(ExpiryParseError::Empty, ExpiryDate::parse("  ").unwrap_err());
        assert!(matches!(
            ExpiryDate::parse("next tuesday"),
            Err(ExpiryParseError::Unrecognized(_))
        ));
    }
}
