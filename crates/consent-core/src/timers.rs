//! Named one-shot timers.
//!
//! Timer names are plain strings at the timer-service boundary
//! (`abandon_<id>`, `expiry_<id>`) and are parsed back here by stripping the
//! fixed prefix.

use crate::types::TokenId;
use std::fmt;
use std::str::FromStr;

/// Delay between issuance and automatic abandonment of a still-pending token.
pub const ABANDON_TIMEOUT_MS: u64 = 10 * 60 * 1000;

/// How long before expiry the reminder fires.
pub const EXPIRY_REMINDER_LEAD_MS: u64 = 24 * 60 * 60 * 1000;

const ABANDON_PREFIX: &str = "abandon_";
const EXPIRY_PREFIX: &str = "expiry_";

/// The two timer families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerName {
    Abandon(TokenId),
    Expiry(TokenId),
}

impl TimerName {
    pub fn token_id(self) -> TokenId {
        match self {
            Self::Abandon(id) | Self::Expiry(id) => id,
        }
    }
}

impl fmt::Display for TimerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abandon(id) => write!(f, "{ABANDON_PREFIX}{id}"),
            Self::Expiry(id) => write!(f, "{EXPIRY_PREFIX}{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimerNameError {
    #[error("unknown timer family: {0}")]
    UnknownFamily(String),
    #[error("timer {0} does not carry a numeric token id")]
    InvalidTokenId(String),
}

impl FromStr for TimerName {
    type Err = TimerNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (family, rest): (fn(TokenId) -> Self, &str) =
            if let Some(rest) = s.strip_prefix(ABANDON_PREFIX) {
                (Self::Abandon, rest)
            } else if let Some(rest) = s.strip_prefix(EXPIRY_PREFIX) {
                (Self::Expiry, rest)
            } else {
                return Err(TimerNameError::UnknownFamily(s.to_string()));
            };

        rest.parse::<TokenId>()
            .map(family)
            .map_err(|_| TimerNameError::InvalidTokenId(s.to_string()))
    }
}

/// Absolute reminder time for an expiry, or `None` when it has already passed.
pub fn expiry_reminder_at(expiry_ms: u64, lead_ms: u64, now_ms: u64) -> Option<u64> {
    expiry_ms
        .checked_sub(lead_ms)
        .filter(|reminder| *reminder > now_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_strings() {
        let abandon: TimerName = "abandon_42".parse().unwrap();
        assert_eq!(abandon, TimerName::Abandon(TokenId::new(42)));
        assert_eq!(TimerName::Expiry(TokenId::new(3)).to_string(), "expiry_3");
    }

    #[test]
    fn foreign_and_malformed_names_are_rejected() {
        assert!(matches!(
            "refresh_1".parse::<TimerName>(),
            Err(TimerNameError::UnknownFamily(_))
        ));
        assert!(matches!(
            "expiry_abc".parse::<TimerName>(),
            Err(TimerNameError::InvalidTokenId(_))
        ));
    }

    #[test]
    fn reminder_within_lead_window_is_skipped() {
        let now = 10 * EXPIRY_REMINDER_LEAD_MS;
        assert_eq!(
            expiry_reminder_at(now + 2 * EXPIRY_REMINDER_LEAD_MS, EXPIRY_REMINDER_LEAD_MS, now),
            Some(now + EXPIRY_REMINDER_LEAD_MS)
        );
        assert_eq!(
            expiry_reminder_at(now + EXPIRY_REMINDER_LEAD_MS - 1, EXPIRY_REMINDER_LEAD_MS, now),
            None
        );
        assert_eq!(expiry_reminder_at(5, EXPIRY_REMINDER_LEAD_MS, 0), None);
    }
}
