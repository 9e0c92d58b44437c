//! Background message protocol.
//!
//! On the wire every message is `{action, data?, tokenId?}`. The channel is
//! shared with unrelated traffic, so unknown actions decode into
//! [`ConsentMessage::Unknown`] instead of failing.

use crate::types::{Address, ConsentStatus, DetectedConsent, ExpiryDate, TokenId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Untyped envelope as it arrives on the shared channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<u64>,
}

/// Payload of `consentIssued`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedConsent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<TokenId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ConsentStatus>,
    #[serde(default)]
    pub site_name: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<ExpiryDate>,
    pub recipient: Address,
    #[serde(default)]
    pub data_fields: String,
    /// Wallet account that minted the token, when the sender knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Address>,
}

/// Payload of `consentRevoked`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokedConsent {
    pub token_id: TokenId,
    #[serde(default)]
    pub site_name: String,
}

/// Payload of `scheduleExpiryReminder`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiryReminderRequest {
    pub token_id: TokenId,
    pub expiry_date: ExpiryDate,
}

/// Every message kind the router understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsentMessage {
    ConsentDetected(DetectedConsent),
    ConsentIssued(IssuedConsent),
    ConsentRevoked(RevokedConsent),
    GetConsentTokens,
    ScheduleExpiryReminder(ExpiryReminderRequest),
    ActivateConsent { token_id: TokenId },
    /// An action this protocol does not own.
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("message is not valid JSON: {0}")]
    Envelope(String),
    #[error("{action} requires a data payload")]
    MissingData { action: &'static str },
    #[error("{action} requires a top-level tokenId")]
    MissingTokenId { action: &'static str },
    #[error("{action} payload is malformed: {reason}")]
    MalformedData {
        action: &'static str,
        reason: String,
    },
}

impl ConsentMessage {
    pub const CONSENT_DETECTED: &'static str = "consentDetected";
    pub const CONSENT_ISSUED: &'static str = "consentIssued";
    pub const CONSENT_REVOKED: &'static str = "consentRevoked";
    pub const GET_CONSENT_TOKENS: &'static str = "getConsentTokens";
    pub const SCHEDULE_EXPIRY_REMINDER: &'static str = "scheduleExpiryReminder";
    pub const ACTIVATE_CONSENT: &'static str = "activateConsent";

    /// Wire name of this message's action.
    pub fn action(&self) -> &str {
        match self {
            Self::ConsentDetected(_) => Self::CONSENT_DETECTED,
            Self::ConsentIssued(_) => Self::CONSENT_ISSUED,
            Self::ConsentRevoked(_) => Self::CONSENT_REVOKED,
            Self::GetConsentTokens => Self::GET_CONSENT_TOKENS,
            Self::ScheduleExpiryReminder(_) => Self::SCHEDULE_EXPIRY_REMINDER,
            Self::ActivateConsent { .. } => Self::ACTIVATE_CONSENT,
            Self::Unknown(action) => action,
        }
    }

    /// Decode a JSON envelope.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let raw: RawMessage =
            serde_json::from_str(text).map_err(|e| ProtocolError::Envelope(e.to_string()))?;
        Self::from_raw(raw)
    }

    /// Decode a typed message from its envelope.
    pub fn from_raw(raw: RawMessage) -> Result<Self, ProtocolError> {
        let RawMessage {
            action,
            data,
            token_id,
        } = raw;

        let message = match action.as_str() {
            Self::CONSENT_DETECTED => {
                Self::ConsentDetected(decode_data(Self::CONSENT_DETECTED, data)?)
            }
            Self::CONSENT_ISSUED => Self::ConsentIssued(decode_data(Self::CONSENT_ISSUED, data)?),
            Self::CONSENT_REVOKED => {
                Self::ConsentRevoked(decode_data(Self::CONSENT_REVOKED, data)?)
            }
            Self::GET_CONSENT_TOKENS => Self::GetConsentTokens,
            Self::SCHEDULE_EXPIRY_REMINDER => {
                Self::ScheduleExpiryReminder(decode_data(Self::SCHEDULE_EXPIRY_REMINDER, data)?)
            }
            Self::ACTIVATE_CONSENT => {
                let token_id = token_id.ok_or(ProtocolError::MissingTokenId {
                    action: Self::ACTIVATE_CONSENT,
                })?;
                Self::ActivateConsent {
                    token_id: TokenId::new(token_id),
                }
            }
            _ => Self::Unknown(action.clone()),
        };
        Ok(message)
    }

    /// Encode into the wire envelope.
    pub fn to_raw(&self) -> Result<RawMessage, ProtocolError> {
        let action = self.action().to_string();
        let (data, token_id) = match self {
            Self::ConsentDetected(payload) => (Some(encode(Self::CONSENT_DETECTED, payload)?), None),
            Self::ConsentIssued(payload) => (Some(encode(Self::CONSENT_ISSUED, payload)?), None),
            Self::ConsentRevoked(payload) => (Some(encode(Self::CONSENT_REVOKED, payload)?), None),
            Self::ScheduleExpiryReminder(payload) => {
                (Some(encode(Self::SCHEDULE_EXPIRY_REMINDER, payload)?), None)
            }
            Self::ActivateConsent { token_id } => (None, Some(token_id.value())),
            Self::GetConsentTokens | Self::Unknown(_) => (None, None),
        };
        Ok(RawMessage {
            action,
            data,
            token_id,
        })
    }
}

fn decode_data<T: DeserializeOwned>(
    action: &'static str,
    data: Option<Value>,
) -> Result<T, ProtocolError> {
    let data = data.ok_or(ProtocolError::MissingData { action })?;
    serde_json::from_value(data).map_err(|e| ProtocolError::MalformedData {
        action,
        reason: e.to_string(),
    })
}

fn encode<T: Serialize>(action: &'static str, payload: &T) -> Result<Value, ProtocolError> {
    serde_json::to_value(payload).map_err(|e| ProtocolError::MalformedData {
        action,
        reason: e.to_string(),
    })
}
