//! Consent domain types

mod address;
mod detection;
mod expiry;
mod settings;
mod token;

pub use address::{Address, AddressError};
pub use detection::{DetectedConsent, DetectionEvent, DetectionId, DetectionStatus, TabId, TabInfo};
pub use expiry::{ExpiryDate, ExpiryParseError};
pub use settings::Settings;
pub use token::{ConsentStatus, ConsentToken, TokenId, TokenIdSource};
