#![deny(clippy::dbg_macro)]
#![deny(clippy::todo)]
#![allow(missing_docs)]
//! # Consent Core - Layer 1: Domain Model and Effect Interfaces
//!
//! Shared vocabulary for every other crate in the workspace:
//! - Consent-token records, identifiers, and normalized addresses
//! - The pure lifecycle state machine (`Pending → Active | Abandoned`,
//!   `Pending | Active → Revoked`)
//! - Named timers and their reminder arithmetic
//! - The background message protocol (closed sum type with an explicit
//!   unknown-kind branch)
//! - Issuance request parsing from the external entry-point URL
//! - Ledger wire types and the effect traits implemented in `consent-effects`
//!
//! ## Architecture Constraints
//!
//! This crate performs no I/O. Anything that touches storage, clocks, timers,
//! notifications, page contexts, or the ledger goes through a trait in
//! [`effects`] so handlers can be swapped for simulation and testing.

pub mod effects;
pub mod errors;
pub mod ledger;
pub mod messages;
pub mod request;
pub mod timers;
pub mod transitions;
pub mod types;

pub use errors::{ConsentError, Result};
pub use ledger::{
    AbiDecodeError, CallErrorCode, ContractCallError, ContractEvent, LogEntry, RawConsentRecord,
    TxHandle, TxReceipt,
};
pub use messages::{
    ConsentMessage, ExpiryReminderRequest, IssuedConsent, ProtocolError, RawMessage,
    RevokedConsent,
};
pub use request::{ConsentFormData, ConsentRequest, RequestError};
pub use timers::{TimerName, TimerNameError};
pub use transitions::{apply_transition, is_permitted, Transition, TransitionError};
pub use types::{
    Address, AddressError, ConsentStatus, ConsentToken, DetectedConsent, DetectionEvent,
    DetectionId, DetectionStatus, ExpiryDate, ExpiryParseError, Settings, TabId, TabInfo,
    TokenId, TokenIdSource,
};
