//! # Consent Ledger - Layer 4: Ledger Client
//!
//! Wraps the abstract consent contract behind [`LedgerClient`]:
//!
//! - every mutation checks connection, outstanding contract error, and
//!   network before any call is made, then submits, waits for confirmation,
//!   recovers a minted token id from the receipt, and refreshes the view
//! - reads prefer the id-returning enumeration and fall back to the legacy
//!   call with synthesized ids
//! - read failures are classified into [`FetchError`] and held as persistent
//!   state instead of being propagated

#![allow(missing_docs)]
#![forbid(unsafe_code)]

pub mod classify;
pub mod client;
pub mod errors;
pub mod events;
pub mod records;

pub use classify::{classify, FetchError};
pub use client::{Confirmation, FetchOutcome, LedgerClient, SkipReason};
pub use errors::LedgerError;
pub use events::extract_minted_token_id;
