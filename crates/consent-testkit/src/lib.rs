//! Consent Testing Infrastructure
//!
//! Deterministic fakes for every effect trait in `consent_core::effects`,
//! plus fixtures shared by the integration tests of the ledger and agent
//! crates.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(missing_docs)]
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! consent-testkit = { path = "../consent-testkit" }
//! ```
//!
//! ```rust,no_run
//! use consent_testkit::*;
//!
//! let clock = ControllableClock::new(1_700_000_000_000);
//! let timers = ManualTimerHandler::new(clock.clone());
//! let contract = MockConsentContract::new(contract_address(), account());
//! ```

pub mod bridge;
pub mod contract;
pub mod fixtures;
pub mod notifications;
pub mod time;
pub mod timers;

pub use bridge::RecordingPageChannel;
pub use contract::{ContractCall, MockConsentContract};
pub use fixtures::*;
pub use notifications::RecordingNotifier;
pub use time::ControllableClock;
pub use timers::ManualTimerHandler;

/// Install a test subscriber once; later calls are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
