#![deny(clippy::dbg_macro)]
#![deny(clippy::todo)]
#![allow(missing_docs)]
//! # Consent Agent - Layer 6: Runtime
//!
//! The background process and the page-side pieces that talk to it:
//!
//! - [`Reconciler`]: sole writer of the token collection and detection log;
//!   applies lifecycle transitions and replaces the cache with ledger reads
//! - [`MessageRouter`]: dispatches the message protocol and timer firings,
//!   owns notifications, page-bridge calls, and navigation scans
//! - [`PageBridge`]: page endpoint for activate/abandon-by-id, detection posting
//! - [`IssuanceFlow`]: issuance link → validated mint → `consentIssued`
//! - [`AgentBuilder`]: wires it together over the handlers in `consent-effects`

pub mod bridge;
pub mod config;
pub mod errors;
pub mod issuance;
pub mod logging;
pub mod reconciler;
pub mod router;
pub mod runtime;
pub mod store;
pub mod url_filter;

pub use bridge::{ConsentScanner, PageBridge};
pub use config::{ConfigError, ConsentAgentConfig};
pub use errors::{AgentError, Result};
pub use issuance::{IssuanceError, IssuanceFlow, Issued};
pub use logging::init_tracing;
pub use reconciler::{Reconciler, TimerPolicy, TransitionOutcome};
pub use router::{MessageRouter, RouterHandle, RouterInbox, RouterResponse, TimerOutcome};
pub use runtime::{AgentBuilder, ConsentRuntime};
pub use store::ConsentStore;
pub use url_filter::UrlFilter;
