//! Effect trait definitions.
//!
//! # Effect Classification
//!
//! - **Infrastructure effects** (`StorageEffects`, `PhysicalTimeEffects`,
//!   `TimerEffects`, `NotificationEffects`): stateless single-party handlers
//!   implemented in `consent-effects`.
//! - **Cross-context effects** (`PageScriptEffects`, `PageEndpoint`): typed
//!   RPC between the background process and page contexts.
//! - **Ledger effects** (`ConsentContract`, `LedgerObserver`): the abstract
//!   consent contract and the hook through which confirmed reads reach the
//!   reconciler.

pub mod bridge;
pub mod ledger;
pub mod notification;
pub mod storage;
pub mod time;
pub mod timer;

pub use bridge::{
    BridgeCall, BridgeError, BridgeOutcome, PageCommand, PageEndpoint, PageScriptEffects,
    ScriptTarget,
};
pub use ledger::{ConsentContract, LedgerObserver};
pub use notification::{
    Notification, NotificationAction, NotificationEffects, NotificationError, NotificationKind,
};
pub use storage::{StorageEffects, StorageError};
pub use time::{PhysicalTime, PhysicalTimeEffects, TimeError};
pub use timer::TimerEffects;
