//! # Consent Effects - Layer 2: Effect Handlers
//!
//! Stateless handlers for the traits in `consent_core::effects`:
//!
//! - `storage/` - in-memory and one-file-per-key filesystem stores
//! - `time` - wall clock backed by `SystemTime` and Tokio sleep
//! - `timers` - named one-shot timers on Tokio tasks, firings delivered on a channel
//! - `notification` - notifications rendered as structured log events
//! - `bridge` - in-process page channel keyed by tab
//!
//! Nothing here knows about consent lifecycle rules; that lives in
//! `consent-agent`.

#![allow(missing_docs)]
#![forbid(unsafe_code)]

pub mod bridge;
pub mod notification;
pub mod storage;
pub mod time;
pub mod timers;

pub use bridge::InProcessPageChannel;
pub use notification::TracingNotificationHandler;
pub use storage::{FilesystemStorageHandler, MemoryStorageHandler};
pub use time::RealTimeHandler;
pub use timers::{TimerFirings, TokioTimerHandler};
