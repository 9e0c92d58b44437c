//! Named one-shot timer interface.
//!
//! A timer registered under an existing name replaces the earlier one.
//! Firings are delivered out of band (see `consent-effects::TokioTimerHandler`)
//! as the timer name; there is no guarantee a cleared timer never fires, so
//! consumers validate state when a firing arrives.

use super::time::TimeError;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait TimerEffects: Send + Sync {
    /// Fire `name` at the absolute epoch-millisecond time `at_ms`.
    async fn schedule_at(&self, name: &str, at_ms: u64) -> Result<(), TimeError>;

    /// Fire `name` after `delay_ms`.
    async fn schedule_after(&self, name: &str, delay_ms: u64) -> Result<(), TimeError>;

    /// Best-effort cancel. Returns whether a pending timer was found.
    async fn clear(&self, name: &str) -> Result<bool, TimeError>;
}

/// Blanket implementation for Arc<T> where T: TimerEffects
#[async_trait]
impl<T: TimerEffects + ?Sized> TimerEffects for Arc<T> {
    async fn schedule_at(&self, name: &str, at_ms: u64) -> Result<(), TimeError> {
        (**self).schedule_at(name, at_ms).await
    }

    async fn schedule_after(&self, name: &str, delay_ms: u64) -> Result<(), TimeError> {
        (**self).schedule_after(name, delay_ms).await
    }

    async fn clear(&self, name: &str) -> Result<bool, TimeError> {
        (**self).clear(name).await
    }
}
