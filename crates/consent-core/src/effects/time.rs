//! Physical clock interface.
//!
//! Handlers never read the system clock directly; production code goes
//! through `RealTimeHandler`, tests through a controllable clock.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Error type for time operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum TimeError {
    #[error("Clock unavailable: {reason}")]
    ClockUnavailable { reason: String },
    #[error("Timer {name} could not be scheduled: {reason}")]
    ScheduleFailed { name: String, reason: String },
    #[error("Time service unavailable")]
    ServiceUnavailable,
}

/// Wall-clock instant in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PhysicalTime {
    pub ts_ms: u64,
}

#[async_trait]
pub trait PhysicalTimeEffects: Send + Sync {
    async fn physical_time(&self) -> Result<PhysicalTime, TimeError>;
    async fn sleep_ms(&self, ms: u64) -> Result<(), TimeError>;

    /// Current time in epoch milliseconds.
    async fn now_ms(&self) -> Result<u64, TimeError> {
        self.physical_time().await.map(|t| t.ts_ms)
    }
}

/// Blanket implementation for Arc<T> where T: PhysicalTimeEffects
#[async_trait]
impl<T: PhysicalTimeEffects + ?Sized> PhysicalTimeEffects for Arc<T> {
    async fn physical_time(&self) -> Result<PhysicalTime, TimeError> {
        (**self).physical_time().await
    }

    async fn sleep_ms(&self, ms: u64) -> Result<(), TimeError> {
        (**self).sleep_ms(ms).await
    }
}
