//! Real time effect handler for production use

use async_trait::async_trait;
use consent_core::effects::{PhysicalTime, PhysicalTimeEffects, TimeError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall clock backed by `SystemTime`
#[derive(Debug, Clone, Copy, Default)]
pub struct RealTimeHandler;

impl RealTimeHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PhysicalTimeEffects for RealTimeHandler {
    async fn physical_time(&self) -> Result<PhysicalTime, TimeError> {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| TimeError::ClockUnavailable {
                reason: e.to_string(),
            })?;
        Ok(PhysicalTime {
            ts_ms: elapsed.as_millis() as u64,
        })
    }

    async fn sleep_ms(&self, ms: u64) -> Result<(), TimeError> {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(())
    }
}
