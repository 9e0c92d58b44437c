//! Controllable clock for deterministic testing

use async_trait::async_trait;
use consent_core::effects::{PhysicalTime, PhysicalTimeEffects, TimeError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Clock that only moves when told to. Sleeping advances it instantly.
#[derive(Debug, Clone)]
pub struct ControllableClock {
    now_ms: Arc<AtomicU64>,
}

impl ControllableClock {
    pub fn new(initial_ms: u64) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(initial_ms)),
        }
    }

    pub fn now(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    pub fn set(&self, ms: u64) {
        self.now_ms.store(ms, Ordering::SeqCst);
    }

    /// Advance and return the new time.
    pub fn advance(&self, ms: u64) -> u64 {
        self.now_ms.fetch_add(ms, Ordering::SeqCst) + ms
    }
}

#[async_trait]
impl PhysicalTimeEffects for ControllableClock {
    async fn physical_time(&self) -> Result<PhysicalTime, TimeError> {
        Ok(PhysicalTime { ts_ms: self.now() })
    }

    async fn sleep_ms(&self, ms: u64) -> Result<(), TimeError> {
        self.advance(ms);
        Ok(())
    }
}
