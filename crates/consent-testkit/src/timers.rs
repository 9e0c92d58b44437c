//! Timers that fire only when a test says so

use crate::time::ControllableClock;
use async_trait::async_trait;
use consent_core::effects::{TimeError, TimerEffects};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Records registrations against a [`ControllableClock`]; firing is driven
/// by the test through [`ManualTimerHandler::take_due`].
pub struct ManualTimerHandler {
    clock: ControllableClock,
    scheduled: Mutex<BTreeMap<String, u64>>,
    cleared: Mutex<Vec<String>>,
}

impl ManualTimerHandler {
    pub fn new(clock: ControllableClock) -> Self {
        Self {
            clock,
            scheduled: Mutex::new(BTreeMap::new()),
            cleared: Mutex::new(Vec::new()),
        }
    }

    /// Absolute fire time of a pending timer.
    pub fn scheduled_at(&self, name: &str) -> Option<u64> {
        self.scheduled.lock().get(name).copied()
    }

    pub fn scheduled(&self) -> BTreeMap<String, u64> {
        self.scheduled.lock().clone()
    }

    /// Names passed to `clear`, in call order.
    pub fn cleared(&self) -> Vec<String> {
        self.cleared.lock().clone()
    }

    /// Remove and return every timer due at the clock's current time, earliest first.
    pub fn take_due(&self) -> Vec<String> {
        let now = self.clock.now();
        let mut scheduled = self.scheduled.lock();
        let mut due: Vec<(u64, String)> = scheduled
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(name, at)| (*at, name.clone()))
            .collect();
        due.sort();
        for (_, name) in &due {
            scheduled.remove(name);
        }
        due.into_iter().map(|(_, name)| name).collect()
    }
}

#[async_trait]
impl TimerEffects for ManualTimerHandler {
    async fn schedule_at(&self, name: &str, at_ms: u64) -> Result<(), TimeError> {
        self.scheduled.lock().insert(name.to_string(), at_ms);
        Ok(())
    }

    async fn schedule_after(&self, name: &str, delay_ms: u64) -> Result<(), TimeError> {
        let at = self.clock.now().saturating_add(delay_ms);
        self.scheduled.lock().insert(name.to_string(), at);
        Ok(())
    }

    async fn clear(&self, name: &str) -> Result<bool, TimeError> {
        self.cleared.lock().push(name.to_string());
        Ok(self.scheduled.lock().remove(name).is_some())
    }
}
