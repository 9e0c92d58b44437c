//! Named one-shot timers on Tokio tasks
//!
//! Each armed timer is a sleeping task. Re-arming a name aborts the previous
//! task, and a generation check keeps an already-woken task from delivering
//! a stale firing. Firings are sent, by name, on the channel returned from
//! [`TokioTimerHandler::new`].

use async_trait::async_trait;
use consent_core::effects::{PhysicalTimeEffects, TimeError, TimerEffects};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Receiving half for timer firings.
pub type TimerFirings = mpsc::UnboundedReceiver<String>;

#[derive(Default)]
struct Registry {
    next_generation: u64,
    pending: HashMap<String, (u64, JoinHandle<()>)>,
}

/// Timer handler backed by `tokio::time::sleep`
#[derive(Clone)]
pub struct TokioTimerHandler {
    clock: Arc<dyn PhysicalTimeEffects>,
    registry: Arc<Mutex<Registry>>,
    firings: mpsc::UnboundedSender<String>,
}

impl TokioTimerHandler {
    /// Create a handler and the channel its firings arrive on.
    pub fn new(clock: Arc<dyn PhysicalTimeEffects>) -> (Self, TimerFirings) {
        let (firings, receiver) = mpsc::unbounded_channel();
        let handler = Self {
            clock,
            registry: Arc::new(Mutex::new(Registry::default())),
            firings,
        };
        (handler, receiver)
    }

    /// Names of timers that have not fired or been cleared.
    pub fn pending(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.lock().pending.keys().cloned().collect();
        names.sort();
        names
    }

    fn arm(&self, name: &str, delay_ms: u64) {
        let mut registry = self.registry.lock();
        registry.next_generation += 1;
        let generation = registry.next_generation;

        let owned = name.to_string();
        let shared = Arc::clone(&self.registry);
        let firings = self.firings.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let current = {
                let mut registry = shared.lock();
                match registry.pending.get(&owned) {
                    Some((armed, _)) if *armed == generation => {
                        registry.pending.remove(&owned);
                        true
                    }
                    _ => false,
                }
            };
            if current {
                trace!(timer = %owned, "timer fired");
                if firings.send(owned).is_err() {
                    debug!("timer firing dropped, receiver closed");
                }
            }
        });

        if let Some((_, previous)) = registry.pending.insert(name.to_string(), (generation, handle)) {
            previous.abort();
            debug!(timer = name, "replaced pending timer");
        }
    }
}

#[async_trait]
impl TimerEffects for TokioTimerHandler {
    async fn schedule_at(&self, name: &str, at_ms: u64) -> Result<(), TimeError> {
        let now = self.clock.now_ms().await?;
        self.arm(name, at_ms.saturating_sub(now));
        Ok(())
    }

    async fn schedule_after(&self, name: &str, delay_ms: u64) -> Result<(), TimeError> {
        self.arm(name, delay_ms);
        Ok(())
    }

    async fn clear(&self, name: &str) -> Result<bool, TimeError> {
        let removed = self.registry.lock().pending.remove(name);
        Ok(match removed {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RealTimeHandler;

    fn handler() -> (TokioTimerHandler, TimerFirings) {
        TokioTimerHandler::new(Arc::new(RealTimeHandler::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_a_name_replaces_the_earlier_timer() {
        let (timers, mut firings) = handler();
        timers.schedule_after("abandon_1", 50).await.unwrap();
        timers.schedule_after("abandon_1", 500).await.unwrap();
        assert_eq!(timers.pending(), vec!["abandon_1"]);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(firings.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(firings.recv().await.as_deref(), Some("abandon_1"));
        assert!(timers.pending().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cleared_timers_do_not_fire() {
        let (timers, mut firings) = handler();
        timers.schedule_after("expiry_3", 10).await.unwrap();
        assert!(timers.clear("expiry_3").await.unwrap());
        assert!(!timers.clear("expiry_3").await.unwrap());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(firings.try_recv().is_err());
    }
}
