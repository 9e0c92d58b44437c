//! Consent Reconciler
//!
//! Owns every write to the token collection and the detection log, and the
//! timers attached to tokens. Three kinds of input converge here:
//!
//! - local events (detection, issuance, revocation) applied speculatively
//! - lifecycle transitions, checked against the transition graph at the
//!   moment they are applied so stale or duplicated requests are no-ops
//! - confirmed ledger reads, which replace the cached view for the queried
//!   account outright
//!
//! Writes to each collection are read-modify-write over the whole value and
//! are serialized with one async mutex per collection.

use crate::store::ConsentStore;
use async_lock::Mutex;
use async_trait::async_trait;
use consent_core::effects::{LedgerObserver, PhysicalTimeEffects, TimerEffects};
use consent_core::timers::{expiry_reminder_at, ABANDON_TIMEOUT_MS, EXPIRY_REMINDER_LEAD_MS};
use consent_core::{
    apply_transition, Address, ConsentStatus, ConsentToken, DetectedConsent,
    DetectionEvent, DetectionId, DetectionStatus, ExpiryDate, IssuedConsent, Result, Settings,
    TabInfo, TimerName, TokenId, TokenIdSource, Transition, TransitionError,
};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Timer offsets used by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerPolicy {
    pub abandon_timeout_ms: u64,
    pub expiry_reminder_lead_ms: u64,
}

impl Default for TimerPolicy {
    fn default() -> Self {
        Self {
            abandon_timeout_ms: ABANDON_TIMEOUT_MS,
            expiry_reminder_lead_ms: EXPIRY_REMINDER_LEAD_MS,
        }
    }
}

/// Result of applying a lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied(ConsentToken),
    /// The token exists but the edge is not permitted from its current status.
    Stale(ConsentStatus),
    Unknown,
}

pub struct Reconciler {
    store: ConsentStore,
    clock: Arc<dyn PhysicalTimeEffects>,
    timers: Arc<dyn TimerEffects>,
    policy: TimerPolicy,
    tokens_lock: Mutex<()>,
    detections_lock: Mutex<()>,
    detection_seq: AtomicU64,
    /// Account of the most recent confirmed ledger read.
    session_account: RwLock<Option<Address>>,
}

impl Reconciler {
    pub fn new(
        store: ConsentStore,
        clock: Arc<dyn PhysicalTimeEffects>,
        timers: Arc<dyn TimerEffects>,
        policy: TimerPolicy,
    ) -> Self {
        Self {
            store,
            clock,
            timers,
            policy,
            tokens_lock: Mutex::new(()),
            detections_lock: Mutex::new(()),
            detection_seq: AtomicU64::new(0),
            session_account: RwLock::new(None),
        }
    }

    /// Idempotent first-run initialization of the store.
    pub async fn initialize(&self) -> Result<()> {
        self.store.initialize().await
    }

    async fn now(&self) -> Result<u64> {
        Ok(self.clock.now_ms().await?)
    }

    pub async fn tokens(&self) -> Result<Vec<ConsentToken>> {
        self.store.tokens().await
    }

    pub async fn token(&self, token_id: TokenId) -> Result<Option<ConsentToken>> {
        Ok(self
            .store
            .tokens()
            .await?
            .into_iter()
            .find(|token| token.token_id == Some(token_id)))
    }

    pub async fn status_of(&self, token_id: TokenId) -> Result<Option<ConsentStatus>> {
        Ok(self.token(token_id).await?.map(|token| token.status))
    }

    pub async fn detections(&self) -> Result<Vec<DetectionEvent>> {
        self.store.detections().await
    }

    pub async fn settings(&self) -> Result<Settings> {
        self.store.settings().await
    }

    pub async fn update_settings(&self, settings: Settings) -> Result<()> {
        self.store.save_settings(&settings).await?;
        info!(?settings, "settings updated");
        Ok(())
    }

    /// Append a detection. Never touches the token collection.
    pub async fn record_detection(
        &self,
        consent: DetectedConsent,
        tab: Option<&TabInfo>,
    ) -> Result<DetectionEvent> {
        let now = self.now().await?;
        let event = DetectionEvent {
            id: DetectionId::new(now, self.detection_seq.fetch_add(1, Ordering::Relaxed)),
            timestamp: now,
            url: tab.map(|tab| tab.url.clone()),
            tab_id: tab.map(|tab| tab.id),
            consent_data: consent,
            status: DetectionStatus::Detected,
        };

        let _guard = self.detections_lock.lock().await;
        let mut detections = self.store.detections().await?;
        detections.push(event.clone());
        self.store.save_detections(&detections).await?;

        info!(
            detection = event.id.as_str(),
            site = %event.consent_data.site_name,
            "consent prompt detected"
        );
        Ok(event)
    }

    /// Record a confirmed mint reported by the issuing page.
    ///
    /// A new id is stored as `Pending` and gets an abandon timer. An id that
    /// is already cached keeps its status; only a still-pending record is
    /// replaced and re-armed. An expiry reminder is scheduled when an expiry
    /// is known.
    ///
    /// The record belongs to the payload's owner, or else to the account of
    /// the last ledger read, so the next read for that account replaces it.
    pub async fn record_issued(&self, issued: IssuedConsent) -> Result<ConsentToken> {
        let now = self.now().await?;
        let owner = issued
            .owner
            .or_else(|| self.session_account.read().clone());
        let fresh = ConsentToken {
            token_id: issued.token_id,
            status: ConsentStatus::Pending,
            recipient: issued.recipient,
            purpose: issued.purpose,
            website: issued.site_name,
            data_fields: issued.data_fields,
            issued_at: now,
            expiry_date: issued.expiry_date.map(ExpiryDate::as_millis),
            revoked_at: None,
            is_revoked: false,
            owner,
            id_source: TokenIdSource::Issued,
        };

        let stored = {
            let _guard = self.tokens_lock.lock().await;
            let mut tokens = self.store.tokens().await?;
            let existing = fresh
                .token_id
                .and_then(|id| tokens.iter_mut().find(|token| token.token_id == Some(id)));

            let stored = match existing {
                Some(current) if current.status != ConsentStatus::Pending => {
                    debug!(
                        token_id = ?fresh.token_id,
                        status = %current.status,
                        "re-issue of a settled token, keeping status"
                    );
                    current.recipient = fresh.recipient;
                    current.purpose = fresh.purpose;
                    current.website = fresh.website;
                    current.data_fields = fresh.data_fields;
                    current.expiry_date = fresh.expiry_date.or(current.expiry_date);
                    current.clone()
                }
                Some(current) => {
                    *current = fresh;
                    current.clone()
                }
                None => {
                    tokens.push(fresh.clone());
                    fresh
                }
            };
            self.store.save_tokens(&tokens).await?;
            stored
        };

        let Some(token_id) = stored.token_id else {
            info!("speculative consent recorded without a token id");
            return Ok(stored);
        };
        info!(%token_id, status = %stored.status, "consent issued");

        if let Some(expiry) = stored.expiry_date {
            self.schedule_expiry_reminder(token_id, ExpiryDate::from_millis(expiry))
                .await?;
        }
        if stored.status == ConsentStatus::Pending {
            let name = TimerName::Abandon(token_id).to_string();
            self.timers
                .schedule_after(&name, self.policy.abandon_timeout_ms)
                .await?;
            debug!(timer = %name, delay_ms = self.policy.abandon_timeout_ms, "abandon timer armed");
        }
        Ok(stored)
    }

    /// Schedule `expiry_<id>` one lead interval before `expiry`.
    ///
    /// Returns the reminder time, or `None` when that time has already passed
    /// and nothing was registered.
    pub async fn schedule_expiry_reminder(
        &self,
        token_id: TokenId,
        expiry: ExpiryDate,
    ) -> Result<Option<u64>> {
        let now = self.now().await?;
        let Some(at) =
            expiry_reminder_at(expiry.as_millis(), self.policy.expiry_reminder_lead_ms, now)
        else {
            debug!(%token_id, "expiry reminder time already passed, not scheduled");
            return Ok(None);
        };
        let name = TimerName::Expiry(token_id).to_string();
        self.timers.schedule_at(&name, at).await?;
        info!(timer = %name, at_ms = at, "expiry reminder scheduled");
        Ok(Some(at))
    }

    /// Apply `transition` to the cached record for `token_id`.
    pub async fn apply(
        &self,
        token_id: TokenId,
        transition: Transition,
    ) -> Result<TransitionOutcome> {
        let now = self.now().await?;
        let outcome = {
            let _guard = self.tokens_lock.lock().await;
            let mut tokens = self.store.tokens().await?;
            let Some(current) = tokens
                .iter_mut()
                .find(|token| token.token_id == Some(token_id))
            else {
                debug!(%token_id, ?transition, "transition for unknown token ignored");
                return Ok(TransitionOutcome::Unknown);
            };

            match apply_transition(current, transition, now) {
                Ok(next) => {
                    *current = next.clone();
                    self.store.save_tokens(&tokens).await?;
                    TransitionOutcome::Applied(next)
                }
                Err(TransitionError::NotPermitted { from, to }) => {
                    debug!(%token_id, %from, %to, "stale transition ignored");
                    TransitionOutcome::Stale(from)
                }
            }
        };

        if let TransitionOutcome::Applied(token) = &outcome {
            info!(%token_id, status = %token.status, "consent status changed");
            self.release_timers(token_id, token.status).await;
        }
        Ok(outcome)
    }

    pub async fn revoke(&self, token_id: TokenId) -> Result<TransitionOutcome> {
        self.apply(token_id, Transition::Revoke).await
    }

    pub async fn activate(&self, token_id: TokenId) -> Result<TransitionOutcome> {
        self.apply(token_id, Transition::Activate).await
    }

    pub async fn abandon(&self, token_id: TokenId) -> Result<TransitionOutcome> {
        self.apply(token_id, Transition::Abandon).await
    }

    /// Replace the cached view for `account` with a confirmed ledger read.
    ///
    /// Every record owned by `account`, and every other record whose id the
    /// ledger returned, is dropped; the ledger records take their place.
    /// Positional ids from a legacy read never match other records by id.
    /// Nothing is merged field by field.
    pub async fn reconcile(&self, account: &Address, ledger_view: Vec<ConsentToken>) -> Result<()> {
        *self.session_account.write() = Some(account.clone());
        let released = {
            let _guard = self.tokens_lock.lock().await;
            let cached = self.store.tokens().await?;

            let confirmed: BTreeSet<TokenId> = ledger_view
                .iter()
                .filter(|token| token.id_source != TokenIdSource::Synthesized)
                .filter_map(|token| token.token_id)
                .collect();
            let (mut next, dropped): (Vec<ConsentToken>, Vec<ConsentToken>) =
                cached.into_iter().partition(|token| {
                    token.owner.as_ref() != Some(account)
                        && token.token_id.map_or(true, |id| !confirmed.contains(&id))
                });
            let previous: HashMap<TokenId, ConsentStatus> = dropped
                .iter()
                .filter_map(|token| token.token_id.map(|id| (id, token.status)))
                .collect();
            let replaced = ledger_view.len();
            next.extend(ledger_view.iter().cloned());
            self.store.save_tokens(&next).await?;
            info!(%account, replaced, total = next.len(), "cached view replaced by ledger read");

            ledger_view
                .iter()
                .filter_map(|token| {
                    let id = token.token_id?;
                    let was = previous.get(&id).copied()?;
                    (was != token.status).then_some((id, token.status))
                })
                .collect::<Vec<_>>()
        };

        for (token_id, status) in released {
            self.release_timers(token_id, status).await;
        }
        Ok(())
    }

    /// Best-effort cleanup of timers a status change makes moot. Firing
    /// handlers re-check state, so a failed clear only costs a no-op later.
    async fn release_timers(&self, token_id: TokenId, status: ConsentStatus) {
        let mut names = Vec::new();
        if status != ConsentStatus::Pending {
            names.push(TimerName::Abandon(token_id));
        }
        if status.is_final() {
            names.push(TimerName::Expiry(token_id));
        }
        for name in names {
            let name = name.to_string();
            match self.timers.clear(&name).await {
                Ok(true) => debug!(timer = %name, "timer cleared"),
                Ok(false) => {}
                Err(error) => warn!(timer = %name, %error, "failed to clear timer"),
            }
        }
    }
}

#[async_trait]
impl LedgerObserver for Reconciler {
    async fn ledger_view_refreshed(&self, account: &Address, tokens: Vec<ConsentToken>) {
        if let Err(error) = self.reconcile(account, tokens).await {
            warn!(%account, %error, "failed to apply ledger view");
        }
    }

    async fn mutation_confirmed(
        &self,
        account: &Address,
        token_id: TokenId,
        transition: Transition,
    ) {
        match self.apply(token_id, transition).await {
            Ok(TransitionOutcome::Applied(_)) => {
                debug!(%account, %token_id, ?transition, "ledger confirmation applied")
            }
            Ok(_) => {}
            Err(error) => warn!(%account, %token_id, %error, "failed to apply ledger confirmation"),
        }
    }
}
