//! Message Router
//!
//! Single inbound dispatch point of the background process. It decodes
//! messages into [`ConsentMessage`], drives the [`Reconciler`], and owns the
//! side effects the reconciler does not: notifications, page-bridge calls,
//! and navigation-triggered scans.
//!
//! [`RouterHandle`] is the cross-context entry: callers post messages and
//! await replies over a channel, while [`run`] processes them one at a time
//! together with timer firings. Page-bridge calls wait on ledger
//! confirmation, so they run on their own tasks and never hold up dispatch.

use crate::errors::{AgentError, Result};
use crate::reconciler::{Reconciler, TransitionOutcome};
use crate::url_filter::UrlFilter;
use consent_core::effects::{
    BridgeCall, BridgeOutcome, Notification, NotificationAction, NotificationEffects,
    NotificationKind, PageCommand, PageScriptEffects, PhysicalTimeEffects, ScriptTarget,
};
use consent_core::{
    ConsentMessage, ConsentStatus, ConsentToken, RawMessage, Settings, TabInfo, TimerName, TokenId,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Reply to a dispatched message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterResponse {
    None,
    Tokens(Vec<ConsentToken>),
}

/// What a timer firing led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerOutcome {
    /// The name is not one of ours.
    Ignored,
    /// State had moved on; nothing was done.
    Stale,
    /// Abandon call sent to every tab.
    AbandonRequested,
    Reminded,
    /// Reminder due but silenced by settings.
    Suppressed,
}

pub struct MessageRouter {
    reconciler: Arc<Reconciler>,
    notifier: Arc<dyn NotificationEffects>,
    pages: Arc<dyn PageScriptEffects>,
    clock: Arc<dyn PhysicalTimeEffects>,
    url_filter: UrlFilter,
    scan_delay_ms: u64,
    bridge_calls: Mutex<Vec<JoinHandle<()>>>,
}

impl MessageRouter {
    pub fn new(
        reconciler: Arc<Reconciler>,
        notifier: Arc<dyn NotificationEffects>,
        pages: Arc<dyn PageScriptEffects>,
        clock: Arc<dyn PhysicalTimeEffects>,
        url_filter: UrlFilter,
        scan_delay_ms: u64,
    ) -> Self {
        Self {
            reconciler,
            notifier,
            pages,
            clock,
            url_filter,
            scan_delay_ms,
            bridge_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// Decode and dispatch an envelope from the shared channel.
    pub async fn dispatch_raw(
        &self,
        raw: RawMessage,
        sender: Option<TabInfo>,
    ) -> Result<RouterResponse> {
        let message = ConsentMessage::from_raw(raw)?;
        self.dispatch(message, sender).await
    }

    pub async fn dispatch(
        &self,
        message: ConsentMessage,
        sender: Option<TabInfo>,
    ) -> Result<RouterResponse> {
        trace!(action = message.action(), "dispatching message");
        match message {
            ConsentMessage::ConsentDetected(consent) => {
                let event = self
                    .reconciler
                    .record_detection(consent, sender.as_ref())
                    .await?;
                self.alert(
                    NotificationKind::Detected,
                    "Consent Detected",
                    format!(
                        "Privacy consent detected on {}",
                        event.consent_data.site_name
                    ),
                )
                .await?;
            }
            ConsentMessage::ConsentIssued(issued) => {
                let site = issued.site_name.clone();
                self.reconciler.record_issued(issued).await?;
                self.alert(
                    NotificationKind::Issued,
                    "Consent Token Issued",
                    format!("Blockchain consent token created for {site}"),
                )
                .await?;
            }
            ConsentMessage::ConsentRevoked(revoked) => {
                match self.reconciler.revoke(revoked.token_id).await? {
                    TransitionOutcome::Applied(token) => {
                        let site = if revoked.site_name.is_empty() {
                            token.display_name().to_string()
                        } else {
                            revoked.site_name
                        };
                        self.alert(
                            NotificationKind::Revoked,
                            "Consent Revoked",
                            format!("Consent token revoked for {site}"),
                        )
                        .await?;
                    }
                    outcome => {
                        debug!(token_id = %revoked.token_id, ?outcome, "revocation not applied");
                    }
                }
            }
            ConsentMessage::GetConsentTokens => {
                return Ok(RouterResponse::Tokens(self.reconciler.tokens().await?));
            }
            ConsentMessage::ScheduleExpiryReminder(request) => {
                self.reconciler
                    .schedule_expiry_reminder(request.token_id, request.expiry_date)
                    .await?;
            }
            ConsentMessage::ActivateConsent { token_id } => {
                self.request_activation(token_id, sender.as_ref());
            }
            ConsentMessage::Unknown(action) => {
                trace!(%action, "ignoring message for another listener");
            }
        }
        Ok(RouterResponse::None)
    }

    /// Ask the sender's page to activate `token_id`.
    fn request_activation(&self, token_id: TokenId, sender: Option<&TabInfo>) {
        let Some(tab) = sender else {
            debug!(%token_id, "activation request without a sender tab ignored");
            return;
        };
        self.spawn_bridge_call(
            token_id,
            ScriptTarget::Tab(tab.id),
            BridgeCall::ActivateById(token_id),
        );
    }

    /// Invoke `call` on the target pages from a separate task. Outcomes are
    /// only logged; the ledger reports what the pages confirmed.
    fn spawn_bridge_call(&self, token_id: TokenId, target: ScriptTarget, call: BridgeCall) {
        let pages = Arc::clone(&self.pages);
        let task = tokio::spawn(async move {
            match pages.invoke(target, call).await {
                Ok(outcomes) => log_bridge_outcomes(token_id, &outcomes),
                Err(error) => warn!(%token_id, ?target, %error, "bridge call not delivered"),
            }
        });
        let mut calls = self.bridge_calls.lock();
        calls.retain(|call| !call.is_finished());
        calls.push(task);
    }

    /// Wait for every bridge call started so far.
    pub async fn settle_bridge_calls(&self) {
        let pending = std::mem::take(&mut *self.bridge_calls.lock());
        for task in pending {
            if let Err(error) = task.await {
                warn!(%error, "bridge call task did not complete");
            }
        }
    }

    /// Handle a timer firing by name. Every branch re-reads current state.
    pub async fn on_timer_fired(&self, name: &str) -> Result<TimerOutcome> {
        let timer = match name.parse::<TimerName>() {
            Ok(timer) => timer,
            Err(error) => {
                debug!(timer = name, %error, "ignoring foreign timer");
                return Ok(TimerOutcome::Ignored);
            }
        };
        info!(timer = name, "timer fired");

        match timer {
            TimerName::Abandon(token_id) => {
                if self.reconciler.status_of(token_id).await? != Some(ConsentStatus::Pending) {
                    debug!(%token_id, "abandon timer is stale");
                    return Ok(TimerOutcome::Stale);
                }
                self.spawn_bridge_call(
                    token_id,
                    ScriptTarget::AllTabs,
                    BridgeCall::AbandonById(token_id),
                );
                Ok(TimerOutcome::AbandonRequested)
            }
            TimerName::Expiry(token_id) => {
                let Some(token) = self.reconciler.token(token_id).await? else {
                    return Ok(TimerOutcome::Stale);
                };
                if token.status != ConsentStatus::Active {
                    debug!(%token_id, status = %token.status, "expiry reminder is stale");
                    return Ok(TimerOutcome::Stale);
                }
                let settings = self.reconciler.settings().await?;
                if !reminders_enabled(&settings) {
                    return Ok(TimerOutcome::Suppressed);
                }
                self.notifier
                    .notify(
                        Notification::new(
                            NotificationKind::ExpiryReminder,
                            "Consent Expiring Soon",
                            format!(
                                "Your consent for {} expires in 24 hours. Renew or revoke?",
                                token.display_name()
                            ),
                        )
                        .with_actions([NotificationAction::Renew, NotificationAction::Revoke]),
                    )
                    .await?;
                Ok(TimerOutcome::Reminded)
            }
        }
    }

    /// A tab finished loading. Returns whether a scan was requested.
    ///
    /// Waits the scan delay before sending, so callers on the router loop
    /// should run this on its own task.
    pub async fn on_navigation_complete(&self, tab: TabInfo) -> Result<bool> {
        let settings = self.reconciler.settings().await?;
        if !settings.auto_detection || !self.url_filter.should_scan(&tab.url) {
            trace!(tab = %tab.id, url = %tab.url, "navigation not scanned");
            return Ok(false);
        }
        self.clock.sleep_ms(self.scan_delay_ms).await?;
        self.pages
            .send_command(tab.id, PageCommand::ScanForConsent)
            .await?;
        debug!(tab = %tab.id, url = %tab.url, "consent scan requested");
        Ok(true)
    }

    async fn alert(
        &self,
        kind: NotificationKind,
        title: &str,
        message: String,
    ) -> Result<()> {
        if !self.reconciler.settings().await?.notifications {
            trace!(?kind, "notifications disabled");
            return Ok(());
        }
        self.notifier
            .notify(Notification::new(kind, title, message))
            .await?;
        Ok(())
    }
}

fn reminders_enabled(settings: &Settings) -> bool {
    settings.notifications && settings.expiry_reminders
}

fn log_bridge_outcomes(token_id: TokenId, outcomes: &[(consent_core::TabId, BridgeOutcome)]) {
    for (tab, outcome) in outcomes {
        match outcome {
            BridgeOutcome::Completed => info!(%token_id, %tab, "page completed bridge call"),
            BridgeOutcome::NotRegistered => {
                trace!(%token_id, %tab, "page has no bridge handler, skipped");
            }
            BridgeOutcome::Failed(reason) => {
                warn!(%token_id, %tab, %reason, "page bridge call failed");
            }
        }
    }
}

enum RouterCommand {
    Message {
        message: ConsentMessage,
        sender: Option<TabInfo>,
        reply: Option<oneshot::Sender<Result<RouterResponse>>>,
    },
    Navigation(TabInfo),
    TimerFired(String),
}

/// Cloneable sending side of the router loop.
#[derive(Clone)]
pub struct RouterHandle {
    commands: mpsc::UnboundedSender<RouterCommand>,
}

/// Receiving side, consumed by [`run`].
pub struct RouterInbox {
    commands: mpsc::UnboundedReceiver<RouterCommand>,
}

/// Create a connected handle and inbox.
pub fn channel() -> (RouterHandle, RouterInbox) {
    let (commands, receiver) = mpsc::unbounded_channel();
    (RouterHandle { commands }, RouterInbox { commands: receiver })
}

impl RouterHandle {
    fn send(&self, command: RouterCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| AgentError::RouterStopped)
    }

    /// Fire-and-forget delivery.
    pub fn post(&self, message: ConsentMessage, sender: Option<TabInfo>) -> Result<()> {
        self.send(RouterCommand::Message {
            message,
            sender,
            reply: None,
        })
    }

    /// Decode a raw envelope and post it.
    pub fn post_raw(&self, raw: RawMessage, sender: Option<TabInfo>) -> Result<()> {
        self.post(ConsentMessage::from_raw(raw)?, sender)
    }

    /// Deliver a message and wait for the router's reply.
    pub async fn request(
        &self,
        message: ConsentMessage,
        sender: Option<TabInfo>,
    ) -> Result<RouterResponse> {
        let (reply, response) = oneshot::channel();
        self.send(RouterCommand::Message {
            message,
            sender,
            reply: Some(reply),
        })?;
        response.await.map_err(|_| AgentError::RouterStopped)?
    }

    pub async fn consent_tokens(&self) -> Result<Vec<ConsentToken>> {
        match self.request(ConsentMessage::GetConsentTokens, None).await? {
            RouterResponse::Tokens(tokens) => Ok(tokens),
            RouterResponse::None => Ok(Vec::new()),
        }
    }

    pub fn navigation_complete(&self, tab: TabInfo) -> Result<()> {
        self.send(RouterCommand::Navigation(tab))
    }

    /// Inject a timer firing, as the timer service would.
    pub fn timer_fired(&self, name: impl Into<String>) -> Result<()> {
        self.send(RouterCommand::TimerFired(name.into()))
    }
}

/// Process router commands and timer firings until every handle is dropped.
///
/// Messages and firings are handled one at a time. Navigation scans and
/// page-bridge calls run on their own tasks.
pub async fn run(
    router: Arc<MessageRouter>,
    mut inbox: RouterInbox,
    mut firings: mpsc::UnboundedReceiver<String>,
) {
    let mut firings_open = true;
    loop {
        tokio::select! {
            command = inbox.commands.recv() => {
                let Some(command) = command else { break };
                handle_command(&router, command).await;
            }
            fired = firings.recv(), if firings_open => match fired {
                Some(name) => handle_firing(&router, &name).await,
                None => firings_open = false,
            },
        }
    }
    info!("message router stopped");
}

async fn handle_command(router: &Arc<MessageRouter>, command: RouterCommand) {
    match command {
        RouterCommand::Message {
            message,
            sender,
            reply,
        } => {
            let action = message.action().to_string();
            let result = router.dispatch(message, sender).await;
            if let Err(error) = &result {
                warn!(%action, %error, "message handling failed");
            }
            if let Some(reply) = reply {
                let _ = reply.send(result);
            }
        }
        RouterCommand::Navigation(tab) => {
            let router = Arc::clone(router);
            tokio::spawn(async move {
                if let Err(error) = router.on_navigation_complete(tab).await {
                    warn!(%error, "navigation scan failed");
                }
            });
        }
        RouterCommand::TimerFired(name) => handle_firing(router, &name).await,
    }
}

async fn handle_firing(router: &MessageRouter, name: &str) {
    match router.on_timer_fired(name).await {
        Ok(outcome) => debug!(timer = name, ?outcome, "timer handled"),
        Err(error) => warn!(timer = name, %error, "timer handling failed"),
    }
}
