//! Runtime assembly
//!
//! [`AgentBuilder`] wires production handlers (unless overridden) into a
//! reconciler, a router loop on its own task, a ledger client that reports
//! reads to the reconciler, and an in-process page channel.

use crate::bridge::PageBridge;
use crate::config::ConsentAgentConfig;
use crate::errors::{AgentError, Result};
use crate::issuance::IssuanceFlow;
use crate::logging::init_tracing;
use crate::reconciler::{Reconciler, TimerPolicy};
use crate::router::{self, MessageRouter, RouterHandle};
use crate::store::ConsentStore;
use crate::url_filter::UrlFilter;
use consent_core::effects::{
    ConsentContract, NotificationEffects, PhysicalTimeEffects, StorageEffects,
};
use consent_core::{Address, TabId, TabInfo};
use consent_effects::{
    FilesystemStorageHandler, InProcessPageChannel, MemoryStorageHandler, RealTimeHandler,
    TokioTimerHandler, TracingNotificationHandler,
};
use consent_ledger::{FetchOutcome, LedgerClient};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct AgentBuilder {
    config: ConsentAgentConfig,
    storage: Option<Arc<dyn StorageEffects>>,
    clock: Option<Arc<dyn PhysicalTimeEffects>>,
    notifier: Option<Arc<dyn NotificationEffects>>,
}

impl AgentBuilder {
    pub fn new(config: ConsentAgentConfig) -> Self {
        Self {
            config,
            storage: None,
            clock: None,
            notifier: None,
        }
    }

    pub fn with_storage(mut self, storage: Arc<dyn StorageEffects>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Persist the store under `dir`.
    pub fn with_storage_dir(self, dir: impl Into<PathBuf>) -> Result<Self> {
        let storage = FilesystemStorageHandler::new(dir).map_err(consent_core::ConsentError::from)?;
        Ok(self.with_storage(Arc::new(storage)))
    }

    pub fn with_clock(mut self, clock: Arc<dyn PhysicalTimeEffects>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationEffects>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Validate the configuration, install tracing with the configured
    /// filter, initialize the store, and start the router loop.
    pub async fn start(self) -> Result<ConsentRuntime> {
        let Self {
            config,
            storage,
            clock,
            notifier,
        } = self;
        config.validate()?;
        if !init_tracing(&config.log_filter) {
            debug!("tracing subscriber already installed, log_filter not applied");
        }
        let contract_address = config.contract_address()?;

        let storage = storage.unwrap_or_else(|| Arc::new(MemoryStorageHandler::new()));
        let clock = clock.unwrap_or_else(|| Arc::new(RealTimeHandler::new()));
        let notifier = notifier.unwrap_or_else(|| Arc::new(TracingNotificationHandler::new()));
        let (timers, firings) = TokioTimerHandler::new(Arc::clone(&clock));

        let reconciler = Arc::new(Reconciler::new(
            ConsentStore::new(storage),
            Arc::clone(&clock),
            Arc::new(timers),
            TimerPolicy {
                abandon_timeout_ms: config.abandon_timeout_ms,
                expiry_reminder_lead_ms: config.expiry_reminder_lead_ms,
            },
        ));
        reconciler.initialize().await?;

        let pages = Arc::new(InProcessPageChannel::new());
        let router = Arc::new(MessageRouter::new(
            Arc::clone(&reconciler),
            notifier,
            pages.clone(),
            clock,
            UrlFilter::from_config(&config),
            config.scan_delay_ms,
        ));
        let (handle, inbox) = router::channel();
        let task = tokio::spawn(router::run(Arc::clone(&router), inbox, firings));

        let ledger = Arc::new(LedgerClient::new(config.expected_chain_id));
        ledger.set_observer(reconciler.clone());

        info!(
            contract = %contract_address,
            chain_id = config.expected_chain_id,
            "consent agent started"
        );
        Ok(ConsentRuntime {
            config,
            contract_address,
            reconciler,
            router,
            handle,
            ledger,
            pages,
            bridges: Mutex::new(BTreeMap::new()),
            task,
        })
    }
}

pub struct ConsentRuntime {
    config: ConsentAgentConfig,
    contract_address: Address,
    reconciler: Arc<Reconciler>,
    router: Arc<MessageRouter>,
    handle: RouterHandle,
    ledger: Arc<LedgerClient>,
    pages: Arc<InProcessPageChannel>,
    bridges: Mutex<BTreeMap<TabId, Arc<PageBridge>>>,
    task: JoinHandle<()>,
}

impl ConsentRuntime {
    pub fn config(&self) -> &ConsentAgentConfig {
        &self.config
    }

    pub fn handle(&self) -> RouterHandle {
        self.handle.clone()
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    pub fn ledger(&self) -> &Arc<LedgerClient> {
        &self.ledger
    }

    /// Connect the wallet session and register bridge handlers on open pages.
    pub async fn connect(
        &self,
        contract: Arc<dyn ConsentContract>,
        account: Address,
        chain_id: u64,
    ) -> Result<FetchOutcome> {
        if contract.address() != &self.contract_address {
            return Err(AgentError::Config(crate::config::ConfigError::Invalid(vec![
                format!(
                    "contract at {} does not match configured {}",
                    contract.address(),
                    self.contract_address
                ),
            ])));
        }
        let outcome = self.ledger.connect(contract, account, chain_id).await;
        for bridge in self.bridges.lock().values() {
            bridge.attach_ledger(Arc::clone(&self.ledger));
        }
        Ok(outcome)
    }

    /// End the wallet session. Open pages lose their bridge handlers.
    pub fn disconnect(&self) {
        self.ledger.disconnect();
        for bridge in self.bridges.lock().values() {
            bridge.detach_ledger();
        }
        info!("wallet session closed");
    }

    /// Open a page context on `tab` and reach it through the page channel.
    pub fn open_page(&self, tab: TabInfo) -> Arc<PageBridge> {
        let bridge = Arc::new(PageBridge::new(tab.clone(), self.handle()));
        if self.ledger.is_connected() {
            bridge.attach_ledger(Arc::clone(&self.ledger));
        }
        self.pages.register(tab.id, bridge.clone());
        self.bridges.lock().insert(tab.id, Arc::clone(&bridge));
        if let Err(error) = self.handle.navigation_complete(tab) {
            warn!(%error, "navigation not reported");
        }
        bridge
    }

    pub fn close_page(&self, tab: TabId) {
        self.pages.unregister(tab);
        self.bridges.lock().remove(&tab);
    }

    /// Issuance flow running on `tab`.
    pub fn issuance(&self, tab: Option<TabInfo>) -> IssuanceFlow {
        IssuanceFlow::new(Arc::clone(&self.ledger), self.config.consents_page.clone())
            .with_router(self.handle(), tab)
    }

    /// Stop the router loop. Pending timers stay armed but their firings are dropped.
    pub fn shutdown(self) {
        self.task.abort();
        info!("consent agent stopped");
    }
}
