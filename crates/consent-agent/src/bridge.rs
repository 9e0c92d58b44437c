//! Page Bridge
//!
//! The page-side endpoint the background process calls into. Until the page
//! has attached its ledger session the activate/abandon handlers do not
//! exist and every call answers [`BridgeOutcome::NotRegistered`].
//!
//! The bridge also forwards detections found on the page to the router, and
//! serves `ScanForConsent` through an optional [`ConsentScanner`].

use crate::router::RouterHandle;
use async_trait::async_trait;
use consent_core::effects::{BridgeCall, BridgeOutcome, PageCommand, PageEndpoint};
use consent_core::{ConsentMessage, DetectedConsent, TabInfo, TokenId};
use consent_ledger::LedgerClient;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Looks for a consent prompt in the current page.
#[async_trait]
pub trait ConsentScanner: Send + Sync {
    async fn scan(&self) -> Option<DetectedConsent>;
}

pub struct PageBridge {
    tab: TabInfo,
    router: RouterHandle,
    ledger: RwLock<Option<Arc<LedgerClient>>>,
    scanner: RwLock<Option<Arc<dyn ConsentScanner>>>,
}

impl PageBridge {
    pub fn new(tab: TabInfo, router: RouterHandle) -> Self {
        Self {
            tab,
            router,
            ledger: RwLock::new(None),
            scanner: RwLock::new(None),
        }
    }

    pub fn tab(&self) -> &TabInfo {
        &self.tab
    }

    /// Register the activate/abandon handlers against `ledger`.
    pub fn attach_ledger(&self, ledger: Arc<LedgerClient>) {
        *self.ledger.write() = Some(ledger);
        debug!(tab = %self.tab.id, "page bridge handlers registered");
    }

    /// Drop the handlers; later calls answer `NotRegistered`.
    pub fn detach_ledger(&self) {
        if self.ledger.write().take().is_some() {
            debug!(tab = %self.tab.id, "page bridge handlers removed");
        }
    }

    pub fn set_scanner(&self, scanner: Arc<dyn ConsentScanner>) {
        *self.scanner.write() = Some(scanner);
    }

    pub fn is_registered(&self) -> bool {
        self.ledger.read().is_some()
    }

    /// Forward a detection to the router as `consentDetected`.
    pub fn post_detection(&self, consent: DetectedConsent) -> crate::Result<()> {
        self.router
            .post(ConsentMessage::ConsentDetected(consent), Some(self.tab.clone()))
    }

    /// Ask the background process to activate `token_id` on this page.
    pub fn request_activation(&self, token_id: TokenId) -> crate::Result<()> {
        self.router
            .post(ConsentMessage::ActivateConsent { token_id }, Some(self.tab.clone()))
    }

    pub async fn activate_by_id(&self, token_id: TokenId) -> BridgeOutcome {
        let Some(ledger) = self.ledger.read().clone() else {
            return BridgeOutcome::NotRegistered;
        };
        match ledger.activate(token_id).await {
            Ok(confirmation) => {
                info!(%token_id, tx = %confirmation.tx_hash, "consent activated from page bridge");
                BridgeOutcome::Completed
            }
            Err(error) => {
                warn!(%token_id, %error, "failed to activate consent from page bridge");
                BridgeOutcome::Failed(error.to_string())
            }
        }
    }

    /// Abandon `token_id` unless the confirmed view shows it already settled.
    pub async fn abandon_by_id(&self, token_id: TokenId) -> BridgeOutcome {
        let Some(ledger) = self.ledger.read().clone() else {
            return BridgeOutcome::NotRegistered;
        };
        let settled = ledger
            .consents()
            .into_iter()
            .find(|token| token.token_id == Some(token_id))
            .filter(|token| !token.is_pending())
            .map(|token| token.status);
        if let Some(status) = settled {
            debug!(%token_id, %status, "abandon skipped, token no longer pending");
            return BridgeOutcome::Completed;
        }
        match ledger.abandon(token_id).await {
            Ok(confirmation) => {
                info!(%token_id, tx = %confirmation.tx_hash, "consent abandoned from page bridge");
                BridgeOutcome::Completed
            }
            Err(error) => {
                warn!(%token_id, %error, "failed to abandon consent from page bridge");
                BridgeOutcome::Failed(error.to_string())
            }
        }
    }

    async fn scan(&self) {
        let Some(scanner) = self.scanner.read().clone() else {
            debug!(tab = %self.tab.id, "scan requested but no scanner installed");
            return;
        };
        if let Some(consent) = scanner.scan().await {
            if let Err(error) = self.post_detection(consent) {
                warn!(%error, "failed to post detection");
            }
        }
    }
}

#[async_trait]
impl PageEndpoint for PageBridge {
    async fn call(&self, call: BridgeCall) -> BridgeOutcome {
        match call {
            BridgeCall::ActivateById(token_id) => self.activate_by_id(token_id).await,
            BridgeCall::AbandonById(token_id) => self.abandon_by_id(token_id).await,
        }
    }

    async fn command(&self, command: PageCommand) {
        match command {
            PageCommand::ScanForConsent => self.scan().await,
        }
    }
}
