//! In-process page channel
//!
//! Tabs register their page endpoint under a [`TabId`]. Calls to a single
//! tab fail when the tab is unknown; broadcasts reach whichever tabs are
//! registered at the time of the call.

use async_trait::async_trait;
use consent_core::effects::{
    BridgeCall, BridgeError, BridgeOutcome, PageCommand, PageEndpoint, PageScriptEffects,
    ScriptTarget,
};
use consent_core::TabId;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Default)]
pub struct InProcessPageChannel {
    tabs: Arc<RwLock<BTreeMap<TabId, Arc<dyn PageEndpoint>>>>,
}

impl InProcessPageChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a page endpoint to `tab`, replacing any earlier one.
    pub fn register(&self, tab: TabId, endpoint: Arc<dyn PageEndpoint>) {
        self.tabs.write().insert(tab, endpoint);
    }

    pub fn unregister(&self, tab: TabId) -> bool {
        self.tabs.write().remove(&tab).is_some()
    }

    pub fn tabs(&self) -> Vec<TabId> {
        self.tabs.read().keys().copied().collect()
    }

    fn endpoint(&self, tab: TabId) -> Result<Arc<dyn PageEndpoint>, BridgeError> {
        self.tabs
            .read()
            .get(&tab)
            .cloned()
            .ok_or(BridgeError::TabUnavailable(tab))
    }
}

#[async_trait]
impl PageScriptEffects for InProcessPageChannel {
    async fn invoke(
        &self,
        target: ScriptTarget,
        call: BridgeCall,
    ) -> Result<Vec<(TabId, BridgeOutcome)>, BridgeError> {
        // Snapshot so no lock is held across page calls.
        let endpoints: Vec<(TabId, Arc<dyn PageEndpoint>)> = match target {
            ScriptTarget::Tab(tab) => vec![(tab, self.endpoint(tab)?)],
            ScriptTarget::AllTabs => self
                .tabs
                .read()
                .iter()
                .map(|(tab, endpoint)| (*tab, Arc::clone(endpoint)))
                .collect(),
        };

        let mut outcomes = Vec::with_capacity(endpoints.len());
        for (tab, endpoint) in endpoints {
            let outcome = endpoint.call(call).await;
            debug!(%tab, ?call, ?outcome, "bridge call delivered");
            outcomes.push((tab, outcome));
        }
        Ok(outcomes)
    }

    async fn send_command(&self, tab: TabId, command: PageCommand) -> Result<(), BridgeError> {
        self.endpoint(tab)?.command(command).await;
        Ok(())
    }
}
