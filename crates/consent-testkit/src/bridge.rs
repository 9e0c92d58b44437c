//! Page channel recorder

use async_trait::async_trait;
use consent_core::effects::{
    BridgeCall, BridgeError, BridgeOutcome, PageCommand, PageScriptEffects, ScriptTarget,
};
use consent_core::TabId;
use parking_lot::Mutex;

/// Page channel with a fixed set of open tabs that all answer with the same
/// outcome (`NotRegistered` unless changed).
pub struct RecordingPageChannel {
    tabs: Mutex<Vec<TabId>>,
    outcome: Mutex<BridgeOutcome>,
    invocations: Mutex<Vec<(ScriptTarget, BridgeCall)>>,
    commands: Mutex<Vec<(TabId, PageCommand)>>,
}

impl RecordingPageChannel {
    pub fn with_tabs(tabs: impl IntoIterator<Item = u32>) -> Self {
        Self {
            tabs: Mutex::new(tabs.into_iter().map(TabId).collect()),
            outcome: Mutex::new(BridgeOutcome::NotRegistered),
            invocations: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn answer_with(&self, outcome: BridgeOutcome) {
        *self.outcome.lock() = outcome;
    }

    pub fn invocations(&self) -> Vec<(ScriptTarget, BridgeCall)> {
        self.invocations.lock().clone()
    }

    pub fn commands(&self) -> Vec<(TabId, PageCommand)> {
        self.commands.lock().clone()
    }
}

#[async_trait]
impl PageScriptEffects for RecordingPageChannel {
    async fn invoke(
        &self,
        target: ScriptTarget,
        call: BridgeCall,
    ) -> Result<Vec<(TabId, BridgeOutcome)>, BridgeError> {
        self.invocations.lock().push((target, call));
        let tabs = self.tabs.lock().clone();
        let outcome = self.outcome.lock().clone();
        match target {
            ScriptTarget::Tab(tab) if tabs.contains(&tab) => Ok(vec![(tab, outcome)]),
            ScriptTarget::Tab(tab) => Err(BridgeError::TabUnavailable(tab)),
            ScriptTarget::AllTabs => Ok(tabs.into_iter().map(|tab| (tab, outcome.clone())).collect()),
        }
    }

    async fn send_command(&self, tab: TabId, command: PageCommand) -> Result<(), BridgeError> {
        if !self.tabs.lock().contains(&tab) {
            return Err(BridgeError::TabUnavailable(tab));
        }
        self.commands.lock().push((tab, command));
        Ok(())
    }
}
