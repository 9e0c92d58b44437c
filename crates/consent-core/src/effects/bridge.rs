//! Cross-context calls between the background process and page contexts.
//!
//! A page context registers a [`PageEndpoint`]. The background side reaches
//! it through [`PageScriptEffects`], either one tab or every open tab. A tab
//! whose endpoint has not registered its handlers answers
//! [`BridgeOutcome::NotRegistered`]; that is a normal outcome, not an error.

use crate::types::{TabId, TokenId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A ledger operation requested of a page context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BridgeCall {
    ActivateById(TokenId),
    AbandonById(TokenId),
}

impl BridgeCall {
    pub fn token_id(self) -> TokenId {
        match self {
            Self::ActivateById(id) | Self::AbandonById(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeOutcome {
    Completed,
    /// The page ran the call and it failed; the reason is informational.
    Failed(String),
    /// The page has no handler for this call yet.
    NotRegistered,
}

/// Where a bridge call is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptTarget {
    Tab(TabId),
    AllTabs,
}

/// Fire-and-forget commands sent to a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PageCommand {
    ScanForConsent,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum BridgeError {
    #[error("Tab {0} is not reachable")]
    TabUnavailable(TabId),
    #[error("Page channel closed")]
    ChannelClosed,
}

/// The page-side half of the bridge.
#[async_trait]
pub trait PageEndpoint: Send + Sync {
    async fn call(&self, call: BridgeCall) -> BridgeOutcome;
    async fn command(&self, command: PageCommand);
}

/// The background-side half of the bridge.
#[async_trait]
pub trait PageScriptEffects: Send + Sync {
    /// Deliver `call` to the target. Returns one outcome per reached tab.
    async fn invoke(
        &self,
        target: ScriptTarget,
        call: BridgeCall,
    ) -> Result<Vec<(TabId, BridgeOutcome)>, BridgeError>;

    async fn send_command(&self, tab: TabId, command: PageCommand) -> Result<(), BridgeError>;
}

/// Blanket implementation for Arc<T> where T: PageEndpoint
#[async_trait]
impl<T: PageEndpoint + ?Sized> PageEndpoint for Arc<T> {
    async fn call(&self, call: BridgeCall) -> BridgeOutcome {
        (**self).call(call).await
    }

    async fn command(&self, command: PageCommand) {
        (**self).command(command).await;
    }
}

/// Blanket implementation for Arc<T> where T: PageScriptEffects
#[async_trait]
impl<T: PageScriptEffects + ?Sized> PageScriptEffects for Arc<T> {
    async fn invoke(
        &self,
        target: ScriptTarget,
        call: BridgeCall,
    ) -> Result<Vec<(TabId, BridgeOutcome)>, BridgeError> {
        (**self).invoke(target, call).await
    }

    async fn send_command(&self, tab: TabId, command: PageCommand) -> Result<(), BridgeError> {
        (**self).send_command(tab, command).await
    }
}
