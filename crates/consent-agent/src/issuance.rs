//! Issuance flow
//!
//! Turns an issuance link into a minted consent token: parse, validate,
//! mint, report the minted id to the background router, and pick where to
//! send the user next.

use crate::router::RouterHandle;
use consent_core::{
    ConsentFormData, ConsentMessage, ConsentRequest, ConsentStatus, IssuedConsent, RequestError,
    TabInfo, TokenId,
};
use consent_ledger::{LedgerClient, LedgerError};
use std::sync::Arc;
use tracing::{info, warn};

/// Failures shown to the user as a single line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IssuanceError {
    #[error("Please connect your wallet first")]
    WalletNotConnected,
    #[error("Please switch to BNB Smart Chain Testnet")]
    WrongNetwork,
    #[error("{0}")]
    Request(#[from] RequestError),
    #[error("Failed to issue consent token. Please try again.")]
    Ledger(#[source] LedgerError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issued {
    pub form: ConsentFormData,
    /// Absent when the receipt carried no `ConsentMinted` event.
    pub token_id: Option<TokenId>,
    pub tx_hash: String,
    /// Where to send the user next.
    pub redirect: String,
}

pub struct IssuanceFlow {
    ledger: Arc<LedgerClient>,
    router: Option<RouterHandle>,
    tab: Option<TabInfo>,
    consents_page: String,
}

impl IssuanceFlow {
    pub fn new(ledger: Arc<LedgerClient>, consents_page: impl Into<String>) -> Self {
        Self {
            ledger,
            router: None,
            tab: None,
            consents_page: consents_page.into(),
        }
    }

    /// Report minted tokens to the background router, as sent from `tab`.
    pub fn with_router(mut self, router: RouterHandle, tab: Option<TabInfo>) -> Self {
        self.router = Some(router);
        self.tab = tab;
        self
    }

    /// Parse the link and submit it.
    pub async fn submit_url(&self, link: &str) -> Result<Issued, IssuanceError> {
        let request = ConsentRequest::from_url(link)?;
        self.submit(&request).await
    }

    pub async fn submit(&self, request: &ConsentRequest) -> Result<Issued, IssuanceError> {
        if !self.ledger.is_connected() {
            return Err(IssuanceError::WalletNotConnected);
        }
        if !self.ledger.is_correct_network() {
            return Err(IssuanceError::WrongNetwork);
        }
        let form = request.validate()?;

        let confirmation = self.ledger.mint(&form).await.map_err(|error| {
            warn!(%error, "mint failed");
            IssuanceError::Ledger(error)
        })?;
        info!(token_id = ?confirmation.minted, tx = %confirmation.tx_hash, "consent minted");

        if let (Some(token_id), Some(router)) = (confirmation.minted, &self.router) {
            let issued = IssuedConsent {
                token_id: Some(token_id),
                status: Some(ConsentStatus::Pending),
                site_name: form.website.clone(),
                purpose: form.purpose.clone(),
                expiry_date: Some(form.expiry_date),
                recipient: form.recipient.clone(),
                data_fields: form.data_fields.clone(),
                owner: self.ledger.account(),
            };
            if let Err(error) = router.post(ConsentMessage::ConsentIssued(issued), self.tab.clone()) {
                warn!(%token_id, %error, "background router unavailable, issuance not reported");
            }
        }

        let redirect = if request.return_url.is_empty() {
            self.consents_page.clone()
        } else {
            request.return_url.clone()
        };
        Ok(Issued {
            form,
            token_id: confirmation.minted,
            tx_hash: confirmation.tx_hash,
            redirect,
        })
    }
}
