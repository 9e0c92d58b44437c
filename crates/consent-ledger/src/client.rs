//! Ledger client
//!
//! Holds the wallet session (contract, account, active chain), the
//! persistent contract error, and the last confirmed view. Mutations follow
//! one protocol: check preconditions, submit, wait for confirmation, recover
//! any minted token id, report the confirmed transition, refresh. Reads never return errors; a failed read is
//! classified and kept as the contract error, which blocks further reads and
//! mutations until the session is re-established or the error is cleared.

use crate::classify::{classify, FetchError};
use crate::errors::LedgerError;
use crate::events::extract_minted_token_id;
use crate::records;
use consent_core::effects::{ConsentContract, LedgerObserver};
use consent_core::{
    Address, ConsentFormData, ConsentToken, ContractCallError, TokenId, Transition, TxHandle,
};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Why a read was not attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotConnected,
    WrongNetwork,
    ContractError(FetchError),
}

/// Result of a read pass. The previous view is retained unless `Refreshed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Skipped(SkipReason),
    Refreshed(Vec<ConsentToken>),
    Failed(FetchError),
}

impl FetchOutcome {
    pub fn is_refreshed(&self) -> bool {
        matches!(self, Self::Refreshed(_))
    }
}

/// A confirmed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_hash: String,
    /// Token id recovered from a `ConsentMinted` event, if the receipt had one.
    pub minted: Option<TokenId>,
    /// The read pass that followed confirmation.
    pub refresh: FetchOutcome,
}

#[derive(Clone)]
struct Connection {
    contract: Arc<dyn ConsentContract>,
    account: Address,
    chain_id: u64,
}

#[derive(Default)]
struct Session {
    connection: Option<Connection>,
    contract_error: Option<FetchError>,
    observer: Option<Arc<dyn LedgerObserver>>,
    view: Vec<ConsentToken>,
}

pub struct LedgerClient {
    expected_chain_id: u64,
    session: RwLock<Session>,
}

impl LedgerClient {
    pub fn new(expected_chain_id: u64) -> Self {
        Self {
            expected_chain_id,
            session: RwLock::new(Session::default()),
        }
    }

    /// Deliver every successful read and confirmed lifecycle mutation to
    /// `observer`.
    pub fn set_observer(&self, observer: Arc<dyn LedgerObserver>) {
        self.session.write().observer = Some(observer);
    }

    pub fn expected_chain_id(&self) -> u64 {
        self.expected_chain_id
    }

    /// Establish the wallet session.
    ///
    /// Clears any outstanding contract error, then probes with a read. A
    /// failing probe is reported in the returned outcome, not as an error.
    pub async fn connect(
        &self,
        contract: Arc<dyn ConsentContract>,
        account: Address,
        chain_id: u64,
    ) -> FetchOutcome {
        info!(
            contract = %contract.address(),
            %account,
            chain_id,
            "ledger session established"
        );
        {
            let mut session = self.session.write();
            session.connection = Some(Connection {
                contract,
                account,
                chain_id,
            });
            session.contract_error = None;
        }
        let probe = self.fetch_consents().await;
        if let FetchOutcome::Failed(error) = &probe {
            warn!(%error, "contract connection probe failed");
        }
        probe
    }

    /// Record a wallet network change. Landing on the expected chain
    /// re-establishes the session.
    pub async fn switch_network(&self, chain_id: u64) -> FetchOutcome {
        let connection = {
            let mut session = self.session.write();
            let Some(connection) = session.connection.as_mut() else {
                return FetchOutcome::Skipped(SkipReason::NotConnected);
            };
            connection.chain_id = chain_id;
            connection.clone()
        };
        if chain_id != self.expected_chain_id {
            warn!(
                expected = self.expected_chain_id,
                actual = chain_id,
                "wallet switched to an unexpected network"
            );
            return FetchOutcome::Skipped(SkipReason::WrongNetwork);
        }
        self.connect(connection.contract, connection.account, chain_id)
            .await
    }

    pub fn disconnect(&self) {
        let mut session = self.session.write();
        session.connection = None;
        session.view.clear();
        debug!("ledger session closed");
    }

    pub fn is_connected(&self) -> bool {
        self.session.read().connection.is_some()
    }

    pub fn account(&self) -> Option<Address> {
        self.session
            .read()
            .connection
            .as_ref()
            .map(|connection| connection.account.clone())
    }

    pub fn is_correct_network(&self) -> bool {
        self.session
            .read()
            .connection
            .as_ref()
            .is_some_and(|connection| connection.chain_id == self.expected_chain_id)
    }

    /// Outstanding read failure, if any.
    pub fn contract_error(&self) -> Option<FetchError> {
        self.session.read().contract_error.clone()
    }

    pub fn clear_contract_error(&self) {
        if self.session.write().contract_error.take().is_some() {
            info!("contract error cleared");
        }
    }

    /// Last confirmed ledger view for the connected account.
    pub fn consents(&self) -> Vec<ConsentToken> {
        self.session.read().view.clone()
    }

    fn ensure_ready(&self) -> Result<Connection, LedgerError> {
        let session = self.session.read();
        let connection = session.connection.as_ref().ok_or(LedgerError::NotConnected)?;
        if let Some(error) = &session.contract_error {
            return Err(LedgerError::ContractError(error.clone()));
        }
        if connection.chain_id != self.expected_chain_id {
            return Err(LedgerError::WrongNetwork {
                expected: self.expected_chain_id,
                actual: connection.chain_id,
            });
        }
        Ok(connection.clone())
    }

    /// `lifecycle` names the token transition the mutation performs; the
    /// observer hears of it as soon as the receipt is in.
    async fn submit<F, Fut>(
        &self,
        operation: &'static str,
        lifecycle: Option<(TokenId, Transition)>,
        call: F,
    ) -> Result<Confirmation, LedgerError>
    where
        F: FnOnce(Arc<dyn ConsentContract>) -> Fut,
        Fut: Future<Output = Result<TxHandle, ContractCallError>>,
    {
        let connection = self.ensure_ready()?;

        let tx = call(Arc::clone(&connection.contract)).await.map_err(|error| {
            warn!(operation, %error, "ledger submission failed");
            LedgerError::Call(error)
        })?;
        info!(operation, tx = %tx.hash, "transaction submitted");

        let receipt = connection
            .contract
            .wait_for_receipt(&tx)
            .await
            .map_err(|error| {
                warn!(operation, tx = %tx.hash, %error, "confirmation failed");
                LedgerError::Call(error)
            })?;
        let minted = extract_minted_token_id(connection.contract.as_ref(), &receipt.logs);
        info!(operation, tx = %receipt.tx_hash, minted = ?minted, "transaction confirmed");

        if let Some((token_id, transition)) = lifecycle {
            let observer = self.session.read().observer.clone();
            if let Some(observer) = observer {
                observer
                    .mutation_confirmed(&connection.account, token_id, transition)
                    .await;
            }
        }

        let refresh = self.fetch_consents().await;
        Ok(Confirmation {
            tx_hash: receipt.tx_hash,
            minted,
            refresh,
        })
    }

    /// Mint a consent token. The contract creates it as `Pending`.
    pub async fn mint(&self, form: &ConsentFormData) -> Result<Confirmation, LedgerError> {
        let form = form.clone();
        self.submit("mint", None, move |contract| async move {
            contract
                .mint_consent(
                    &form.recipient,
                    &form.purpose,
                    form.expiry_date.as_epoch_seconds(),
                    &form.website,
                    &form.data_fields,
                )
                .await
        })
        .await
    }

    pub async fn revoke(&self, token_id: TokenId) -> Result<Confirmation, LedgerError> {
        let lifecycle = Some((token_id, Transition::Revoke));
        self.submit("revoke", lifecycle, move |contract| async move {
            contract.revoke_consent(token_id).await
        })
        .await
    }

    pub async fn activate(&self, token_id: TokenId) -> Result<Confirmation, LedgerError> {
        let lifecycle = Some((token_id, Transition::Activate));
        self.submit("activate", lifecycle, move |contract| async move {
            contract.activate_consent(token_id).await
        })
        .await
    }

    pub async fn abandon(&self, token_id: TokenId) -> Result<Confirmation, LedgerError> {
        let lifecycle = Some((token_id, Transition::Abandon));
        self.submit("abandon", lifecycle, move |contract| async move {
            contract.abandon_consent(token_id).await
        })
        .await
    }

    /// Read the connected account's consents and replace the cached view.
    pub async fn fetch_consents(&self) -> FetchOutcome {
        let (connection, observer) = {
            let session = self.session.read();
            let Some(connection) = session.connection.clone() else {
                return FetchOutcome::Skipped(SkipReason::NotConnected);
            };
            if connection.chain_id != self.expected_chain_id {
                return FetchOutcome::Skipped(SkipReason::WrongNetwork);
            }
            if let Some(error) = &session.contract_error {
                debug!(%error, "read skipped, contract error outstanding");
                return FetchOutcome::Skipped(SkipReason::ContractError(error.clone()));
            }
            (connection, session.observer.clone())
        };

        match read_ledger(&connection).await {
            Ok(tokens) => {
                info!(account = %connection.account, count = tokens.len(), "ledger view refreshed");
                self.session.write().view = tokens.clone();
                if let Some(observer) = observer {
                    observer
                        .ledger_view_refreshed(&connection.account, tokens.clone())
                        .await;
                }
                FetchOutcome::Refreshed(tokens)
            }
            Err(error) => {
                warn!(account = %connection.account, %error, "ledger read failed");
                self.session.write().contract_error = Some(error.clone());
                FetchOutcome::Failed(error)
            }
        }
    }
}

async fn read_ledger(connection: &Connection) -> Result<Vec<ConsentToken>, FetchError> {
    let contract = &connection.contract;
    let code = contract.code_at().await.map_err(|e| classify(&e))?;
    if code.is_empty() {
        return Err(FetchError::NotDeployed {
            address: contract.address().clone(),
        });
    }

    let account = &connection.account;
    match contract.get_my_consents_with_ids(account).await {
        Ok((ids, records)) => records::from_enumeration(account, ids, records),
        Err(error) => {
            debug!(%error, "enumeration with ids unavailable, using legacy read");
            let records = contract
                .get_my_consents(account)
                .await
                .map_err(|e| classify(&e))?;
            records::from_legacy(account, records)
        }
    }
}
