//! Consent contract interface.
//!
//! The contract is treated as an abstract service: this trait carries the
//! calls the client needs and nothing about how they are transported or
//! signed. Event decoding belongs to the contract as well, since only it
//! knows its own ABI.

use crate::ledger::{
    AbiDecodeError, ContractCallError, ContractEvent, LogEntry, RawConsentRecord, TxHandle,
    TxReceipt,
};
use crate::transitions::Transition;
use crate::types::{Address, ConsentToken, TokenId};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait ConsentContract: Send + Sync {
    /// Address the contract is deployed at.
    fn address(&self) -> &Address;

    /// Deployed bytecode at the contract address; empty when nothing is deployed.
    async fn code_at(&self) -> Result<Vec<u8>, ContractCallError>;

    /// Submit a mint. Timestamps are epoch seconds.
    async fn mint_consent(
        &self,
        recipient: &Address,
        purpose: &str,
        expiry_secs: u64,
        website: &str,
        data_fields: &str,
    ) -> Result<TxHandle, ContractCallError>;

    async fn revoke_consent(&self, token_id: TokenId) -> Result<TxHandle, ContractCallError>;
    async fn activate_consent(&self, token_id: TokenId) -> Result<TxHandle, ContractCallError>;
    async fn abandon_consent(&self, token_id: TokenId) -> Result<TxHandle, ContractCallError>;

    /// Block until the transaction is confirmed.
    async fn wait_for_receipt(&self, tx: &TxHandle) -> Result<TxReceipt, ContractCallError>;

    /// Records owned by `account`, paired positionally with their ids.
    async fn get_my_consents_with_ids(
        &self,
        account: &Address,
    ) -> Result<(Vec<u64>, Vec<RawConsentRecord>), ContractCallError>;

    /// Legacy enumeration without ids.
    async fn get_my_consents(
        &self,
        account: &Address,
    ) -> Result<Vec<RawConsentRecord>, ContractCallError>;

    /// Decode a log entry against the contract ABI.
    fn parse_log(&self, log: &LogEntry) -> Result<ContractEvent, AbiDecodeError>;
}

/// Receives every successful ledger read and every confirmed lifecycle
/// mutation.
#[async_trait]
pub trait LedgerObserver: Send + Sync {
    /// `tokens` is the complete ledger view for `account`.
    async fn ledger_view_refreshed(&self, account: &Address, tokens: Vec<ConsentToken>);

    /// The ledger confirmed `transition` on `token_id`. Delivered before the
    /// follow-up read, which may fail.
    async fn mutation_confirmed(
        &self,
        account: &Address,
        token_id: TokenId,
        transition: Transition,
    );
}

/// Blanket implementation for Arc<T> where T: ConsentContract
#[async_trait]
impl<T: ConsentContract + ?Sized> ConsentContract for Arc<T> {
    fn address(&self) -> &Address {
        (**self).address()
    }

    async fn code_at(&self) -> Result<Vec<u8>, ContractCallError> {
        (**self).code_at().await
    }

    async fn mint_consent(
        &self,
        recipient: &Address,
        purpose: &str,
        expiry_secs: u64,
        website: &str,
        data_fields: &str,
    ) -> Result<TxHandle, ContractCallError> {
        (**self)
            .mint_consent(recipient, purpose, expiry_secs, website, data_fields)
            .await
    }

    async fn revoke_consent(&self, token_id: TokenId) -> Result<TxHandle, ContractCallError> {
        (**self).revoke_consent(token_id).await
    }

    async fn activate_consent(&self, token_id: TokenId) -> Result<TxHandle, ContractCallError> {
        (**self).activate_consent(token_id).await
    }

    async fn abandon_consent(&self, token_id: TokenId) -> Result<TxHandle, ContractCallError> {
        (**self).abandon_consent(token_id).await
    }

    async fn wait_for_receipt(&self, tx: &TxHandle) -> Result<TxReceipt, ContractCallError> {
        (**self).wait_for_receipt(tx).await
    }

    async fn get_my_consents_with_ids(
        &self,
        account: &Address,
    ) -> Result<(Vec<u64>, Vec<RawConsentRecord>), ContractCallError> {
        (**self).get_my_consents_with_ids(account).await
    }

    async fn get_my_consents(
        &self,
        account: &Address,
    ) -> Result<Vec<RawConsentRecord>, ContractCallError> {
        (**self).get_my_consents(account).await
    }

    fn parse_log(&self, log: &LogEntry) -> Result<ContractEvent, AbiDecodeError> {
        (**self).parse_log(log)
    }
}

#[async_trait]
impl<T: LedgerObserver + ?Sized> LedgerObserver for Arc<T> {
    async fn ledger_view_refreshed(&self, account: &Address, tokens: Vec<ConsentToken>) {
        (**self).ledger_view_refreshed(account, tokens).await;
    }

    async fn mutation_confirmed(
        &self,
        account: &Address,
        token_id: TokenId,
        transition: Transition,
    ) {
        (**self)
            .mutation_confirmed(account, token_id, transition)
            .await;
    }
}
