//! In-memory consent contract
//!
//! Behaves like the deployed contract closely enough for client tests: mints
//! start `Pending` (status code 0), transitions update the stored record, and
//! receipts carry a `ConsentMinted` log next to an unrelated log that does
//! not decode. Legacy mode drops the id-returning read and the status code.

use async_trait::async_trait;
use consent_core::effects::ConsentContract;
use consent_core::{
    AbiDecodeError, Address, CallErrorCode, ContractCallError, ContractEvent, LogEntry,
    RawConsentRecord, TokenId, TxHandle, TxReceipt,
};
use parking_lot::Mutex;
use std::collections::HashMap;

const MINTED_TOPIC: [u8; 32] = topic(0xc1);
const REVOKED_TOPIC: [u8; 32] = topic(0xc2);
const STATUS_TOPIC: [u8; 32] = topic(0xc3);

const fn topic(tag: u8) -> [u8; 32] {
    let mut topic = [0u8; 32];
    topic[0] = tag;
    topic
}

fn word(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

fn read_word(word: &[u8; 32]) -> u64 {
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&word[24..]);
    u64::from_be_bytes(tail)
}

/// Every call the contract received, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    CodeAt,
    Mint { recipient: Address, expiry_secs: u64 },
    Revoke(TokenId),
    Activate(TokenId),
    Abandon(TokenId),
    WaitForReceipt(String),
    ReadWithIds(Address),
    ReadLegacy(Address),
}

impl ContractCall {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Mint { .. } | Self::Revoke(_) | Self::Activate(_) | Self::Abandon(_)
        )
    }
}

struct StoredRecord {
    id: u64,
    owner: Address,
    record: RawConsentRecord,
}

struct MockState {
    code: Vec<u8>,
    legacy: bool,
    sender: Address,
    now_secs: u64,
    next_id: u64,
    tx_counter: u64,
    records: Vec<StoredRecord>,
    receipts: HashMap<String, TxReceipt>,
    code_failure: Option<ContractCallError>,
    read_failure: Option<ContractCallError>,
    submit_failure: Option<ContractCallError>,
    confirm_failure: Option<ContractCallError>,
    calls: Vec<ContractCall>,
}

pub struct MockConsentContract {
    address: Address,
    state: Mutex<MockState>,
}

impl MockConsentContract {
    /// Deployed contract whose transactions are sent from `sender`.
    pub fn new(address: Address, sender: Address) -> Self {
        Self {
            address,
            state: Mutex::new(MockState {
                code: vec![0x60, 0x80, 0x60, 0x40],
                legacy: false,
                sender,
                now_secs: 1_700_000_000,
                next_id: 1,
                tx_counter: 0,
                records: Vec::new(),
                receipts: HashMap::new(),
                code_failure: None,
                read_failure: None,
                submit_failure: None,
                confirm_failure: None,
                calls: Vec::new(),
            }),
        }
    }

    /// No bytecode at the address.
    pub fn undeployed(self) -> Self {
        self.state.lock().code.clear();
        self
    }

    /// Contract predating `getMyConsentsWithIds` and the status field.
    pub fn legacy(self) -> Self {
        self.state.lock().legacy = true;
        self
    }

    pub fn set_now_secs(&self, now_secs: u64) {
        self.state.lock().now_secs = now_secs;
    }

    pub fn fail_code_check(&self, error: ContractCallError) {
        self.state.lock().code_failure = Some(error);
    }

    /// Fail both enumeration calls until cleared.
    pub fn fail_reads(&self, error: Option<ContractCallError>) {
        self.state.lock().read_failure = error;
    }

    pub fn fail_submissions(&self, error: Option<ContractCallError>) {
        self.state.lock().submit_failure = error;
    }

    pub fn fail_confirmations(&self, error: Option<ContractCallError>) {
        self.state.lock().confirm_failure = error;
    }

    /// Store a record directly, as if minted earlier. Returns its id.
    pub fn insert_record(&self, owner: Address, mut record: RawConsentRecord) -> TokenId {
        let mut state = self.state.lock();
        if state.legacy {
            record.status = None;
        }
        let id = state.next_id;
        state.next_id += 1;
        state.records.push(StoredRecord { id, owner, record });
        TokenId::new(id)
    }

    pub fn record(&self, token_id: TokenId) -> Option<RawConsentRecord> {
        self.state
            .lock()
            .records
            .iter()
            .find(|stored| stored.id == token_id.value())
            .map(|stored| stored.record.clone())
    }

    pub fn calls(&self) -> Vec<ContractCall> {
        self.state.lock().calls.clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.state.lock().calls.iter().filter(|c| c.is_mutation()).count()
    }

    /// Log emitted by some other contract in the same transaction.
    pub fn foreign_log() -> LogEntry {
        LogEntry {
            address: Address::parse("0x00000000000000000000000000000000000000ff")
                .expect("static address"),
            topics: vec![topic(0xee)],
            data: vec![1, 2, 3],
        }
    }

    fn transact(
        &self,
        call: ContractCall,
        apply: impl FnOnce(&mut MockState) -> Result<Vec<LogEntry>, ContractCallError>,
    ) -> Result<TxHandle, ContractCallError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if let Some(error) = state.submit_failure.clone() {
            return Err(error);
        }
        let mut logs = vec![Self::foreign_log()];
        logs.extend(apply(&mut state)?);
        state.tx_counter += 1;
        let hash = format!("0x{:064x}", state.tx_counter);
        state.receipts.insert(
            hash.clone(),
            TxReceipt {
                tx_hash: hash.clone(),
                logs,
            },
        );
        Ok(TxHandle { hash })
    }

    fn log(&self, topic: [u8; 32], token_id: u64, data: Vec<u8>) -> LogEntry {
        LogEntry {
            address: self.address.clone(),
            topics: vec![topic, word(token_id)],
            data,
        }
    }

    fn update(
        &self,
        call: ContractCall,
        token_id: TokenId,
        change: impl FnOnce(&mut RawConsentRecord) -> Result<(), &'static str>,
        event: LogEntry,
    ) -> Result<TxHandle, ContractCallError> {
        self.transact(call, |state| {
            let stored = state
                .records
                .iter_mut()
                .find(|stored| stored.id == token_id.value())
                .ok_or_else(|| {
                    ContractCallError::new(
                        CallErrorCode::CallException,
                        "execution reverted: token does not exist",
                    )
                })?;
            change(&mut stored.record).map_err(|reason| {
                ContractCallError::new(
                    CallErrorCode::CallException,
                    format!("execution reverted: {reason}"),
                )
            })?;
            Ok(vec![event])
        })
    }

    fn owned_by(state: &MockState, account: &Address) -> Vec<(u64, RawConsentRecord)> {
        state
            .records
            .iter()
            .filter(|stored| &stored.owner == account)
            .map(|stored| (stored.id, stored.record.clone()))
            .collect()
    }
}

#[async_trait]
impl ConsentContract for MockConsentContract {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn code_at(&self) -> Result<Vec<u8>, ContractCallError> {
        let mut state = self.state.lock();
        state.calls.push(ContractCall::CodeAt);
        match state.code_failure.clone() {
            Some(error) => Err(error),
            None => Ok(state.code.clone()),
        }
    }

    async fn mint_consent(
        &self,
        recipient: &Address,
        purpose: &str,
        expiry_secs: u64,
        website: &str,
        data_fields: &str,
    ) -> Result<TxHandle, ContractCallError> {
        let call = ContractCall::Mint {
            recipient: recipient.clone(),
            expiry_secs,
        };
        let record = RawConsentRecord {
            recipient: recipient.as_str().to_uppercase().replacen("0X", "0x", 1),
            purpose: purpose.to_string(),
            expiry_date: expiry_secs,
            is_revoked: false,
            website: Some(website.to_string()),
            data_fields: Some(data_fields.to_string()),
            status: Some(0),
            issued_at: 0,
        };
        self.transact(call, |state| {
            let id = state.next_id;
            state.next_id += 1;
            let mut record = record;
            record.issued_at = state.now_secs;
            if state.legacy {
                record.status = None;
            }
            let minted_recipient = Address::parse(&record.recipient)
                .map(|a| word_of_address(&a))
                .unwrap_or_default();
            state.records.push(StoredRecord {
                id,
                owner: state.sender.clone(),
                record,
            });
            Ok(vec![LogEntry {
                address: self.address.clone(),
                topics: vec![MINTED_TOPIC, word(id)],
                data: minted_recipient,
            }])
        })
    }

    async fn revoke_consent(&self, token_id: TokenId) -> Result<TxHandle, ContractCallError> {
        let event = self.log(REVOKED_TOPIC, token_id.value(), Vec::new());
        self.update(
            ContractCall::Revoke(token_id),
            token_id,
            |record| {
                if record.is_revoked {
                    return Err("already revoked");
                }
                record.is_revoked = true;
                Ok(())
            },
            event,
        )
    }

    async fn activate_consent(&self, token_id: TokenId) -> Result<TxHandle, ContractCallError> {
        let event = self.log(STATUS_TOPIC, token_id.value(), vec![1]);
        self.update(
            ContractCall::Activate(token_id),
            token_id,
            |record| match record.status {
                Some(0) if !record.is_revoked => {
                    record.status = Some(1);
                    Ok(())
                }
                _ => Err("not pending"),
            },
            event,
        )
    }

    async fn abandon_consent(&self, token_id: TokenId) -> Result<TxHandle, ContractCallError> {
        let event = self.log(STATUS_TOPIC, token_id.value(), vec![2]);
        self.update(
            ContractCall::Abandon(token_id),
            token_id,
            |record| match record.status {
                Some(0) if !record.is_revoked => {
                    record.status = Some(2);
                    Ok(())
                }
                _ => Err("not pending"),
            },
            event,
        )
    }

    async fn wait_for_receipt(&self, tx: &TxHandle) -> Result<TxReceipt, ContractCallError> {
        let mut state = self.state.lock();
        state.calls.push(ContractCall::WaitForReceipt(tx.hash.clone()));
        if let Some(error) = state.confirm_failure.clone() {
            return Err(error);
        }
        state.receipts.remove(&tx.hash).ok_or_else(|| {
            ContractCallError::new(CallErrorCode::UnknownError, "transaction not found")
        })
    }

    async fn get_my_consents_with_ids(
        &self,
        account: &Address,
    ) -> Result<(Vec<u64>, Vec<RawConsentRecord>), ContractCallError> {
        let mut state = self.state.lock();
        state.calls.push(ContractCall::ReadWithIds(account.clone()));
        if state.legacy {
            return Err(ContractCallError::new(
                CallErrorCode::CallException,
                "missing revert data (no matching function getMyConsentsWithIds)",
            ));
        }
        if let Some(error) = state.read_failure.clone() {
            return Err(error);
        }
        Ok(Self::owned_by(&state, account).into_iter().unzip())
    }

    async fn get_my_consents(
        &self,
        account: &Address,
    ) -> Result<Vec<RawConsentRecord>, ContractCallError> {
        let mut state = self.state.lock();
        state.calls.push(ContractCall::ReadLegacy(account.clone()));
        if let Some(error) = state.read_failure.clone() {
            return Err(error);
        }
        Ok(Self::owned_by(&state, account)
            .into_iter()
            .map(|(_, record)| record)
            .collect())
    }

    fn parse_log(&self, log: &LogEntry) -> Result<ContractEvent, AbiDecodeError> {
        if log.address != self.address {
            return Err(AbiDecodeError(format!("log from {}", log.address)));
        }
        let (Some(signature), Some(id_word)) = (log.topics.first(), log.topics.get(1)) else {
            return Err(AbiDecodeError("missing topics".to_string()));
        };
        let token_id = TokenId::new(read_word(id_word));
        match *signature {
            MINTED_TOPIC => Ok(ContractEvent::ConsentMinted {
                token_id,
                recipient: address_of_word(&log.data),
            }),
            REVOKED_TOPIC => Ok(ContractEvent::ConsentRevoked { token_id }),
            STATUS_TOPIC => Ok(ContractEvent::ConsentStatusChanged {
                token_id,
                status: log.data.first().copied().unwrap_or_default(),
            }),
            _ => Err(AbiDecodeError("unknown event signature".to_string())),
        }
    }
}

fn word_of_address(address: &Address) -> Vec<u8> {
    address.as_str().as_bytes().to_vec()
}

fn address_of_word(data: &[u8]) -> Option<Address> {
    std::str::from_utf8(data).ok().and_then(|s| Address::parse(s).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{account, contract_address, recipient};

    #[tokio::test]
    async fn mint_receipt_carries_a_decodable_minted_event() {
        let contract = MockConsentContract::new(contract_address(), account());
        let tx = contract
            .mint_consent(&recipient(), "newsletter", 1_800_000_000, "shop.example", "email")
            .await
            .unwrap();
        let receipt = contract.wait_for_receipt(&tx).await.unwrap();

        let events: Vec<_> = receipt
            .logs
            .iter()
            .filter_map(|log| contract.parse_log(log).ok())
            .collect();
        assert_eq!(
            events,
            vec![ContractEvent::ConsentMinted {
                token_id: TokenId::new(1),
                recipient: Some(recipient()),
            }]
        );
        assert!(contract.parse_log(&MockConsentContract::foreign_log()).is_err());
    }
}
