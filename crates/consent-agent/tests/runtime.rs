//! End-to-end: issuance link, background router, page bridge, and ledger.

use assert_matches::assert_matches;
use async_trait::async_trait;
use consent_agent::{
    AgentBuilder, AgentError, ConfigError, ConsentAgentConfig, ConsentRuntime, ConsentScanner,
    IssuanceError,
};
use consent_core::effects::{
    BridgeCall, BridgeOutcome, ConsentContract, NotificationKind, PageEndpoint,
};
use consent_core::{
    AbiDecodeError, Address, CallErrorCode, ConsentStatus, ConsentToken, ContractCallError,
    ContractEvent, DetectedConsent, LogEntry, RawConsentRecord, TabId, TabInfo, TokenId, TxHandle,
    TxReceipt,
};
use consent_ledger::{FetchError, FetchOutcome};
use consent_testkit::contract::{ContractCall, MockConsentContract};
use consent_testkit::fixtures::{account, contract_address, T0_MS, TEST_CHAIN_ID};
use consent_testkit::notifications::RecordingNotifier;
use consent_testkit::time::ControllableClock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

const LINK: &str = "/issue?to=0x742d35Cc6634C0532925a3b8D4C9db96C4b5Da5e\
    &website=https%3A%2F%2Fshop.example%2Fcheckout&purpose=Order%20updates\
    &fields=email,name&expiryDate=2030-01-02";

fn config() -> ConsentAgentConfig {
    ConsentAgentConfig {
        contract_address: contract_address().to_string(),
        ..ConsentAgentConfig::default()
    }
}

fn shop_tab(id: u32) -> TabInfo {
    TabInfo {
        id: TabId(id),
        url: "https://shop.example/checkout".to_string(),
    }
}

async fn started(notifier: Arc<RecordingNotifier>) -> ConsentRuntime {
    AgentBuilder::new(config())
        .with_clock(Arc::new(ControllableClock::new(T0_MS)))
        .with_notifier(notifier)
        .start()
        .await
        .unwrap()
}

async fn connected(runtime: &ConsentRuntime) -> Arc<MockConsentContract> {
    let contract = Arc::new(MockConsentContract::new(contract_address(), account()));
    let outcome = runtime
        .connect(contract.clone(), account(), TEST_CHAIN_ID)
        .await
        .unwrap();
    assert!(outcome.is_refreshed());
    contract
}

/// Let the router drain its queue, then wait out the page calls it started.
async fn settled(runtime: &ConsentRuntime) {
    runtime.handle().consent_tokens().await.unwrap();
    runtime.router().settle_bridge_calls().await;
}

async fn token(runtime: &ConsentRuntime, token_id: TokenId) -> ConsentToken {
    runtime
        .handle()
        .consent_tokens()
        .await
        .unwrap()
        .into_iter()
        .find(|token| token.token_id == Some(token_id))
        .unwrap()
}

#[tokio::test]
async fn issuance_link_mints_and_reports_a_pending_token() {
    let notifier = Arc::new(RecordingNotifier::new());
    let runtime = started(notifier.clone()).await;
    connected(&runtime).await;

    let issued = runtime
        .issuance(Some(shop_tab(1)))
        .submit_url(LINK)
        .await
        .unwrap();

    assert_eq!(issued.token_id, Some(TokenId::new(1)));
    assert_eq!(issued.redirect, "/my-consents");
    let token = token(&runtime, TokenId::new(1)).await;
    assert_eq!(token.status, ConsentStatus::Pending);
    assert_eq!(token.website, "https://shop.example/checkout");
    assert_eq!(notifier.count(NotificationKind::Issued), 1);
    runtime.shutdown();
}

#[tokio::test]
async fn issuance_requires_a_wallet() {
    let runtime = started(Arc::new(RecordingNotifier::new())).await;

    let result = runtime.issuance(None).submit_url(LINK).await;

    assert_eq!(result, Err(IssuanceError::WalletNotConnected));
    assert_eq!(
        result.unwrap_err().to_string(),
        "Please connect your wallet first"
    );
}

#[tokio::test]
async fn activation_request_goes_through_the_page_to_the_ledger() {
    let runtime = started(Arc::new(RecordingNotifier::new())).await;
    let contract = connected(&runtime).await;
    let page = runtime.open_page(shop_tab(3));
    let token_id = runtime
        .issuance(Some(shop_tab(3)))
        .submit_url(LINK)
        .await
        .unwrap()
        .token_id
        .unwrap();

    page.request_activation(token_id).unwrap();
    settled(&runtime).await;

    assert_eq!(token(&runtime, token_id).await.status, ConsentStatus::Active);
    assert!(contract.calls().contains(&ContractCall::Activate(token_id)));
}

/// Wraps the mock contract and parks confirmations while `held` is set.
struct HeldConfirmations {
    inner: MockConsentContract,
    held: AtomicBool,
    release: Notify,
}

impl HeldConfirmations {
    fn new(inner: MockConsentContract) -> Self {
        Self {
            inner,
            held: AtomicBool::new(false),
            release: Notify::new(),
        }
    }

    fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.release.notify_one();
    }
}

#[async_trait]
impl ConsentContract for HeldConfirmations {
    fn address(&self) -> &Address {
        self.inner.address()
    }

    async fn code_at(&self) -> Result<Vec<u8>, ContractCallError> {
        self.inner.code_at().await
    }

    async fn mint_consent(
        &self,
        recipient: &Address,
        purpose: &str,
        expiry_secs: u64,
        website: &str,
        data_fields: &str,
    ) -> Result<TxHandle, ContractCallError> {
        self.inner
            .mint_consent(recipient, purpose, expiry_secs, website, data_fields)
            .await
    }

    async fn revoke_consent(&self, token_id: TokenId) -> Result<TxHandle, ContractCallError> {
        self.inner.revoke_consent(token_id).await
    }

    async fn activate_consent(&self, token_id: TokenId) -> Result<TxHandle, ContractCallError> {
        self.inner.activate_consent(token_id).await
    }

    async fn abandon_consent(&self, token_id: TokenId) -> Result<TxHandle, ContractCallError> {
        self.inner.abandon_consent(token_id).await
    }

    async fn wait_for_receipt(&self, tx: &TxHandle) -> Result<TxReceipt, ContractCallError> {
        if self.held.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        self.inner.wait_for_receipt(tx).await
    }

    async fn get_my_consents_with_ids(
        &self,
        account: &Address,
    ) -> Result<(Vec<u64>, Vec<RawConsentRecord>), ContractCallError> {
        self.inner.get_my_consents_with_ids(account).await
    }

    async fn get_my_consents(
        &self,
        account: &Address,
    ) -> Result<Vec<RawConsentRecord>, ContractCallError> {
        self.inner.get_my_consents(account).await
    }

    fn parse_log(&self, log: &LogEntry) -> Result<ContractEvent, AbiDecodeError> {
        self.inner.parse_log(log)
    }
}

#[tokio::test]
async fn router_keeps_answering_while_an_activation_awaits_confirmation() {
    let runtime = started(Arc::new(RecordingNotifier::new())).await;
    let contract = Arc::new(HeldConfirmations::new(MockConsentContract::new(
        contract_address(),
        account(),
    )));
    runtime
        .connect(contract.clone(), account(), TEST_CHAIN_ID)
        .await
        .unwrap();
    let page = runtime.open_page(shop_tab(3));
    let token_id = runtime
        .issuance(Some(shop_tab(3)))
        .submit_url(LINK)
        .await
        .unwrap()
        .token_id
        .unwrap();

    contract.hold();
    page.request_activation(token_id).unwrap();
    let tokens = tokio::time::timeout(Duration::from_secs(5), runtime.handle().consent_tokens())
        .await
        .expect("router blocked behind the page call")
        .unwrap();
    let pending = tokens
        .iter()
        .find(|token| token.token_id == Some(token_id))
        .unwrap();
    assert_eq!(pending.status, ConsentStatus::Pending);

    contract.release();
    runtime.router().settle_bridge_calls().await;
    assert_eq!(token(&runtime, token_id).await.status, ConsentStatus::Active);
}

#[tokio::test]
async fn abandon_firing_abandons_a_still_pending_token_once() {
    let runtime = started(Arc::new(RecordingNotifier::new())).await;
    let contract = connected(&runtime).await;
    runtime.open_page(shop_tab(1));
    runtime.open_page(shop_tab(2));
    let token_id = runtime
        .issuance(Some(shop_tab(1)))
        .submit_url(LINK)
        .await
        .unwrap()
        .token_id
        .unwrap();

    runtime.handle().timer_fired(format!("abandon_{token_id}")).unwrap();
    settled(&runtime).await;
    assert_eq!(
        token(&runtime, token_id).await.status,
        ConsentStatus::Abandoned
    );

    // The second tab saw the refreshed view and skipped the call.
    let abandons = contract
        .calls()
        .into_iter()
        .filter(|call| *call == ContractCall::Abandon(token_id))
        .count();
    assert_eq!(abandons, 1);

    let before = contract.mutation_count();
    runtime.handle().timer_fired(format!("abandon_{token_id}")).unwrap();
    settled(&runtime).await;
    assert_eq!(contract.mutation_count(), before);
}

#[tokio::test]
async fn confirmed_abandon_lands_locally_when_the_follow_up_read_fails() {
    let runtime = started(Arc::new(RecordingNotifier::new())).await;
    let contract = connected(&runtime).await;
    runtime.open_page(shop_tab(1));
    let token_id = runtime
        .issuance(Some(shop_tab(1)))
        .submit_url(LINK)
        .await
        .unwrap()
        .token_id
        .unwrap();

    contract.fail_reads(Some(ContractCallError::new(
        CallErrorCode::NetworkError,
        "connection refused",
    )));
    runtime.handle().timer_fired(format!("abandon_{token_id}")).unwrap();
    settled(&runtime).await;

    assert_eq!(contract.record(token_id).unwrap().status, Some(2));
    assert_matches!(
        runtime.ledger().contract_error(),
        Some(FetchError::Connectivity { .. })
    );
    assert_eq!(
        token(&runtime, token_id).await.status,
        ConsentStatus::Abandoned
    );
}

#[tokio::test]
async fn page_without_a_session_answers_not_registered() {
    let runtime = started(Arc::new(RecordingNotifier::new())).await;
    let page = runtime.open_page(shop_tab(4));

    assert!(!page.is_registered());
    assert_eq!(
        page.call(BridgeCall::AbandonById(TokenId::new(1))).await,
        BridgeOutcome::NotRegistered
    );

    connected(&runtime).await;
    assert!(page.is_registered());

    runtime.disconnect();
    assert!(!page.is_registered());
    assert_eq!(
        page.call(BridgeCall::ActivateById(TokenId::new(1))).await,
        BridgeOutcome::NotRegistered
    );
}

struct PromptOnPage;

#[async_trait]
impl ConsentScanner for PromptOnPage {
    async fn scan(&self) -> Option<DetectedConsent> {
        Some(DetectedConsent {
            site_name: "example.com".to_string(),
            data_types: vec!["email".to_string()],
            purpose: "newsletter".to_string(),
            recipient_address: None,
            privacy_policy_url: None,
        })
    }
}

#[tokio::test]
async fn detections_posted_by_the_page_are_recorded() {
    let notifier = Arc::new(RecordingNotifier::new());
    let runtime = started(notifier.clone()).await;
    let page = runtime.open_page(shop_tab(5));
    page.set_scanner(Arc::new(PromptOnPage));

    page.command(consent_core::effects::PageCommand::ScanForConsent)
        .await;
    runtime.handle().consent_tokens().await.unwrap();

    let detections = runtime.reconciler().detections().await.unwrap();
    assert!(!detections.is_empty());
    assert_eq!(detections[0].consent_data.site_name, "example.com");
    assert_eq!(detections[0].tab_id, Some(TabId(5)));
    assert!(notifier.count(NotificationKind::Detected) >= 1);
}

#[tokio::test]
async fn contract_at_another_address_is_refused() {
    let runtime = started(Arc::new(RecordingNotifier::new())).await;
    let elsewhere = consent_core::Address::parse("0x00000000000000000000000000000000000000aa")
        .unwrap();
    let contract = Arc::new(MockConsentContract::new(elsewhere, account()));

    let result = runtime.connect(contract, account(), TEST_CHAIN_ID).await;

    assert_matches!(result, Err(AgentError::Config(ConfigError::Invalid(_))));
    assert!(!runtime.ledger().is_connected());
}

#[tokio::test]
async fn undeployed_contract_surfaces_as_persistent_error() {
    let runtime = started(Arc::new(RecordingNotifier::new())).await;
    let contract = Arc::new(MockConsentContract::new(contract_address(), account()).undeployed());

    let outcome = runtime
        .connect(contract, account(), TEST_CHAIN_ID)
        .await
        .unwrap();

    assert_matches!(outcome, FetchOutcome::Failed(consent_ledger::FetchError::NotDeployed { .. }));
    assert!(runtime.ledger().contract_error().is_some());
}

#[tokio::test]
async fn missing_contract_address_fails_startup() {
    let result = AgentBuilder::new(ConsentAgentConfig::default()).start().await;
    let Err(AgentError::Config(ConfigError::Invalid(problems))) = result else {
        panic!("startup without a contract address should fail validation");
    };
    assert_eq!(problems, vec!["contract_address is not set".to_string()]);
}

#[tokio::test]
async fn unparsable_log_filter_fails_startup() {
    let loud = ConsentAgentConfig {
        log_filter: "consent_agent=loud".to_string(),
        ..config()
    };
    let Err(AgentError::Config(ConfigError::Invalid(problems))) =
        AgentBuilder::new(loud).start().await
    else {
        panic!("startup with a bad log filter should fail validation");
    };
    assert_eq!(problems.len(), 1);
    assert!(problems[0].starts_with("log_filter"));
}

#[tokio::test]
async fn tokens_survive_a_restart_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let token_id = {
        let runtime = AgentBuilder::new(config())
            .with_storage_dir(dir.path())
            .unwrap()
            .with_clock(Arc::new(ControllableClock::new(T0_MS)))
            .start()
            .await
            .unwrap();
        connected(&runtime).await;
        let token_id = runtime
            .issuance(None)
            .submit_url(LINK)
            .await
            .unwrap()
            .token_id
            .unwrap();
        runtime.handle().consent_tokens().await.unwrap();
        runtime.shutdown();
        token_id
    };

    let runtime = AgentBuilder::new(config())
        .with_storage_dir(dir.path())
        .unwrap()
        .start()
        .await
        .unwrap();
    let restored = token(&runtime, token_id).await;
    assert_eq!(restored.status, ConsentStatus::Pending);
    let settings = runtime.reconciler().settings().await.unwrap();
    assert!(settings.notifications);
}
