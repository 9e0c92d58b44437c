//! Token lifecycle across the reconciler and the message router, driven by
//! a controllable clock and manually fired timers.

use assert_matches::assert_matches;
use consent_agent::{
    ConsentStore, MessageRouter, Reconciler, RouterResponse, TimerOutcome, TimerPolicy,
    TransitionOutcome, UrlFilter,
};
use consent_core::effects::{
    BridgeCall, BridgeOutcome, LedgerObserver, NotificationAction, NotificationKind, PageCommand,
    ScriptTarget,
};
use consent_core::{
    ConsentMessage, ConsentStatus, DetectedConsent, ExpiryDate, ExpiryReminderRequest,
    RawMessage, RevokedConsent, Settings, TabId, TabInfo, TokenId, TokenIdSource, Transition,
};
use consent_effects::MemoryStorageHandler;
use consent_testkit::bridge::RecordingPageChannel;
use consent_testkit::fixtures::{account, issued, ledger_token, other_account, HOUR_MS, T0_MS};
use consent_testkit::notifications::RecordingNotifier;
use consent_testkit::time::ControllableClock;
use consent_testkit::timers::ManualTimerHandler;
use std::sync::Arc;

const TEN_MINUTES_MS: u64 = 10 * 60 * 1000;

struct Harness {
    clock: ControllableClock,
    timers: Arc<ManualTimerHandler>,
    notifier: Arc<RecordingNotifier>,
    pages: Arc<RecordingPageChannel>,
    reconciler: Arc<Reconciler>,
    router: MessageRouter,
}

async fn harness() -> Harness {
    consent_testkit::init_test_tracing();
    let clock = ControllableClock::new(T0_MS);
    let timers = Arc::new(ManualTimerHandler::new(clock.clone()));
    let notifier = Arc::new(RecordingNotifier::new());
    let pages = Arc::new(RecordingPageChannel::with_tabs([1, 2]));
    let reconciler = Arc::new(Reconciler::new(
        ConsentStore::new(Arc::new(MemoryStorageHandler::new())),
        Arc::new(clock.clone()),
        timers.clone(),
        TimerPolicy::default(),
    ));
    reconciler.initialize().await.unwrap();
    let router = MessageRouter::new(
        reconciler.clone(),
        notifier.clone(),
        pages.clone(),
        Arc::new(clock.clone()),
        UrlFilter::new(vec!["chrome://".to_string()], "localhost:5173"),
        3_000,
    );
    Harness {
        clock,
        timers,
        notifier,
        pages,
        reconciler,
        router,
    }
}

fn tab(id: u32, url: &str) -> TabInfo {
    TabInfo {
        id: TabId(id),
        url: url.to_string(),
    }
}

fn detected(site: &str) -> DetectedConsent {
    DetectedConsent {
        site_name: site.to_string(),
        data_types: vec!["email".to_string()],
        purpose: "newsletter".to_string(),
        recipient_address: None,
        privacy_policy_url: None,
    }
}

impl Harness {
    async fn issue(&self, token_id: u64, expiry_ms: Option<u64>) {
        self.router
            .dispatch(ConsentMessage::ConsentIssued(issued(token_id, expiry_ms)), None)
            .await
            .unwrap();
    }

    async fn status(&self, token_id: u64) -> Option<ConsentStatus> {
        self.reconciler
            .status_of(TokenId::new(token_id))
            .await
            .unwrap()
    }

    async fn disable(&self, change: impl FnOnce(&mut Settings)) {
        let mut settings = self.reconciler.settings().await.unwrap();
        change(&mut settings);
        self.reconciler.update_settings(settings).await.unwrap();
    }
}

#[tokio::test]
async fn issuing_with_48h_expiry_arms_both_timers_then_abandons() {
    let h = harness().await;
    h.issue(5, Some(T0_MS + 48 * HOUR_MS)).await;

    assert_eq!(h.status(5).await, Some(ConsentStatus::Pending));
    assert_eq!(h.timers.scheduled_at("expiry_5"), Some(T0_MS + 24 * HOUR_MS));
    assert_eq!(h.timers.scheduled_at("abandon_5"), Some(T0_MS + TEN_MINUTES_MS));
    assert_eq!(h.notifier.count(NotificationKind::Issued), 1);

    h.clock.advance(TEN_MINUTES_MS);
    assert_eq!(h.timers.take_due(), vec!["abandon_5".to_string()]);
    assert_eq!(
        h.router.on_timer_fired("abandon_5").await.unwrap(),
        TimerOutcome::AbandonRequested
    );
    h.router.settle_bridge_calls().await;
    assert_eq!(
        h.pages.invocations(),
        vec![(ScriptTarget::AllTabs, BridgeCall::AbandonById(TokenId::new(5)))]
    );

    // The ledger client reports the page's confirmed abandon.
    h.reconciler
        .mutation_confirmed(&account(), TokenId::new(5), Transition::Abandon)
        .await;
    assert_eq!(h.status(5).await, Some(ConsentStatus::Abandoned));
    assert!(h.timers.cleared().contains(&"expiry_5".to_string()));
    assert_eq!(h.timers.scheduled_at("expiry_5"), None);

    h.clock.advance(24 * HOUR_MS);
    assert_eq!(
        h.router.on_timer_fired("expiry_5").await.unwrap(),
        TimerOutcome::Stale
    );
    assert_eq!(h.notifier.count(NotificationKind::ExpiryReminder), 0);
}

#[tokio::test]
async fn abandon_timer_on_settled_token_calls_no_page() {
    for settled in [
        ConsentStatus::Active,
        ConsentStatus::Revoked,
        ConsentStatus::Abandoned,
    ] {
        let h = harness().await;
        h.reconciler
            .reconcile(&account(), vec![ledger_token(3, settled)])
            .await
            .unwrap();

        assert_eq!(
            h.router.on_timer_fired("abandon_3").await.unwrap(),
            TimerOutcome::Stale
        );
        assert!(h.pages.invocations().is_empty());
        assert_eq!(h.status(3).await, Some(settled));
    }
}

#[tokio::test]
async fn expiry_reminder_fires_only_for_active_tokens() {
    let h = harness().await;
    h.reconciler
        .reconcile(
            &account(),
            vec![
                ledger_token(1, ConsentStatus::Active),
                ledger_token(2, ConsentStatus::Pending),
            ],
        )
        .await
        .unwrap();

    assert_eq!(
        h.router.on_timer_fired("expiry_2").await.unwrap(),
        TimerOutcome::Stale
    );
    assert!(h.notifier.is_empty());

    assert_eq!(
        h.router.on_timer_fired("expiry_1").await.unwrap(),
        TimerOutcome::Reminded
    );
    let reminder = h.notifier.notifications().remove(0);
    assert_eq!(reminder.kind, NotificationKind::ExpiryReminder);
    assert_eq!(reminder.title, "Consent Expiring Soon");
    assert_eq!(
        reminder.actions,
        vec![NotificationAction::Renew, NotificationAction::Revoke]
    );

    h.disable(|settings| settings.expiry_reminders = false).await;
    assert_eq!(
        h.router.on_timer_fired("expiry_1").await.unwrap(),
        TimerOutcome::Suppressed
    );
}

#[tokio::test]
async fn reminder_inside_the_lead_window_is_not_registered() {
    let h = harness().await;
    let message = ConsentMessage::ScheduleExpiryReminder(ExpiryReminderRequest {
        token_id: TokenId::new(9),
        expiry_date: ExpiryDate::from_millis(T0_MS + 23 * HOUR_MS),
    });

    h.router.dispatch(message, None).await.unwrap();
    assert!(h.timers.scheduled().is_empty());

    h.issue(10, Some(T0_MS + HOUR_MS)).await;
    assert_eq!(h.timers.scheduled_at("expiry_10"), None);
    assert!(h.timers.scheduled_at("abandon_10").is_some());
}

#[tokio::test]
async fn revoking_token_7_from_pending_or_active() {
    for prior in [ConsentStatus::Pending, ConsentStatus::Active] {
        let h = harness().await;
        h.reconciler
            .reconcile(&account(), vec![ledger_token(7, prior)])
            .await
            .unwrap();
        h.clock.advance(HOUR_MS);

        let message = ConsentMessage::ConsentRevoked(RevokedConsent {
            token_id: TokenId::new(7),
            site_name: "shop.example".to_string(),
        });
        h.router.dispatch(message, None).await.unwrap();

        let token = h.reconciler.token(TokenId::new(7)).await.unwrap().unwrap();
        assert_eq!(token.status, ConsentStatus::Revoked);
        assert!(token.is_revoked);
        assert_eq!(token.revoked_at, Some(T0_MS + HOUR_MS));
        assert_eq!(h.notifier.count(NotificationKind::Revoked), 1);
    }
}

#[tokio::test]
async fn duplicate_revocation_is_a_quiet_no_op() {
    let h = harness().await;
    h.reconciler
        .reconcile(&account(), vec![ledger_token(7, ConsentStatus::Revoked)])
        .await
        .unwrap();

    let outcome = h.reconciler.revoke(TokenId::new(7)).await.unwrap();
    assert_eq!(outcome, TransitionOutcome::Stale(ConsentStatus::Revoked));
    assert_eq!(
        h.reconciler.activate(TokenId::new(42)).await.unwrap(),
        TransitionOutcome::Unknown
    );

    let message = ConsentMessage::ConsentRevoked(RevokedConsent {
        token_id: TokenId::new(7),
        site_name: String::new(),
    });
    h.router.dispatch(message, None).await.unwrap();
    assert!(h.notifier.is_empty());
}

#[tokio::test]
async fn reissuing_a_settled_token_keeps_its_status() {
    let h = harness().await;
    h.reconciler
        .reconcile(&account(), vec![ledger_token(4, ConsentStatus::Active)])
        .await
        .unwrap();

    h.issue(4, None).await;

    assert_eq!(h.status(4).await, Some(ConsentStatus::Active));
    assert_eq!(h.timers.scheduled_at("abandon_4"), None);
}

#[tokio::test]
async fn ledger_read_replaces_the_accounts_cached_view() {
    let h = harness().await;
    h.issue(1, None).await;
    h.issue(2, None).await;
    h.reconciler
        .reconcile(&other_account(), {
            let mut foreign = ledger_token(50, ConsentStatus::Active);
            foreign.owner = Some(other_account());
            vec![foreign]
        })
        .await
        .unwrap();

    // Token 1 is confirmed active; token 2 is absent from the ledger read and
    // stays speculative until a read returns it.
    let mut stale = ledger_token(1, ConsentStatus::Active);
    stale.purpose = "first read".to_string();
    h.reconciler
        .reconcile(&account(), vec![stale, ledger_token(3, ConsentStatus::Pending)])
        .await
        .unwrap();
    h.reconciler
        .reconcile(&account(), vec![ledger_token(1, ConsentStatus::Active)])
        .await
        .unwrap();

    let tokens = h.reconciler.tokens().await.unwrap();
    let ids: Vec<_> = tokens.iter().filter_map(|t| t.token_id).map(TokenId::value).collect();
    assert_eq!(ids, vec![2, 50, 1]);

    let confirmed = &tokens[2];
    assert_eq!(confirmed.purpose, "analytics");
    assert_eq!(confirmed.id_source, TokenIdSource::Ledger);
    assert_eq!(confirmed.owner, Some(account()));
    assert!(h.timers.cleared().contains(&"abandon_1".to_string()));
    assert!(h.timers.scheduled_at("abandon_2").is_some());
}

#[tokio::test]
async fn legacy_read_replaces_an_issued_record_of_the_same_account() {
    let h = harness().await;
    h.reconciler.reconcile(&account(), Vec::new()).await.unwrap();
    h.issue(42, None).await;
    assert_eq!(
        h.reconciler.token(TokenId::new(42)).await.unwrap().unwrap().owner,
        Some(account())
    );

    let mut positional = ledger_token(1, ConsentStatus::Active);
    positional.id_source = TokenIdSource::Synthesized;
    h.reconciler
        .reconcile(&account(), vec![positional])
        .await
        .unwrap();

    let tokens = h.reconciler.tokens().await.unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].token_id, Some(TokenId::new(1)));
    assert_eq!(tokens[0].id_source, TokenIdSource::Synthesized);
    assert_eq!(h.status(42).await, None);
}

#[tokio::test]
async fn positional_ids_do_not_evict_unowned_records() {
    let h = harness().await;
    h.issue(1, None).await;

    let mut positional = ledger_token(1, ConsentStatus::Active);
    positional.id_source = TokenIdSource::Synthesized;
    h.reconciler
        .reconcile(&account(), vec![positional])
        .await
        .unwrap();

    let sources: Vec<_> = h
        .reconciler
        .tokens()
        .await
        .unwrap()
        .into_iter()
        .map(|token| (token.token_id, token.id_source, token.status))
        .collect();
    assert_eq!(
        sources,
        vec![
            (Some(TokenId::new(1)), TokenIdSource::Issued, ConsentStatus::Pending),
            (Some(TokenId::new(1)), TokenIdSource::Synthesized, ConsentStatus::Active),
        ]
    );
}

#[tokio::test]
async fn detection_notifies_only_when_enabled_but_always_records() {
    let h = harness().await;
    let sender = tab(1, "https://example.com/signup");

    h.router
        .dispatch(
            ConsentMessage::ConsentDetected(detected("example.com")),
            Some(sender.clone()),
        )
        .await
        .unwrap();
    assert_eq!(h.notifier.count(NotificationKind::Detected), 1);
    assert_eq!(
        h.notifier.notifications()[0].message,
        "Privacy consent detected on example.com"
    );

    h.disable(|settings| settings.notifications = false).await;
    h.router
        .dispatch(ConsentMessage::ConsentDetected(detected("example.com")), Some(sender))
        .await
        .unwrap();
    assert_eq!(h.notifier.count(NotificationKind::Detected), 1);

    let detections = h.reconciler.detections().await.unwrap();
    assert_eq!(detections.len(), 2);
    assert_ne!(detections[0].id, detections[1].id);
    assert_eq!(detections[1].tab_id, Some(TabId(1)));
    assert!(h.reconciler.tokens().await.unwrap().is_empty());
}

#[tokio::test]
async fn get_consent_tokens_returns_the_cached_collection() {
    let h = harness().await;
    h.issue(1, None).await;

    let response = h
        .router
        .dispatch_raw(
            RawMessage {
                action: "getConsentTokens".to_string(),
                data: None,
                token_id: None,
            },
            None,
        )
        .await
        .unwrap();
    assert_matches!(response, RouterResponse::Tokens(tokens) => {
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].token_id, Some(TokenId::new(1)));
    });
}

#[tokio::test]
async fn unknown_actions_and_foreign_timers_are_ignored() {
    let h = harness().await;
    let response = h
        .router
        .dispatch_raw(
            RawMessage {
                action: "refreshBadge".to_string(),
                data: None,
                token_id: None,
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(response, RouterResponse::None);
    assert_eq!(
        h.router.on_timer_fired("badge_refresh").await.unwrap(),
        TimerOutcome::Ignored
    );
    assert!(h.notifier.is_empty());
}

#[tokio::test]
async fn activation_request_targets_the_sender_tab() {
    let h = harness().await;
    h.pages.answer_with(BridgeOutcome::Completed);

    h.router
        .dispatch(
            ConsentMessage::ActivateConsent {
                token_id: TokenId::new(8),
            },
            Some(tab(2, "https://shop.example/")),
        )
        .await
        .unwrap();
    h.router
        .dispatch(
            ConsentMessage::ActivateConsent {
                token_id: TokenId::new(8),
            },
            None,
        )
        .await
        .unwrap();
    h.router.settle_bridge_calls().await;

    assert_eq!(
        h.pages.invocations(),
        vec![(
            ScriptTarget::Tab(TabId(2)),
            BridgeCall::ActivateById(TokenId::new(8))
        )]
    );
}

#[tokio::test]
async fn navigation_scans_only_eligible_pages() {
    let h = harness().await;

    assert!(h
        .router
        .on_navigation_complete(tab(1, "https://shop.example/"))
        .await
        .unwrap());
    assert!(!h
        .router
        .on_navigation_complete(tab(1, "chrome://extensions"))
        .await
        .unwrap());
    assert!(!h
        .router
        .on_navigation_complete(tab(2, "http://localhost:5173/my-consents"))
        .await
        .unwrap());
    assert_eq!(h.clock.now(), T0_MS + 3_000);

    h.disable(|settings| settings.auto_detection = false).await;
    assert!(!h
        .router
        .on_navigation_complete(tab(1, "https://shop.example/"))
        .await
        .unwrap());

    assert_eq!(h.pages.commands(), vec![(TabId(1), PageCommand::ScanForConsent)]);
}
