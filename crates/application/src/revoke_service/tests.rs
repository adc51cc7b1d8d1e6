use std::sync::Arc;

use pinegate_domain::{
    AccessStatus, AccessTier, ActivityKind, DurationType, Indicator, OperationType, PlatformUser,
};

use crate::access_outcome::OutcomeReason;
use crate::test_support::{
    FakeActivityRepository, FakeGateway, FakeLedger, FakeUserDirectory, GatewayCallKind,
    active_access, indicator, user,
};

use super::CancellationRevokeService;

struct Fixture {
    service: CancellationRevokeService,
    ledger: Arc<FakeLedger>,
    gateway: Arc<FakeGateway>,
    activities: Arc<FakeActivityRepository>,
    buyer: PlatformUser,
    premium: Vec<Indicator>,
    free: Indicator,
}

async fn fixture(gateway: FakeGateway, activities: FakeActivityRepository) -> Fixture {
    let buyer = user("trader@example.com", Some("trader_tv"));
    let premium = vec![
        indicator("Trend Pro", "PUB;trend", AccessTier::Premium),
        indicator("Momentum Pro", "PUB;momentum", AccessTier::Premium),
    ];
    let free = indicator("Volume Free", "PUB;volume", AccessTier::Free);

    let mut all = premium.clone();
    all.push(free.clone());
    let ledger = Arc::new(FakeLedger::with_indicators(all.clone()));
    for indicator in &all {
        ledger
            .seed(active_access(&buyer, indicator, DurationType::ThirtyDays))
            .await;
    }

    let gateway = Arc::new(gateway);
    let activities = Arc::new(activities);
    Fixture {
        service: CancellationRevokeService::new(
            Arc::new(FakeUserDirectory::with(vec![buyer.clone()])),
            ledger.clone(),
            gateway.clone(),
            activities.clone(),
        ),
        ledger,
        gateway,
        activities,
        buyer,
        premium,
        free,
    }
}

fn status_of(rows: &[crate::IndicatorAccess], indicator: &Indicator) -> Option<AccessStatus> {
    rows.iter()
        .find(|row| row.indicator_id == indicator.id())
        .map(|row| row.status)
}

#[tokio::test]
async fn cancellation_revokes_premium_and_keeps_free_access() {
    let fixture = fixture(FakeGateway::default(), FakeActivityRepository::default()).await;

    let outcome = fixture
        .service
        .revoke_on_cancellation("trader@example.com", "sub_123", "subscription_deleted")
        .await;

    let Ok(outcome) = outcome else {
        panic!("revoke should succeed");
    };
    assert!(outcome.success);
    assert_eq!(outcome.revoked_count, 2);
    assert_eq!(outcome.user_id, Some(fixture.buyer.id()));

    let calls = fixture.gateway.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].kind, GatewayCallKind::Revoke);
    assert_eq!(calls[0].pine_ids.len(), 2);

    let rows = fixture.ledger.rows().await;
    for indicator in &fixture.premium {
        assert_eq!(status_of(&rows, indicator), Some(AccessStatus::Revoked));
    }
    assert_eq!(status_of(&rows, &fixture.free), Some(AccessStatus::Active));
    assert!(
        rows.iter()
            .filter(|row| row.status == AccessStatus::Revoked)
            .all(|row| row.revoked_at.is_some()
                && row.duration_type == DurationType::ThirtyDays
                && row.revoked_by.is_none())
    );

    let logs = fixture.ledger.logs().await;
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|log| log.operation_type == OperationType::Revoke
        && log.metadata["subscription_id"] == "sub_123"
        && log.metadata["reason"] == "subscription_deleted"));

    let activities = fixture.activities.records().await;
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0].kind, ActivityKind::SubscriptionCancelled);
}

#[tokio::test]
async fn gateway_failure_marks_every_targeted_row_failed() {
    let fixture = fixture(
        FakeGateway::default().unreachable_for("trader_tv"),
        FakeActivityRepository::default(),
    )
    .await;

    let outcome = fixture
        .service
        .revoke_on_cancellation("trader@example.com", "sub_123", "subscription_deleted")
        .await;

    let Ok(outcome) = outcome else {
        panic!("gateway failure should be reported in the outcome");
    };
    assert!(!outcome.success);
    assert_eq!(outcome.failed_count, 2);
    assert!(matches!(
        outcome.reason,
        Some(OutcomeReason::GatewayFailure(_))
    ));

    let rows = fixture.ledger.rows().await;
    for indicator in &fixture.premium {
        assert_eq!(status_of(&rows, indicator), Some(AccessStatus::Failed));
    }
    assert_eq!(status_of(&rows, &fixture.free), Some(AccessStatus::Active));
    assert!(fixture.ledger.logs().await.is_empty());
}

#[tokio::test]
async fn rejected_indicator_is_marked_failed_and_others_revoked() {
    let fixture = fixture(
        FakeGateway::default().rejecting("trader_tv", "PUB;momentum"),
        FakeActivityRepository::default(),
    )
    .await;

    let outcome = fixture
        .service
        .revoke_on_cancellation("trader@example.com", "sub_123", "subscription_deleted")
        .await;

    let Ok(outcome) = outcome else {
        panic!("revoke should succeed");
    };
    assert_eq!(outcome.revoked_count, 1);
    assert_eq!(outcome.failed_count, 1);

    let rows = fixture.ledger.rows().await;
    assert_eq!(
        status_of(&rows, &fixture.premium[0]),
        Some(AccessStatus::Revoked)
    );
    assert_eq!(
        status_of(&rows, &fixture.premium[1]),
        Some(AccessStatus::Failed)
    );
    assert_eq!(fixture.ledger.logs().await.len(), 1);
}

#[tokio::test]
async fn activity_failure_does_not_fail_revoke() {
    let fixture = fixture(FakeGateway::default(), FakeActivityRepository::failing()).await;

    let outcome = fixture
        .service
        .revoke_on_cancellation("trader@example.com", "sub_123", "subscription_deleted")
        .await;

    assert_eq!(outcome.map(|outcome| outcome.revoked_count).ok(), Some(2));
}

#[tokio::test]
async fn second_cancellation_finds_nothing_to_revoke() {
    let fixture = fixture(FakeGateway::default(), FakeActivityRepository::default()).await;

    let first = fixture
        .service
        .revoke_on_cancellation("trader@example.com", "sub_123", "subscription_deleted")
        .await;
    assert!(first.is_ok());

    let second = fixture
        .service
        .revoke_on_cancellation("trader@example.com", "sub_123", "subscription_deleted")
        .await;

    let Ok(second) = second else {
        panic!("second revoke should succeed");
    };
    assert!(second.success);
    assert_eq!(second.revoked_count, 0);
    assert_eq!(fixture.gateway.calls().await.len(), 1);
}

#[tokio::test]
async fn unknown_customer_is_terminal() {
    let fixture = fixture(FakeGateway::default(), FakeActivityRepository::default()).await;

    let outcome = fixture
        .service
        .revoke_on_cancellation("nobody@example.com", "sub_123", "subscription_deleted")
        .await;

    assert_eq!(
        outcome.ok().and_then(|outcome| outcome.reason),
        Some(OutcomeReason::UserNotRegistered)
    );
    assert!(fixture.gateway.calls().await.is_empty());
}

#[tokio::test]
async fn revoke_targets_username_recorded_at_grant_time() {
    let buyer = user("trader@example.com", Some("new_tv"));
    let trend = indicator("Trend Pro", "PUB;trend", AccessTier::Premium);
    let momentum = indicator("Momentum Pro", "PUB;momentum", AccessTier::Premium);
    let ledger = Arc::new(FakeLedger::with_indicators(vec![
        trend.clone(),
        momentum.clone(),
    ]));
    let mut old_grant = active_access(&buyer, &trend, DurationType::ThirtyDays);
    old_grant.tradingview_username = "old_tv".to_owned();
    ledger.seed(old_grant).await;
    ledger
        .seed(active_access(&buyer, &momentum, DurationType::ThirtyDays))
        .await;
    let gateway = Arc::new(FakeGateway::default().unreachable_for("new_tv"));
    let service = CancellationRevokeService::new(
        Arc::new(FakeUserDirectory::with(vec![buyer])),
        ledger.clone(),
        gateway.clone(),
        Arc::new(FakeActivityRepository::default()),
    );

    let outcome = service
        .revoke_on_cancellation("trader@example.com", "sub_123", "subscription_deleted")
        .await;

    let Ok(outcome) = outcome else {
        panic!("revoke should return an outcome");
    };
    assert!(!outcome.success);
    assert_eq!(outcome.revoked_count, 1);
    assert_eq!(outcome.failed_count, 1);

    let calls = gateway.calls().await;
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].username, "new_tv");
    assert_eq!(calls[1].username, "old_tv");
    assert_eq!(calls[1].pine_ids, vec!["PUB;trend".to_owned()]);

    let rows = ledger.rows().await;
    assert_eq!(status_of(&rows, &trend), Some(AccessStatus::Revoked));
    assert_eq!(status_of(&rows, &momentum), Some(AccessStatus::Failed));
}
