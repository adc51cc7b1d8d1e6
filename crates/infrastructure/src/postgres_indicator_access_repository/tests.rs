use chrono::{Duration, Utc};
use pinegate_application::{
    IndicatorAccessRepository, MarkRevokedInput, NewAccessLogEntry, UpsertIndicatorAccessInput,
};
use pinegate_core::AppError;
use pinegate_domain::{
    AccessSource, AccessStatus, AccessTier, DurationType, IndicatorId, OperationType, UserId,
};
use serde_json::json;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::PostgresIndicatorAccessRepository;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for indicator access repository tests: {error}");
    }

    Some(pool)
}

async fn ensure_user(pool: &PgPool) -> UserId {
    let user_id = UserId::new();
    let insert = sqlx::query(
        r#"
            INSERT INTO users (id, email, tradingview_username)
            VALUES ($1, $2, 'trader_tv')
            "#,
    )
    .bind(user_id.as_uuid())
    .bind(format!("{}@example.com", user_id.as_uuid()))
    .execute(pool)
    .await;

    assert!(insert.is_ok());
    user_id
}

async fn ensure_indicator(pool: &PgPool, tier: AccessTier) -> IndicatorId {
    let indicator_id = IndicatorId::new();
    let insert = sqlx::query(
        r#"
            INSERT INTO indicators (id, name, pine_id, access_tier)
            VALUES ($1, 'Trend Pro', $2, $3)
            "#,
    )
    .bind(indicator_id.as_uuid())
    .bind(format!("PUB;{}", indicator_id.as_uuid().simple()))
    .bind(tier.as_str())
    .execute(pool)
    .await;

    assert!(insert.is_ok());
    indicator_id
}

fn grant_input(user_id: UserId, indicator_id: IndicatorId) -> UpsertIndicatorAccessInput {
    let granted_at = Utc::now();
    UpsertIndicatorAccessInput {
        user_id,
        indicator_id,
        tradingview_username: "trader_tv".to_owned(),
        granted_at,
        expires_at: DurationType::ThirtyDays.expires_at_from(granted_at),
        duration_type: DurationType::ThirtyDays,
        access_source: AccessSource::Purchase,
        granted_by: None,
        tradingview_response: Some(json!({ "status": "Success" })),
        notes: None,
    }
}

#[tokio::test]
async fn upsert_reports_renewal_and_keeps_row_identity() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresIndicatorAccessRepository::new(pool.clone());
    let user_id = ensure_user(&pool).await;
    let indicator_id = ensure_indicator(&pool, AccessTier::Premium).await;

    let Ok(first) = repository
        .upsert_access(grant_input(user_id, indicator_id))
        .await
    else {
        panic!("first upsert should succeed");
    };
    assert!(!first.previously_existed);
    assert_eq!(first.access.status, AccessStatus::Active);

    let mut renewal = grant_input(user_id, indicator_id);
    renewal.duration_type = DurationType::OneYear;
    renewal.expires_at = Some(Utc::now() + Duration::days(365));
    let Ok(second) = repository.upsert_access(renewal).await else {
        panic!("second upsert should succeed");
    };

    assert!(second.previously_existed);
    assert_eq!(second.access.id, first.access.id);
    assert_eq!(second.access.duration_type, DurationType::OneYear);
}

#[tokio::test]
async fn upsert_reactivates_revoked_row() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresIndicatorAccessRepository::new(pool.clone());
    let user_id = ensure_user(&pool).await;
    let indicator_id = ensure_indicator(&pool, AccessTier::Premium).await;

    let Ok(granted) = repository
        .upsert_access(grant_input(user_id, indicator_id))
        .await
    else {
        panic!("upsert should succeed");
    };
    let revoked = repository
        .mark_revoked(MarkRevokedInput {
            access_id: granted.access.id,
            revoked_at: Utc::now(),
            revoked_by: None,
        })
        .await;
    assert!(revoked.is_ok());

    let Ok(Some(stored)) = repository.find_access(user_id, indicator_id).await else {
        panic!("revoked row should be readable");
    };
    assert_eq!(stored.status, AccessStatus::Revoked);
    assert!(stored.revoked_at.is_some());

    let Ok(regranted) = repository
        .upsert_access(grant_input(user_id, indicator_id))
        .await
    else {
        panic!("regrant should succeed");
    };
    assert!(regranted.previously_existed);
    assert_eq!(regranted.access.status, AccessStatus::Active);
    assert_eq!(regranted.access.revoked_at, None);
    assert_eq!(regranted.access.revoked_by, None);
}

#[tokio::test]
async fn active_listing_filters_by_tier() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresIndicatorAccessRepository::new(pool.clone());
    let user_id = ensure_user(&pool).await;
    let premium = ensure_indicator(&pool, AccessTier::Premium).await;
    let free = ensure_indicator(&pool, AccessTier::Free).await;

    let batch = repository
        .upsert_access_batch(vec![
            grant_input(user_id, premium),
            grant_input(user_id, free),
        ])
        .await;
    assert_eq!(batch.as_ref().map(Vec::len).ok(), Some(2));

    let all = repository.list_active_access_for_user(user_id, None).await;
    assert_eq!(all.as_ref().map(Vec::len).ok(), Some(2));

    let Ok(premium_only) = repository
        .list_active_access_for_user(user_id, Some(AccessTier::Premium))
        .await
    else {
        panic!("premium listing should succeed");
    };
    assert_eq!(premium_only.len(), 1);
    assert_eq!(premium_only[0].indicator.id(), premium);
    assert_eq!(premium_only[0].indicator.access_tier(), AccessTier::Premium);
}

#[tokio::test]
async fn failed_rows_are_listed_for_reconciliation() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresIndicatorAccessRepository::new(pool.clone());
    let user_id = ensure_user(&pool).await;
    let indicator_id = ensure_indicator(&pool, AccessTier::Premium).await;

    let Ok(granted) = repository
        .upsert_access(grant_input(user_id, indicator_id))
        .await
    else {
        panic!("upsert should succeed");
    };
    assert!(repository.mark_failed(&[granted.access.id]).await.is_ok());

    let Ok(failed) = repository.list_failed_access(1_000).await else {
        panic!("failed listing should succeed");
    };
    assert!(
        failed
            .iter()
            .any(|row| row.access.id == granted.access.id
                && row.access.status == AccessStatus::Failed)
    );

    let active = repository.list_active_access_for_user(user_id, None).await;
    assert_eq!(active.as_ref().map(Vec::len).ok(), Some(0));
}

#[tokio::test]
async fn re_marked_failed_rows_move_behind_older_failures() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresIndicatorAccessRepository::new(pool.clone());
    let user_id = ensure_user(&pool).await;
    let first_indicator = ensure_indicator(&pool, AccessTier::Premium).await;
    let second_indicator = ensure_indicator(&pool, AccessTier::Premium).await;

    let Ok(first) = repository
        .upsert_access(grant_input(user_id, first_indicator))
        .await
    else {
        panic!("first upsert should succeed");
    };
    let Ok(second) = repository
        .upsert_access(grant_input(user_id, second_indicator))
        .await
    else {
        panic!("second upsert should succeed");
    };
    assert!(repository.mark_failed(&[first.access.id]).await.is_ok());
    assert!(repository.mark_failed(&[second.access.id]).await.is_ok());
    assert!(repository.mark_failed(&[first.access.id]).await.is_ok());

    let Ok(failed) = repository.list_failed_access(1_000).await else {
        panic!("failed listing should succeed");
    };
    let position = |access_id: Uuid| failed.iter().position(|row| row.access.id == access_id);
    let (Some(first_position), Some(second_position)) =
        (position(first.access.id), position(second.access.id))
    else {
        panic!("both failed rows should be listed");
    };
    assert!(second_position < first_position);
}

#[tokio::test]
async fn mark_revoked_unknown_row_is_not_found() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresIndicatorAccessRepository::new(pool);
    let result = repository
        .mark_revoked(MarkRevokedInput {
            access_id: Uuid::new_v4(),
            revoked_at: Utc::now(),
            revoked_by: None,
        })
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn log_entries_are_appended() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresIndicatorAccessRepository::new(pool.clone());
    let user_id = ensure_user(&pool).await;
    let indicator_id = ensure_indicator(&pool, AccessTier::Premium).await;
    let Ok(granted) = repository
        .upsert_access(grant_input(user_id, indicator_id))
        .await
    else {
        panic!("upsert should succeed");
    };

    for operation_type in [OperationType::Grant, OperationType::Renew] {
        let appended = repository
            .append_log(NewAccessLogEntry {
                user_id,
                indicator_id,
                operation_type,
                access_source: AccessSource::Purchase,
                granted_at: Some(granted.access.granted_at),
                expires_at: granted.access.expires_at,
                revoked_at: None,
                duration_type: Some(DurationType::ThirtyDays),
                tradingview_response: None,
                performed_by: None,
                indicator_access_id: Some(granted.access.id),
                notes: None,
                metadata: json!({ "purchase_id": "cs_test_1" }),
            })
            .await;
        assert!(appended.is_ok());
    }

    let count = sqlx::query_scalar::<_, i64>(
        r#"
            SELECT COUNT(*)
            FROM indicator_access_log
            WHERE indicator_access_id = $1
            "#,
    )
    .bind(granted.access.id)
    .fetch_one(&pool)
    .await;

    assert_eq!(count.ok(), Some(2));
}
