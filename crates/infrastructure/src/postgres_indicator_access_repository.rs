use async_trait::async_trait;
use pinegate_application::{
    AccessWithIndicator, IndicatorAccess, IndicatorAccessRepository, MarkRevokedInput,
    NewAccessLogEntry, UpsertIndicatorAccessInput, UpsertedAccess,
};
use pinegate_core::{AppError, AppResult};
use pinegate_domain::{AccessTier, IndicatorId, UserId};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

mod rows;

use rows::{AccessWithIndicatorRow, IndicatorAccessRow, UpsertedAccessRow};

/// PostgreSQL-backed access ledger and access log.
#[derive(Clone)]
pub struct PostgresIndicatorAccessRepository {
    pool: PgPool,
}

impl PostgresIndicatorAccessRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Upserts on the `(user_id, indicator_id)` unique key. The `existing` CTE
/// reads the pre-statement snapshot, so it reports whether the pair had a row.
async fn upsert_on(
    connection: &mut PgConnection,
    input: UpsertIndicatorAccessInput,
) -> AppResult<UpsertedAccess> {
    let indicator_id = input.indicator_id;
    let row = sqlx::query_as::<_, UpsertedAccessRow>(
        r#"
        WITH existing AS (
            SELECT 1
            FROM indicator_access
            WHERE user_id = $2 AND indicator_id = $3
        ),
        upserted AS (
            INSERT INTO indicator_access (
                id,
                user_id,
                indicator_id,
                tradingview_username,
                status,
                granted_at,
                expires_at,
                revoked_at,
                duration_type,
                access_source,
                granted_by,
                revoked_by,
                tradingview_response,
                notes
            )
            VALUES ($1, $2, $3, $4, 'active', $5, $6, NULL, $7, $8, $9, NULL, $10, $11)
            ON CONFLICT (user_id, indicator_id) DO UPDATE SET
                tradingview_username = EXCLUDED.tradingview_username,
                status = 'active',
                granted_at = EXCLUDED.granted_at,
                expires_at = EXCLUDED.expires_at,
                revoked_at = NULL,
                revoked_by = NULL,
                duration_type = EXCLUDED.duration_type,
                access_source = EXCLUDED.access_source,
                granted_by = EXCLUDED.granted_by,
                tradingview_response = EXCLUDED.tradingview_response,
                notes = EXCLUDED.notes,
                updated_at = now()
            RETURNING
                id,
                user_id,
                indicator_id,
                tradingview_username,
                status,
                granted_at,
                expires_at,
                revoked_at,
                duration_type,
                access_source,
                granted_by,
                revoked_by,
                tradingview_response,
                notes
        )
        SELECT upserted.*, EXISTS (SELECT 1 FROM existing) AS previously_existed
        FROM upserted
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(input.user_id.as_uuid())
    .bind(input.indicator_id.as_uuid())
    .bind(input.tradingview_username)
    .bind(input.granted_at)
    .bind(input.expires_at)
    .bind(input.duration_type.as_str())
    .bind(input.access_source.as_str())
    .bind(input.granted_by.map(|value| value.as_uuid()))
    .bind(input.tradingview_response)
    .bind(input.notes)
    .fetch_one(connection)
    .await
    .map_err(|error| {
        AppError::Internal(format!(
            "failed to upsert indicator access for indicator '{indicator_id}': {error}"
        ))
    })?;

    row.into_upserted()
}

#[async_trait]
impl IndicatorAccessRepository for PostgresIndicatorAccessRepository {
    async fn find_access(
        &self,
        user_id: UserId,
        indicator_id: IndicatorId,
    ) -> AppResult<Option<IndicatorAccess>> {
        let row = sqlx::query_as::<_, IndicatorAccessRow>(
            r#"
            SELECT
                id,
                user_id,
                indicator_id,
                tradingview_username,
                status,
                granted_at,
                expires_at,
                revoked_at,
                duration_type,
                access_source,
                granted_by,
                revoked_by,
                tradingview_response,
                notes
            FROM indicator_access
            WHERE user_id = $1 AND indicator_id = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(indicator_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find indicator access: {error}"))
        })?;

        row.map(IndicatorAccessRow::into_access).transpose()
    }

    async fn list_active_access_for_user(
        &self,
        user_id: UserId,
        tier: Option<AccessTier>,
    ) -> AppResult<Vec<AccessWithIndicator>> {
        let rows = sqlx::query_as::<_, AccessWithIndicatorRow>(
            r#"
            SELECT
                access.id,
                access.user_id,
                access.indicator_id,
                access.tradingview_username,
                access.status,
                access.granted_at,
                access.expires_at,
                access.revoked_at,
                access.duration_type,
                access.access_source,
                access.granted_by,
                access.revoked_by,
                access.tradingview_response,
                access.notes,
                indicator.name AS indicator_name,
                indicator.pine_id AS indicator_pine_id,
                indicator.access_tier AS indicator_access_tier
            FROM indicator_access access
            JOIN indicators indicator ON indicator.id = access.indicator_id
            WHERE access.user_id = $1
                AND access.status = 'active'
                AND ($2::TEXT IS NULL OR indicator.access_tier = $2)
            ORDER BY access.granted_at, access.id
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(tier.map(|value| value.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list active indicator access for user '{user_id}': {error}"
            ))
        })?;

        rows.into_iter()
            .map(AccessWithIndicatorRow::into_joined)
            .collect()
    }

    async fn list_failed_access(&self, limit: usize) -> AppResult<Vec<AccessWithIndicator>> {
        let capped_limit = i64::try_from(limit.clamp(1, 1_000)).unwrap_or(1_000);
        let rows = sqlx::query_as::<_, AccessWithIndicatorRow>(
            r#"
            SELECT
                access.id,
                access.user_id,
                access.indicator_id,
                access.tradingview_username,
                access.status,
                access.granted_at,
                access.expires_at,
                access.revoked_at,
                access.duration_type,
                access.access_source,
                access.granted_by,
                access.revoked_by,
                access.tradingview_response,
                access.notes,
                indicator.name AS indicator_name,
                indicator.pine_id AS indicator_pine_id,
                indicator.access_tier AS indicator_access_tier
            FROM indicator_access access
            JOIN indicators indicator ON indicator.id = access.indicator_id
            WHERE access.status = 'failed'
            ORDER BY access.updated_at, access.id
            LIMIT $1
            "#,
        )
        .bind(capped_limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list failed indicator access: {error}"))
        })?;

        rows.into_iter()
            .map(AccessWithIndicatorRow::into_joined)
            .collect()
    }

    async fn upsert_access(&self, input: UpsertIndicatorAccessInput) -> AppResult<UpsertedAccess> {
        let mut connection = self.pool.acquire().await.map_err(|error| {
            AppError::Internal(format!("failed to acquire database connection: {error}"))
        })?;

        upsert_on(&mut connection, input).await
    }

    async fn upsert_access_batch(
        &self,
        inputs: Vec<UpsertIndicatorAccessInput>,
    ) -> AppResult<Vec<UpsertedAccess>> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start access batch transaction: {error}"))
        })?;

        let mut upserted = Vec::with_capacity(inputs.len());
        for input in inputs {
            upserted.push(upsert_on(&mut transaction, input).await?);
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit access batch transaction: {error}"))
        })?;

        Ok(upserted)
    }

    async fn mark_revoked(&self, input: MarkRevokedInput) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE indicator_access
            SET status = 'revoked',
                revoked_at = $2,
                revoked_by = $3,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(input.access_id)
        .bind(input.revoked_at)
        .bind(input.revoked_by.map(|value| value.as_uuid()))
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to mark indicator access '{}' revoked: {error}",
                input.access_id
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "indicator access '{}' does not exist",
                input.access_id
            )));
        }

        Ok(())
    }

    async fn mark_failed(&self, access_ids: &[Uuid]) -> AppResult<()> {
        if access_ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            UPDATE indicator_access
            SET status = 'failed',
                updated_at = now()
            WHERE id = ANY($1)
            "#,
        )
        .bind(access_ids)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to mark indicator access failed: {error}"))
        })?;

        Ok(())
    }

    async fn append_log(&self, entry: NewAccessLogEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO indicator_access_log (
                id,
                user_id,
                indicator_id,
                operation_type,
                access_source,
                granted_at,
                expires_at,
                revoked_at,
                duration_type,
                tradingview_response,
                performed_by,
                indicator_access_id,
                notes,
                metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.user_id.as_uuid())
        .bind(entry.indicator_id.as_uuid())
        .bind(entry.operation_type.as_str())
        .bind(entry.access_source.as_str())
        .bind(entry.granted_at)
        .bind(entry.expires_at)
        .bind(entry.revoked_at)
        .bind(entry.duration_type.map(|value| value.as_str()))
        .bind(entry.tradingview_response)
        .bind(entry.performed_by.map(|value| value.as_uuid()))
        .bind(entry.indicator_access_id)
        .bind(entry.notes)
        .bind(entry.metadata)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to append indicator access log: {error}"))
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests;
