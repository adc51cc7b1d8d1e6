use async_trait::async_trait;
use pinegate_application::IndicatorCatalog;
use pinegate_core::{AppError, AppResult};
use pinegate_domain::{AccessTier, Indicator, IndicatorId};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// PostgreSQL-backed read model over the live indicator catalog.
#[derive(Clone)]
pub struct PostgresIndicatorCatalog {
    pool: PgPool,
}

impl PostgresIndicatorCatalog {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct IndicatorRow {
    id: Uuid,
    name: String,
    pine_id: String,
    access_tier: String,
}

impl IndicatorRow {
    fn into_indicator(self) -> AppResult<Indicator> {
        Indicator::new(
            IndicatorId::from_uuid(self.id),
            self.name,
            self.pine_id,
            self.access_tier.parse::<AccessTier>()?,
        )
    }
}

#[async_trait]
impl IndicatorCatalog for PostgresIndicatorCatalog {
    async fn list_active_indicators(&self, tier: Option<AccessTier>) -> AppResult<Vec<Indicator>> {
        let rows = sqlx::query_as::<_, IndicatorRow>(
            r#"
            SELECT id, name, pine_id, access_tier
            FROM indicators
            WHERE is_active = TRUE
                AND ($1::TEXT IS NULL OR access_tier = $1)
            ORDER BY name, id
            "#,
        )
        .bind(tier.map(|value| value.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list active indicators: {error}"))
        })?;

        rows.into_iter().map(IndicatorRow::into_indicator).collect()
    }

    async fn find_active_indicators(
        &self,
        indicator_ids: &[IndicatorId],
    ) -> AppResult<Vec<Indicator>> {
        if indicator_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = indicator_ids.iter().map(IndicatorId::as_uuid).collect();
        let rows = sqlx::query_as::<_, IndicatorRow>(
            r#"
            SELECT id, name, pine_id, access_tier
            FROM indicators
            WHERE is_active = TRUE AND id = ANY($1)
            ORDER BY name, id
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load indicators by id: {error}"))
        })?;

        rows.into_iter().map(IndicatorRow::into_indicator).collect()
    }
}
