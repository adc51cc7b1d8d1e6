use async_trait::async_trait;
use pinegate_application::{ActivityRecord, ActivityRepository};
use pinegate_core::{AppError, AppResult};
use sqlx::PgPool;
use uuid::Uuid;

/// PostgreSQL-backed customer activity feed.
#[derive(Clone)]
pub struct PostgresActivityRepository {
    pool: PgPool,
}

impl PostgresActivityRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityRepository for PostgresActivityRepository {
    async fn record_activity(&self, record: ActivityRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_activities (id, user_id, activity_type, description, metadata)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.user_id.as_uuid())
        .bind(record.kind.as_str())
        .bind(record.description)
        .bind(record.metadata)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to record user activity: {error}"))
        })?;

        Ok(())
    }
}
