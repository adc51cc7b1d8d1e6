use async_trait::async_trait;
use pinegate_application::UserDirectory;
use pinegate_core::{AppError, AppResult};
use pinegate_domain::{EmailAddress, PlatformUser, UserId};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// PostgreSQL-backed read model over platform users.
#[derive(Clone)]
pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    tradingview_username: Option<String>,
}

impl UserRow {
    fn into_user(self) -> AppResult<PlatformUser> {
        Ok(PlatformUser::new(
            UserId::from_uuid(self.id),
            EmailAddress::new(self.email)?,
            self.tradingview_username,
        ))
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn find_user_by_email(&self, email: &EmailAddress) -> AppResult<Option<PlatformUser>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, tradingview_username
            FROM users
            WHERE lower(email) = $1
            "#,
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find user by email: {error}"))
        })?;

        row.map(UserRow::into_user).transpose()
    }

    async fn find_users_by_ids(&self, user_ids: &[UserId]) -> AppResult<Vec<PlatformUser>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = user_ids.iter().map(UserId::as_uuid).collect();
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, tradingview_username
            FROM users
            WHERE id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load users by id: {error}"))
        })?;

        rows.into_iter().map(UserRow::into_user).collect()
    }
}
