use std::str::FromStr;

use async_trait::async_trait;
use pinegate_application::AdminPermissionRepository;
use pinegate_core::{AppError, AppResult};
use pinegate_domain::{Permission, UserId};
use sqlx::PgPool;
use tracing::warn;

/// PostgreSQL-backed admin permission lookups.
#[derive(Clone)]
pub struct PostgresAdminPermissionRepository {
    pool: PgPool,
}

impl PostgresAdminPermissionRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdminPermissionRepository for PostgresAdminPermissionRepository {
    async fn list_permissions_for_user(&self, user_id: UserId) -> AppResult<Vec<Permission>> {
        let values = sqlx::query_scalar::<_, String>(
            r#"
            SELECT permission
            FROM admin_permissions
            WHERE user_id = $1
            ORDER BY permission
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list admin permissions for user '{user_id}': {error}"
            ))
        })?;

        Ok(values
            .into_iter()
            .filter_map(|value| match Permission::from_str(&value) {
                Ok(permission) => Some(permission),
                Err(error) => {
                    warn!(user_id = %user_id, error = %error, "ignoring unknown admin permission");
                    None
                }
            })
            .collect())
    }
}
