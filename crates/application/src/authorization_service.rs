use std::sync::Arc;

use async_trait::async_trait;
use pinegate_core::{AdminIdentity, AppError, AppResult};
use pinegate_domain::{Permission, UserId};

/// Repository port for admin permission lookups.
#[async_trait]
pub trait AdminPermissionRepository: Send + Sync {
    /// Lists permissions granted to an admin user.
    async fn list_permissions_for_user(&self, user_id: UserId) -> AppResult<Vec<Permission>>;
}

/// Application service for admin authorization checks.
#[derive(Clone)]
pub struct AuthorizationService {
    repository: Arc<dyn AdminPermissionRepository>,
}

impl AuthorizationService {
    /// Creates a new authorization service from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn AdminPermissionRepository>) -> Self {
        Self { repository }
    }

    /// Ensures the admin holds the permission.
    ///
    /// A missing grant is reported as `Unauthorized` so the admin API answers
    /// 401 for both unknown callers and callers without the permission.
    pub async fn require_permission(
        &self,
        actor: &AdminIdentity,
        permission: Permission,
    ) -> AppResult<()> {
        if self.has_permission(actor, permission).await? {
            return Ok(());
        }

        Err(AppError::Unauthorized(format!(
            "admin '{}' is missing permission '{}'",
            actor.user_id(),
            permission.as_str()
        )))
    }

    /// Returns whether the admin currently holds the permission.
    pub async fn has_permission(
        &self,
        actor: &AdminIdentity,
        permission: Permission,
    ) -> AppResult<bool> {
        let permissions = self
            .repository
            .list_permissions_for_user(UserId::from_uuid(actor.user_id()))
            .await?;

        Ok(permissions.iter().any(|value| value == &permission))
    }
}

#[cfg(test)]
mod tests;
