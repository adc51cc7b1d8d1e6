use async_trait::async_trait;
use pinegate_core::AppResult;
use pinegate_domain::{AccessTier, EmailAddress, Indicator, IndicatorId, PlatformUser, UserId};

/// Read-only port over platform users.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Finds a user by normalized email.
    async fn find_user_by_email(&self, email: &EmailAddress) -> AppResult<Option<PlatformUser>>;

    /// Loads users by id. Unknown ids are omitted from the result.
    async fn find_users_by_ids(&self, user_ids: &[UserId]) -> AppResult<Vec<PlatformUser>>;
}

/// Read-only port over the live indicator catalog.
#[async_trait]
pub trait IndicatorCatalog: Send + Sync {
    /// Lists active indicators, optionally restricted to one tier.
    async fn list_active_indicators(&self, tier: Option<AccessTier>) -> AppResult<Vec<Indicator>>;

    /// Loads active indicators by id. Unknown or inactive ids are omitted.
    async fn find_active_indicators(
        &self,
        indicator_ids: &[IndicatorId],
    ) -> AppResult<Vec<Indicator>>;
}
