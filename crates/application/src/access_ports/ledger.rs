use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pinegate_core::AppResult;
use pinegate_domain::{
    AccessSource, AccessStatus, AccessTier, DurationType, Indicator, IndicatorId, OperationType,
    UserId,
};
use serde_json::Value;
use uuid::Uuid;

/// Current-state ledger row for one user and indicator pair.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorAccess {
    /// Stable row identifier.
    pub id: Uuid,
    /// Entitled user.
    pub user_id: UserId,
    /// Entitled indicator.
    pub indicator_id: IndicatorId,
    /// Username snapshot taken at grant time.
    pub tradingview_username: String,
    /// Current status.
    pub status: AccessStatus,
    /// Last grant timestamp.
    pub granted_at: DateTime<Utc>,
    /// Expiration, `None` for lifetime access.
    pub expires_at: Option<DateTime<Utc>>,
    /// Revocation timestamp when revoked.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Granted duration.
    pub duration_type: DurationType,
    /// Source of the latest grant.
    pub access_source: AccessSource,
    /// Admin that granted, `None` for automated grants.
    pub granted_by: Option<UserId>,
    /// Admin that revoked, `None` for automated revocations.
    pub revoked_by: Option<UserId>,
    /// Last remote response snapshot.
    pub tradingview_response: Option<Value>,
    /// Free text annotation.
    pub notes: Option<String>,
}

/// Ledger row joined with its catalog indicator.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessWithIndicator {
    /// Ledger row.
    pub access: IndicatorAccess,
    /// Joined indicator.
    pub indicator: Indicator,
}

/// Grant payload written with upsert-on-pair semantics.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertIndicatorAccessInput {
    /// Entitled user.
    pub user_id: UserId,
    /// Entitled indicator.
    pub indicator_id: IndicatorId,
    /// Username snapshot.
    pub tradingview_username: String,
    /// Grant timestamp.
    pub granted_at: DateTime<Utc>,
    /// Expiration, `None` for lifetime access.
    pub expires_at: Option<DateTime<Utc>>,
    /// Granted duration.
    pub duration_type: DurationType,
    /// Grant source.
    pub access_source: AccessSource,
    /// Acting admin, `None` for automated grants.
    pub granted_by: Option<UserId>,
    /// Remote response snapshot.
    pub tradingview_response: Option<Value>,
    /// Free text annotation.
    pub notes: Option<String>,
}

/// Row returned by an upsert, with whether the pair already had a row.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertedAccess {
    /// Ledger row after the write.
    pub access: IndicatorAccess,
    /// `true` when the write updated an existing row.
    pub previously_existed: bool,
}

/// Revocation payload for one ledger row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkRevokedInput {
    /// Ledger row identifier.
    pub access_id: Uuid,
    /// Revocation timestamp.
    pub revoked_at: DateTime<Utc>,
    /// Acting admin, `None` for automated revocations.
    pub revoked_by: Option<UserId>,
}

/// Append-only log row describing one ledger operation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccessLogEntry {
    /// Affected user.
    pub user_id: UserId,
    /// Affected indicator.
    pub indicator_id: IndicatorId,
    /// Operation kind.
    pub operation_type: OperationType,
    /// Source of the operation.
    pub access_source: AccessSource,
    /// Grant timestamp for grant and renew operations.
    pub granted_at: Option<DateTime<Utc>>,
    /// Expiration written by the operation.
    pub expires_at: Option<DateTime<Utc>>,
    /// Revocation timestamp for revoke operations.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Duration involved.
    pub duration_type: Option<DurationType>,
    /// Remote response snapshot.
    pub tradingview_response: Option<Value>,
    /// Acting admin, `None` for automated operations.
    pub performed_by: Option<UserId>,
    /// Ledger row affected by the operation.
    pub indicator_access_id: Option<Uuid>,
    /// Free text annotation.
    pub notes: Option<String>,
    /// Structured context such as subscription id and reason.
    pub metadata: Value,
}

/// Repository port for the access ledger and its audit log.
#[async_trait]
pub trait IndicatorAccessRepository: Send + Sync {
    /// Returns the ledger row for a pair regardless of status.
    async fn find_access(
        &self,
        user_id: UserId,
        indicator_id: IndicatorId,
    ) -> AppResult<Option<IndicatorAccess>>;

    /// Lists active rows for a user joined with their indicator, optionally by tier.
    async fn list_active_access_for_user(
        &self,
        user_id: UserId,
        tier: Option<AccessTier>,
    ) -> AppResult<Vec<AccessWithIndicator>>;

    /// Lists rows in `failed` status, least recently attempted first.
    async fn list_failed_access(&self, limit: usize) -> AppResult<Vec<AccessWithIndicator>>;

    /// Inserts or updates the row for the pair and marks it active.
    async fn upsert_access(&self, input: UpsertIndicatorAccessInput) -> AppResult<UpsertedAccess>;

    /// Upserts several rows atomically. Either every row is written or none.
    async fn upsert_access_batch(
        &self,
        inputs: Vec<UpsertIndicatorAccessInput>,
    ) -> AppResult<Vec<UpsertedAccess>>;

    /// Marks one row revoked, leaving every other column untouched.
    async fn mark_revoked(&self, input: MarkRevokedInput) -> AppResult<()>;

    /// Marks rows as failed and stamps the attempt time, so reconciliation can retry them.
    async fn mark_failed(&self, access_ids: &[Uuid]) -> AppResult<()>;

    /// Appends one log row.
    async fn append_log(&self, entry: NewAccessLogEntry) -> AppResult<()>;
}
