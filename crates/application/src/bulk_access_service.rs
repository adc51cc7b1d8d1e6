use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pinegate_core::{AdminIdentity, AppError, AppResult};
use pinegate_domain::{
    AccessSource, AccessStatus, DurationType, Indicator, IndicatorId, OperationType, Permission,
    PlatformUser, UserId,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::{
    AuthorizationService, EntitlementGateway, GatewayIndicatorResult, IndicatorAccess,
    IndicatorAccessRepository, IndicatorCatalog, MarkRevokedInput, NewAccessLogEntry,
    UpsertIndicatorAccessInput, UpsertedAccess, UserDirectory,
};

/// Operation applied to every user and indicator pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkOperationType {
    /// Grant or extend access.
    Grant,
    /// Remove access.
    Revoke,
}

impl BulkOperationType {
    /// Returns a stable wire value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grant => "grant",
            Self::Revoke => "revoke",
        }
    }
}

impl FromStr for BulkOperationType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "grant" => Ok(Self::Grant),
            "revoke" => Ok(Self::Revoke),
            _ => Err(AppError::Validation(format!(
                "unknown bulk operation '{value}', expected grant or revoke"
            ))),
        }
    }
}

/// Admin bulk request over the cartesian product of users and indicators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkAccessRequest {
    /// Target users.
    pub user_ids: Vec<UserId>,
    /// Target indicators.
    pub indicator_ids: Vec<IndicatorId>,
    /// Grant duration, required for grants.
    pub duration: Option<DurationType>,
    /// Operation to apply.
    pub operation: BulkOperationType,
}

/// Outcome for one user and indicator pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkPairResult {
    /// Target user.
    pub user_id: UserId,
    /// Target indicator.
    pub indicator_id: IndicatorId,
    /// Whether the pair ended in the requested state.
    pub success: bool,
    /// Failure description or informational note.
    pub message: Option<String>,
    /// Expiration written for successful grants.
    pub expires_at: Option<DateTime<Utc>>,
}

impl BulkPairResult {
    fn succeeded(user_id: UserId, indicator_id: IndicatorId) -> Self {
        Self {
            user_id,
            indicator_id,
            success: true,
            message: None,
            expires_at: None,
        }
    }

    fn failed(user_id: UserId, indicator_id: IndicatorId, message: impl Into<String>) -> Self {
        Self {
            user_id,
            indicator_id,
            success: false,
            message: Some(message.into()),
            expires_at: None,
        }
    }
}

/// Aggregate counters plus per-pair results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkAccessSummary {
    /// Pairs attempted.
    pub total: usize,
    /// Pairs that succeeded.
    pub successful: usize,
    /// Pairs that failed.
    pub failed: usize,
    /// Users with a TradingView username.
    pub users_processed: usize,
    /// Requested users that are unknown or have no TradingView username.
    pub users_skipped: usize,
    /// Active indicators targeted.
    pub indicators_processed: usize,
    /// Per-pair results in user then indicator order.
    pub results: Vec<BulkPairResult>,
}

struct EligibleUser {
    user: PlatformUser,
    username: String,
}

struct PendingGrant {
    index: usize,
    input: UpsertIndicatorAccessInput,
}

/// Bulk operation engine for admin grants and revokes.
#[derive(Clone)]
pub struct BulkAccessService {
    authorization_service: AuthorizationService,
    users: Arc<dyn UserDirectory>,
    catalog: Arc<dyn IndicatorCatalog>,
    ledger: Arc<dyn IndicatorAccessRepository>,
    gateway: Arc<dyn EntitlementGateway>,
}

impl BulkAccessService {
    /// Creates a bulk operation engine.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        users: Arc<dyn UserDirectory>,
        catalog: Arc<dyn IndicatorCatalog>,
        ledger: Arc<dyn IndicatorAccessRepository>,
        gateway: Arc<dyn EntitlementGateway>,
    ) -> Self {
        Self {
            authorization_service,
            users,
            catalog,
            ledger,
            gateway,
        }
    }

    /// Applies the operation to every pair. Pairs fail independently.
    pub async fn execute(
        &self,
        actor: &AdminIdentity,
        request: BulkAccessRequest,
    ) -> AppResult<BulkAccessSummary> {
        self.authorization_service
            .require_permission(actor, Permission::IndicatorAccessBulkManage)
            .await?;

        if request.user_ids.is_empty() {
            return Err(AppError::Validation(
                "user_ids must contain at least one user".to_owned(),
            ));
        }
        if request.indicator_ids.is_empty() {
            return Err(AppError::Validation(
                "indicator_ids must contain at least one indicator".to_owned(),
            ));
        }
        let grant_duration = match (request.operation, request.duration) {
            (BulkOperationType::Grant, Some(duration)) => Some(duration),
            (BulkOperationType::Grant, None) => {
                return Err(AppError::Validation(
                    "duration is required for bulk grants".to_owned(),
                ));
            }
            (BulkOperationType::Revoke, _) => None,
        };

        let requested_users: BTreeSet<UserId> = request.user_ids.iter().copied().collect();
        let requested_indicators: BTreeSet<IndicatorId> =
            request.indicator_ids.iter().copied().collect();
        let requested_users: Vec<UserId> = requested_users.into_iter().collect();
        let requested_indicators: Vec<IndicatorId> = requested_indicators.into_iter().collect();

        let mut users = self.users.find_users_by_ids(&requested_users).await?;
        users.sort_by_key(PlatformUser::id);
        let eligible: Vec<EligibleUser> = users
            .into_iter()
            .filter_map(|user| {
                let username = user.tradingview_username()?.to_owned();
                Some(EligibleUser { user, username })
            })
            .collect();
        let users_skipped = requested_users.len().saturating_sub(eligible.len());
        if eligible.is_empty() {
            return Err(AppError::Validation(
                "no valid users with a TradingView username".to_owned(),
            ));
        }

        let mut indicators = self
            .catalog
            .find_active_indicators(&requested_indicators)
            .await?;
        indicators.sort_by_key(Indicator::id);
        if indicators.is_empty() {
            return Err(AppError::Validation(
                "no active indicators match the request".to_owned(),
            ));
        }

        let performed_by = UserId::from_uuid(actor.user_id());
        let results = match grant_duration {
            Some(duration) => {
                self.grant_all(&eligible, &indicators, duration, performed_by)
                    .await
            }
            None => self.revoke_all(&eligible, &indicators, performed_by).await,
        };

        let successful = results.iter().filter(|result| result.success).count();
        let summary = BulkAccessSummary {
            total: results.len(),
            successful,
            failed: results.len() - successful,
            users_processed: eligible.len(),
            users_skipped,
            indicators_processed: indicators.len(),
            results,
        };

        info!(
            admin_id = %performed_by,
            operation = request.operation.as_str(),
            total = summary.total,
            successful = summary.successful,
            failed = summary.failed,
            users_skipped = summary.users_skipped,
            "bulk access operation finished"
        );

        Ok(summary)
    }

    async fn grant_all(
        &self,
        users: &[EligibleUser],
        indicators: &[Indicator],
        duration: DurationType,
        performed_by: UserId,
    ) -> Vec<BulkPairResult> {
        let mut results = Vec::with_capacity(users.len() * indicators.len());
        let mut pending = Vec::new();

        for eligible in users {
            for indicator in indicators {
                let user_id = eligible.user.id();
                match self
                    .grant_pair(eligible, indicator, duration, performed_by)
                    .await
                {
                    Ok(input) => {
                        pending.push(PendingGrant {
                            index: results.len(),
                            input,
                        });
                        results.push(BulkPairResult::succeeded(user_id, indicator.id()));
                    }
                    Err(error) => {
                        results.push(BulkPairResult::failed(
                            user_id,
                            indicator.id(),
                            error.to_string(),
                        ));
                    }
                }
            }
        }

        self.persist_grants(pending, &mut results, performed_by)
            .await;
        results
    }

    /// Runs the remote part of one grant and returns the ledger write to apply.
    async fn grant_pair(
        &self,
        eligible: &EligibleUser,
        indicator: &Indicator,
        duration: DurationType,
        performed_by: UserId,
    ) -> AppResult<UpsertIndicatorAccessInput> {
        let user_id = eligible.user.id();
        let pine_ids = vec![indicator.pine_id().to_owned()];

        let existing = self
            .ledger
            .find_access(user_id, indicator.id())
            .await?
            .filter(|access| access.status == AccessStatus::Active);
        if let Some(existing) = existing {
            match self
                .gateway
                .revoke_access(&existing.tradingview_username, &pine_ids)
                .await
            {
                Ok(results) if pair_succeeded(&results, indicator).is_none() => {
                    warn!(
                        user_id = %user_id,
                        pine_id = indicator.pine_id(),
                        "remote platform rejected revoke before regrant"
                    );
                }
                Ok(_) => {}
                Err(error) => {
                    warn!(
                        user_id = %user_id,
                        pine_id = indicator.pine_id(),
                        error = %error,
                        "revoke before regrant failed, granting anyway"
                    );
                }
            }
        }

        let results = self
            .gateway
            .grant_access(&eligible.username, &pine_ids, duration)
            .await?;
        let Some(result) = pair_succeeded(&results, indicator) else {
            return Err(AppError::Upstream(
                "remote platform rejected the grant".to_owned(),
            ));
        };

        let now = Utc::now();
        Ok(UpsertIndicatorAccessInput {
            user_id,
            indicator_id: indicator.id(),
            tradingview_username: eligible.username.clone(),
            granted_at: now,
            expires_at: result.expires_at.or_else(|| duration.expires_at_from(now)),
            duration_type: duration,
            access_source: AccessSource::Bulk,
            granted_by: Some(performed_by),
            tradingview_response: Some(result.raw.clone()),
            notes: None,
        })
    }

    /// Writes every successful grant in one batch, falling back to one write
    /// per record so a bad record cannot fail its siblings.
    async fn persist_grants(
        &self,
        pending: Vec<PendingGrant>,
        results: &mut [BulkPairResult],
        performed_by: UserId,
    ) {
        if pending.is_empty() {
            return;
        }

        let inputs: Vec<UpsertIndicatorAccessInput> =
            pending.iter().map(|grant| grant.input.clone()).collect();
        let written: Vec<(usize, AppResult<UpsertedAccess>)> =
            match self.ledger.upsert_access_batch(inputs).await {
                Ok(rows) => pending
                    .iter()
                    .map(|grant| grant.index)
                    .zip(rows.into_iter().map(Ok))
                    .collect(),
                Err(error) => {
                    warn!(
                        error = %error,
                        records = pending.len(),
                        "batch ledger write failed, retrying records individually"
                    );
                    let mut written = Vec::with_capacity(pending.len());
                    for grant in pending {
                        let row = self.ledger.upsert_access(grant.input).await;
                        written.push((grant.index, row));
                    }
                    written
                }
            };

        for (index, row) in written {
            let Some(result) = results.get_mut(index) else {
                continue;
            };

            match row {
                Ok(upserted) => {
                    result.expires_at = upserted.access.expires_at;
                    self.append_grant_log(&upserted, performed_by).await;
                }
                Err(error) => {
                    result.success = false;
                    result.message = Some(format!(
                        "access granted remotely but ledger write failed: {error}"
                    ));
                }
            }
        }
    }

    async fn append_grant_log(
        &self,
        upserted: &UpsertedAccess,
        performed_by: UserId,
    ) {
        let access = &upserted.access;
        let operation_type = if upserted.previously_existed {
            OperationType::Renew
        } else {
            OperationType::Grant
        };

        if let Err(error) = self
            .ledger
            .append_log(NewAccessLogEntry {
                user_id: access.user_id,
                indicator_id: access.indicator_id,
                operation_type,
                access_source: AccessSource::Bulk,
                granted_at: Some(access.granted_at),
                expires_at: access.expires_at,
                revoked_at: None,
                duration_type: Some(access.duration_type),
                tradingview_response: access.tradingview_response.clone(),
                performed_by: Some(performed_by),
                indicator_access_id: Some(access.id),
                notes: None,
                metadata: json!({ "operation": BulkOperationType::Grant.as_str() }),
            })
            .await
        {
            warn!(access_id = %access.id, error = %error, "failed to append bulk grant log");
        }
    }

    async fn revoke_all(
        &self,
        users: &[EligibleUser],
        indicators: &[Indicator],
        performed_by: UserId,
    ) -> Vec<BulkPairResult> {
        let mut results = Vec::with_capacity(users.len() * indicators.len());

        for eligible in users {
            for indicator in indicators {
                let user_id = eligible.user.id();
                let result = match self.revoke_pair(eligible, indicator, performed_by).await {
                    Ok(note) => BulkPairResult {
                        message: note.map(str::to_owned),
                        ..BulkPairResult::succeeded(user_id, indicator.id())
                    },
                    Err(error) => {
                        BulkPairResult::failed(user_id, indicator.id(), error.to_string())
                    }
                };
                results.push(result);
            }
        }

        results
    }

    /// Revokes one pair. Returns an informational note when nothing was active.
    async fn revoke_pair(
        &self,
        eligible: &EligibleUser,
        indicator: &Indicator,
        performed_by: UserId,
    ) -> AppResult<Option<&'static str>> {
        let Some(access) = self
            .ledger
            .find_access(eligible.user.id(), indicator.id())
            .await?
            .filter(|access| access.status == AccessStatus::Active)
        else {
            return Ok(Some("no active access"));
        };

        let pine_ids = vec![indicator.pine_id().to_owned()];
        let results = match self
            .gateway
            .revoke_access(&access.tradingview_username, &pine_ids)
            .await
        {
            Ok(results) => results,
            Err(error) => {
                self.mark_failed(&access).await;
                return Err(error);
            }
        };

        let Some(result) = pair_succeeded(&results, indicator) else {
            self.mark_failed(&access).await;
            return Err(AppError::Upstream(
                "remote platform rejected the revoke".to_owned(),
            ));
        };

        let now = Utc::now();
        self.ledger
            .mark_revoked(MarkRevokedInput {
                access_id: access.id,
                revoked_at: now,
                revoked_by: Some(performed_by),
            })
            .await?;

        if let Err(error) = self
            .ledger
            .append_log(NewAccessLogEntry {
                user_id: access.user_id,
                indicator_id: access.indicator_id,
                operation_type: OperationType::Revoke,
                access_source: AccessSource::Bulk,
                granted_at: None,
                expires_at: access.expires_at,
                revoked_at: Some(now),
                duration_type: Some(access.duration_type),
                tradingview_response: Some(result.raw.clone()),
                performed_by: Some(performed_by),
                indicator_access_id: Some(access.id),
                notes: None,
                metadata: json!({ "operation": BulkOperationType::Revoke.as_str() }),
            })
            .await
        {
            warn!(access_id = %access.id, error = %error, "failed to append bulk revoke log");
        }

        Ok(None)
    }

    async fn mark_failed(&self, access: &IndicatorAccess) {
        if let Err(error) = self.ledger.mark_failed(&[access.id]).await {
            warn!(access_id = %access.id, error = %error, "failed to mark access as failed");
        }
    }
}

fn pair_succeeded<'a>(
    results: &'a [GatewayIndicatorResult],
    indicator: &Indicator,
) -> Option<&'a GatewayIndicatorResult> {
    results
        .iter()
        .find(|result| result.pine_id == indicator.pine_id() && result.succeeded)
}
