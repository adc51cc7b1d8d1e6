use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use pinegate_core::AppResult;
use pinegate_domain::{AccessTier, ActivityKind, OperationType, PlatformUser, UserId};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::access_outcome::{BuyerResolution, IndicatorError, OutcomeReason, resolve_buyer};
use crate::{
    AccessWithIndicator, ActivityRecord, ActivityRepository, EntitlementGateway,
    GatewayIndicatorResult, IndicatorAccessRepository, MarkRevokedInput, NewAccessLogEntry,
    UserDirectory,
};

/// Result of one cancellation revoke run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokeOutcome {
    /// `false` when the buyer could not be resolved or the remote call failed.
    pub success: bool,
    /// Terminal or failure reason.
    pub reason: Option<OutcomeReason>,
    /// Resolved user.
    pub user_id: Option<UserId>,
    /// Rows confirmed revoked.
    pub revoked_count: usize,
    /// Rows left in `failed` status.
    pub failed_count: usize,
    /// Per-indicator failures.
    pub errors: Vec<IndicatorError>,
}

impl RevokeOutcome {
    fn terminal(user_id: Option<UserId>, reason: OutcomeReason) -> Self {
        Self {
            success: false,
            reason: Some(reason),
            user_id,
            revoked_count: 0,
            failed_count: 0,
            errors: Vec::new(),
        }
    }
}

/// Revoke engine: removes premium access when a subscription ends.
#[derive(Clone)]
pub struct CancellationRevokeService {
    users: Arc<dyn UserDirectory>,
    ledger: Arc<dyn IndicatorAccessRepository>,
    gateway: Arc<dyn EntitlementGateway>,
    activities: Arc<dyn ActivityRepository>,
}

impl CancellationRevokeService {
    /// Creates a revoke engine.
    #[must_use]
    pub fn new(
        users: Arc<dyn UserDirectory>,
        ledger: Arc<dyn IndicatorAccessRepository>,
        gateway: Arc<dyn EntitlementGateway>,
        activities: Arc<dyn ActivityRepository>,
    ) -> Self {
        Self {
            users,
            ledger,
            gateway,
            activities,
        }
    }

    /// Revokes every active premium indicator of the customer.
    ///
    /// Free-tier access is left alone. Each row is revoked on the username it
    /// was granted to, one remote call per username. When a call fails every
    /// row it targeted is marked `failed` for the reconciliation job.
    pub async fn revoke_on_cancellation(
        &self,
        customer_email: &str,
        subscription_id: &str,
        reason: &str,
    ) -> AppResult<RevokeOutcome> {
        let user = match resolve_buyer(self.users.as_ref(), customer_email).await? {
            BuyerResolution::Ready { user, .. } => user,
            BuyerResolution::Terminal { user, reason } => {
                info!(
                    subscription_id,
                    reason = %reason,
                    "skipping cancellation revoke"
                );
                return Ok(RevokeOutcome::terminal(
                    user.as_ref().map(PlatformUser::id),
                    reason,
                ));
            }
        };

        let rows = self
            .ledger
            .list_active_access_for_user(user.id(), Some(AccessTier::Premium))
            .await?;

        let mut outcome = RevokeOutcome {
            success: true,
            reason: None,
            user_id: Some(user.id()),
            revoked_count: 0,
            failed_count: 0,
            errors: Vec::new(),
        };

        if rows.is_empty() {
            info!(user_id = %user.id(), subscription_id, "no premium access to revoke");
            self.record_cancellation(user.id(), subscription_id, reason, 0)
                .await;
            return Ok(outcome);
        }

        // Access lives on the account it was granted to, which may differ from
        // the user's current username.
        let mut by_username: BTreeMap<String, Vec<AccessWithIndicator>> = BTreeMap::new();
        for row in rows {
            by_username
                .entry(row.access.tradingview_username.clone())
                .or_default()
                .push(row);
        }

        for (username, rows) in by_username {
            let pine_ids: Vec<String> = rows
                .iter()
                .map(|row| row.indicator.pine_id().to_owned())
                .collect();

            match self.gateway.revoke_access(&username, &pine_ids).await {
                Ok(results) => {
                    self.apply_results(&rows, results, subscription_id, reason, &mut outcome)
                        .await?;
                }
                Err(error) => {
                    warn!(
                        user_id = %user.id(),
                        username = %username,
                        subscription_id,
                        error = %error,
                        "gateway revoke failed, marking access for reconciliation"
                    );
                    let access_ids: Vec<Uuid> = rows.iter().map(|row| row.access.id).collect();
                    self.ledger.mark_failed(&access_ids).await?;

                    let message = error.to_string();
                    outcome.success = false;
                    outcome.failed_count += rows.len();
                    outcome
                        .errors
                        .extend(rows.iter().map(|row| IndicatorError {
                            indicator_id: Some(row.indicator.id()),
                            pine_id: row.indicator.pine_id().to_owned(),
                            message: message.clone(),
                        }));
                    outcome.reason = Some(OutcomeReason::GatewayFailure(message));
                }
            }
        }

        self.record_cancellation(user.id(), subscription_id, reason, outcome.revoked_count)
            .await;

        info!(
            user_id = %user.id(),
            subscription_id,
            revoked = outcome.revoked_count,
            failed = outcome.failed_count,
            "cancellation revoke finished"
        );

        Ok(outcome)
    }

    async fn apply_results(
        &self,
        rows: &[AccessWithIndicator],
        results: Vec<GatewayIndicatorResult>,
        subscription_id: &str,
        reason: &str,
        outcome: &mut RevokeOutcome,
    ) -> AppResult<()> {
        let results_by_pine: HashMap<String, GatewayIndicatorResult> = results
            .into_iter()
            .map(|result| (result.pine_id.clone(), result))
            .collect();
        let now = Utc::now();
        let mut failed_ids = Vec::new();

        for row in rows {
            let result = results_by_pine
                .get(row.indicator.pine_id())
                .filter(|result| result.succeeded);

            let Some(result) = result else {
                failed_ids.push(row.access.id);
                outcome.failed_count += 1;
                outcome.errors.push(IndicatorError {
                    indicator_id: Some(row.indicator.id()),
                    pine_id: row.indicator.pine_id().to_owned(),
                    message: "remote platform rejected the revoke".to_owned(),
                });
                continue;
            };

            self.ledger
                .mark_revoked(MarkRevokedInput {
                    access_id: row.access.id,
                    revoked_at: now,
                    revoked_by: None,
                })
                .await?;
            outcome.revoked_count += 1;

            if let Err(error) = self
                .ledger
                .append_log(NewAccessLogEntry {
                    user_id: row.access.user_id,
                    indicator_id: row.indicator.id(),
                    operation_type: OperationType::Revoke,
                    access_source: row.access.access_source,
                    granted_at: None,
                    expires_at: row.access.expires_at,
                    revoked_at: Some(now),
                    duration_type: Some(row.access.duration_type),
                    tradingview_response: Some(result.raw.clone()),
                    performed_by: None,
                    indicator_access_id: Some(row.access.id),
                    notes: None,
                    metadata: json!({
                        "subscription_id": subscription_id,
                        "reason": reason,
                    }),
                })
                .await
            {
                warn!(
                    access_id = %row.access.id,
                    error = %error,
                    "failed to append revoke log entry"
                );
            }
        }

        if !failed_ids.is_empty() {
            self.ledger.mark_failed(&failed_ids).await?;
        }

        Ok(())
    }

    async fn record_cancellation(
        &self,
        user_id: UserId,
        subscription_id: &str,
        reason: &str,
        revoked_count: usize,
    ) {
        let record = ActivityRecord {
            user_id,
            kind: ActivityKind::SubscriptionCancelled,
            description: "Subscription cancelled, premium indicator access removed".to_owned(),
            metadata: json!({
                "subscription_id": subscription_id,
                "reason": reason,
                "revoked_count": revoked_count,
            }),
        };

        if let Err(error) = self.activities.record_activity(record).await {
            warn!(
                user_id = %user_id,
                subscription_id,
                error = %error,
                "failed to record cancellation activity"
            );
        }
    }
}

#[cfg(test)]
mod tests;
