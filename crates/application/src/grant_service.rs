use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pinegate_core::AppResult;
use pinegate_domain::{AccessSource, DurationType, Indicator, OperationType, PlatformUser, UserId};
use serde_json::json;
use tracing::{info, warn};

use crate::access_outcome::{BuyerResolution, IndicatorError, OutcomeReason, resolve_buyer};
use crate::{
    AccessPolicyResolver, DurationPolicy, EntitlementGateway, GatewayIndicatorResult,
    IndicatorAccessRepository, NewAccessLogEntry, PriceCadence, UpsertIndicatorAccessInput,
    UserDirectory,
};

/// Purchase that should unlock indicators for its buyer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantOnPurchaseInput {
    /// Buyer email as reported by Stripe.
    pub customer_email: String,
    /// Purchased product ids.
    pub product_ids: Vec<String>,
    /// Purchased price id, used to pick the duration.
    pub price_id: Option<String>,
    /// Cadence of the purchased price when the event carried the price object.
    pub price_cadence: Option<PriceCadence>,
    /// Subscription id or checkout session id.
    pub purchase_id: String,
    /// Origin recorded on ledger and log rows.
    pub source: AccessSource,
}

/// Result of one grant run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantOutcome {
    /// `true` when at least one indicator was granted or renewed.
    pub success: bool,
    /// Terminal reason when nothing was attempted.
    pub reason: Option<OutcomeReason>,
    /// Resolved buyer.
    pub user_id: Option<UserId>,
    /// Duration sent to the remote platform.
    pub duration: Option<DurationType>,
    /// Pairs granted for the first time.
    pub granted_count: usize,
    /// Pairs that already had a ledger row.
    pub renewed_count: usize,
    /// Indicators that could not be granted or recorded.
    pub failed_count: usize,
    /// Per-indicator failures.
    pub errors: Vec<IndicatorError>,
}

impl GrantOutcome {
    fn terminal(user_id: Option<UserId>, reason: OutcomeReason) -> Self {
        Self {
            success: false,
            reason: Some(reason),
            user_id,
            duration: None,
            granted_count: 0,
            renewed_count: 0,
            failed_count: 0,
            errors: Vec::new(),
        }
    }

    fn record_failure(&mut self, indicator: &Indicator, message: impl Into<String>) {
        self.failed_count += 1;
        self.errors.push(IndicatorError {
            indicator_id: Some(indicator.id()),
            pine_id: indicator.pine_id().to_owned(),
            message: message.into(),
        });
    }
}

struct GrantContext<'a> {
    user_id: UserId,
    username: &'a str,
    duration: DurationType,
    now: DateTime<Utc>,
    input: &'a GrantOnPurchaseInput,
}

/// Grant engine: turns a paid purchase into remote access plus ledger rows.
#[derive(Clone)]
pub struct PurchaseGrantService {
    users: Arc<dyn UserDirectory>,
    ledger: Arc<dyn IndicatorAccessRepository>,
    gateway: Arc<dyn EntitlementGateway>,
    policies: AccessPolicyResolver,
    durations: DurationPolicy,
}

impl PurchaseGrantService {
    /// Creates a grant engine.
    #[must_use]
    pub fn new(
        users: Arc<dyn UserDirectory>,
        ledger: Arc<dyn IndicatorAccessRepository>,
        gateway: Arc<dyn EntitlementGateway>,
        policies: AccessPolicyResolver,
        durations: DurationPolicy,
    ) -> Self {
        Self {
            users,
            ledger,
            gateway,
            policies,
            durations,
        }
    }

    /// Grants every indicator the purchased products unlock.
    ///
    /// Repeated calls for the same purchase renew the same ledger rows. A
    /// gateway-level error is returned as `Err` so the caller can retry.
    pub async fn grant_on_purchase(
        &self,
        input: GrantOnPurchaseInput,
    ) -> AppResult<GrantOutcome> {
        let (user, username) = match resolve_buyer(self.users.as_ref(), &input.customer_email)
            .await?
        {
            BuyerResolution::Ready { user, username } => (user, username),
            BuyerResolution::Terminal { user, reason } => {
                info!(
                    purchase_id = %input.purchase_id,
                    reason = %reason,
                    "skipping purchase grant"
                );
                return Ok(GrantOutcome::terminal(
                    user.as_ref().map(PlatformUser::id),
                    reason,
                ));
            }
        };

        let indicators = self
            .policies
            .indicators_for_products(&input.product_ids)
            .await?;
        if indicators.is_empty() {
            return Ok(GrantOutcome::terminal(
                Some(user.id()),
                OutcomeReason::NoActiveIndicators,
            ));
        }

        let duration = self
            .durations
            .duration_for_purchase(input.price_id.as_deref(), input.price_cadence.as_ref())
            .await?;
        let pine_ids: Vec<String> = indicators
            .iter()
            .map(|indicator| indicator.pine_id().to_owned())
            .collect();

        let results = self
            .gateway
            .grant_access(&username, &pine_ids, duration)
            .await?;

        let context = GrantContext {
            user_id: user.id(),
            username: &username,
            duration,
            now: Utc::now(),
            input: &input,
        };
        let mut outcome = GrantOutcome {
            success: false,
            reason: None,
            user_id: Some(user.id()),
            duration: Some(duration),
            granted_count: 0,
            renewed_count: 0,
            failed_count: 0,
            errors: Vec::new(),
        };

        let mut results_by_pine: HashMap<String, GatewayIndicatorResult> = HashMap::new();
        for result in results {
            if pine_ids.contains(&result.pine_id) {
                results_by_pine.insert(result.pine_id.clone(), result);
            } else {
                warn!(
                    pine_id = %result.pine_id,
                    "ignoring gateway result for unrequested pine id"
                );
            }
        }

        for indicator in &indicators {
            let Some(result) = results_by_pine.remove(indicator.pine_id()) else {
                outcome.record_failure(indicator, "no result returned by remote platform");
                continue;
            };

            if !result.succeeded {
                outcome.record_failure(indicator, "remote platform rejected the grant");
                continue;
            }

            match self.record_grant(&context, indicator, result).await {
                Ok(true) => outcome.renewed_count += 1,
                Ok(false) => outcome.granted_count += 1,
                Err(error) => outcome.record_failure(indicator, error.to_string()),
            }
        }

        outcome.success = outcome.granted_count + outcome.renewed_count > 0;
        info!(
            user_id = %user.id(),
            purchase_id = %input.purchase_id,
            duration = duration.as_str(),
            granted = outcome.granted_count,
            renewed = outcome.renewed_count,
            failed = outcome.failed_count,
            "purchase grant finished"
        );

        Ok(outcome)
    }

    /// Upserts the ledger row and appends its log row. Returns whether the
    /// pair already had a row.
    async fn record_grant(
        &self,
        context: &GrantContext<'_>,
        indicator: &Indicator,
        result: GatewayIndicatorResult,
    ) -> AppResult<bool> {
        let expires_at = result
            .expires_at
            .or_else(|| context.duration.expires_at_from(context.now));
        let upserted = self
            .ledger
            .upsert_access(UpsertIndicatorAccessInput {
                user_id: context.user_id,
                indicator_id: indicator.id(),
                tradingview_username: context.username.to_owned(),
                granted_at: context.now,
                expires_at,
                duration_type: context.duration,
                access_source: context.input.source,
                granted_by: None,
                tradingview_response: Some(result.raw.clone()),
                notes: None,
            })
            .await?;

        let operation_type = if upserted.previously_existed {
            OperationType::Renew
        } else {
            OperationType::Grant
        };

        if let Err(error) = self
            .ledger
            .append_log(NewAccessLogEntry {
                user_id: context.user_id,
                indicator_id: indicator.id(),
                operation_type,
                access_source: context.input.source,
                granted_at: Some(context.now),
                expires_at,
                revoked_at: None,
                duration_type: Some(context.duration),
                tradingview_response: Some(result.raw),
                performed_by: None,
                indicator_access_id: Some(upserted.access.id),
                notes: None,
                metadata: json!({ "purchase_id": context.input.purchase_id }),
            })
            .await
        {
            warn!(
                access_id = %upserted.access.id,
                error = %error,
                "failed to append grant log entry"
            );
        }

        Ok(upserted.previously_existed)
    }
}
