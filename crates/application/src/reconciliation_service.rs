use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use pinegate_core::AppResult;
use pinegate_domain::OperationType;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    AccessWithIndicator, EntitlementGateway, IndicatorAccessRepository, MarkRevokedInput,
    NewAccessLogEntry,
};

/// Counters for one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    /// Failed rows examined.
    pub examined: usize,
    /// Rows confirmed revoked.
    pub revoked: usize,
    /// Rows that remain failed.
    pub still_failed: usize,
}

/// Retries revocations for ledger rows left in `failed` status.
#[derive(Clone)]
pub struct AccessReconciliationService {
    ledger: Arc<dyn IndicatorAccessRepository>,
    gateway: Arc<dyn EntitlementGateway>,
}

impl AccessReconciliationService {
    /// Creates a reconciliation service.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn IndicatorAccessRepository>,
        gateway: Arc<dyn EntitlementGateway>,
    ) -> Self {
        Self { ledger, gateway }
    }

    /// Retries up to `limit` failed rows, one gateway call per username.
    ///
    /// Rows that stay failed are re-stamped and rotate behind untried rows.
    pub async fn reconcile_failed(&self, limit: usize) -> AppResult<ReconciliationReport> {
        let rows = self.ledger.list_failed_access(limit).await?;
        let mut report = ReconciliationReport {
            examined: rows.len(),
            ..ReconciliationReport::default()
        };

        let mut still_failed: Vec<Uuid> = Vec::new();
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

            let results = match self.gateway.revoke_access(&username, &pine_ids).await {
                Ok(results) => results,
                Err(error) => {
                    warn!(
                        username = %username,
                        rows = rows.len(),
                        error = %error,
                        "reconciliation revoke failed"
                    );
                    still_failed.extend(rows.iter().map(|row| row.access.id));
                    continue;
                }
            };

            let now = Utc::now();
            for row in rows {
                let Some(result) = results.iter().find(|result| {
                    result.pine_id == row.indicator.pine_id() && result.succeeded
                }) else {
                    still_failed.push(row.access.id);
                    continue;
                };

                self.ledger
                    .mark_revoked(MarkRevokedInput {
                        access_id: row.access.id,
                        revoked_at: now,
                        revoked_by: None,
                    })
                    .await?;
                report.revoked += 1;

                if let Err(error) = self
                    .ledger
                    .append_log(NewAccessLogEntry {
                        user_id: row.access.user_id,
                        indicator_id: row.access.indicator_id,
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
                        metadata: json!({ "reason": "reconciliation" }),
                    })
                    .await
                {
                    warn!(
                        access_id = %row.access.id,
                        error = %error,
                        "failed to append reconciliation log"
                    );
                }
            }
        }

        // Rows that stay failed move behind untried rows.
        report.still_failed = still_failed.len();
        self.ledger.mark_failed(&still_failed).await?;

        if report.examined > 0 {
            info!(
                examined = report.examined,
                revoked = report.revoked,
                still_failed = report.still_failed,
                "reconciliation pass finished"
            );
        }

        Ok(report)
    }
}
