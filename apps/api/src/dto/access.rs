use std::str::FromStr;

use pinegate_application::{BulkAccessRequest, BulkAccessSummary, BulkOperationType, BulkPairResult};
use pinegate_core::AppError;
use pinegate_domain::{DurationType, IndicatorId, UserId};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Incoming payload for admin bulk grants and revokes.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/bulk-indicator-access-request.ts"
)]
pub struct BulkIndicatorAccessRequest {
    pub user_ids: Vec<String>,
    pub indicator_ids: Vec<String>,
    #[serde(default)]
    pub duration: Option<String>,
    pub operation_type: String,
}

/// API representation of one pair outcome.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/bulk-pair-result-response.ts"
)]
pub struct BulkPairResultResponse {
    pub user_id: String,
    pub indicator_id: String,
    pub success: bool,
    pub message: Option<String>,
    pub expires_at: Option<String>,
}

/// API representation of a bulk operation summary.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/bulk-indicator-access-response.ts"
)]
pub struct BulkIndicatorAccessResponse {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub users_processed: usize,
    pub users_skipped: usize,
    pub indicators_processed: usize,
    pub results: Vec<BulkPairResultResponse>,
}

impl TryFrom<BulkIndicatorAccessRequest> for BulkAccessRequest {
    type Error = AppError;

    fn try_from(value: BulkIndicatorAccessRequest) -> Result<Self, Self::Error> {
        let user_ids = value
            .user_ids
            .iter()
            .map(|raw| parse_uuid("user id", raw).map(UserId::from_uuid))
            .collect::<Result<Vec<_>, _>>()?;
        let indicator_ids = value
            .indicator_ids
            .iter()
            .map(|raw| parse_uuid("indicator id", raw).map(IndicatorId::from_uuid))
            .collect::<Result<Vec<_>, _>>()?;
        let duration = value
            .duration
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(DurationType::from_str)
            .transpose()?;

        Ok(Self {
            user_ids,
            indicator_ids,
            duration,
            operation: BulkOperationType::from_str(value.operation_type.trim())?,
        })
    }
}

fn parse_uuid(label: &str, raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim())
        .map_err(|error| AppError::Validation(format!("invalid {label} '{raw}': {error}")))
}

impl From<BulkPairResult> for BulkPairResultResponse {
    fn from(value: BulkPairResult) -> Self {
        Self {
            user_id: value.user_id.to_string(),
            indicator_id: value.indicator_id.to_string(),
            success: value.success,
            message: value.message,
            expires_at: value.expires_at.map(|expires_at| expires_at.to_rfc3339()),
        }
    }
}

impl From<BulkAccessSummary> for BulkIndicatorAccessResponse {
    fn from(value: BulkAccessSummary) -> Self {
        Self {
            total: value.total,
            successful: value.successful,
            failed: value.failed,
            users_processed: value.users_processed,
            users_skipped: value.users_skipped,
            indicators_processed: value.indicators_processed,
            results: value
                .results
                .into_iter()
                .map(BulkPairResultResponse::from)
                .collect(),
        }
    }
}
