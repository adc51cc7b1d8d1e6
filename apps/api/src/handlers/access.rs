use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};
use pinegate_application::BulkAccessRequest;
use pinegate_core::{AdminIdentity, AppError};
use tracing::info;

use crate::dto::{BulkIndicatorAccessRequest, BulkIndicatorAccessResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn bulk_indicator_access_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    payload: Result<Json<BulkIndicatorAccessRequest>, JsonRejection>,
) -> ApiResult<Json<BulkIndicatorAccessResponse>> {
    let Json(payload) = payload
        .map_err(|rejection| AppError::Validation(format!("invalid request body: {rejection}")))?;
    let request = BulkAccessRequest::try_from(payload)?;
    let operation = request.operation;

    let summary = state.bulk_access_service.execute(&admin, request).await?;
    info!(
        admin_user_id = %admin.user_id(),
        operation = operation.as_str(),
        total = summary.total,
        successful = summary.successful,
        failed = summary.failed,
        "bulk indicator access finished"
    );

    Ok(Json(BulkIndicatorAccessResponse::from(summary)))
}
