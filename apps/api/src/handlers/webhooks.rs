use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use pinegate_core::AppError;
use tracing::{info, warn};

use crate::dto::WebhookAckResponse;
use crate::error::ErrorResponse;
use crate::state::AppState;

const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

/// Rejection for webhook deliveries. Every failure is reported as 400.
#[derive(Debug)]
pub struct WebhookRejection(AppError);

impl IntoResponse for WebhookRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(self.0.to_string())),
        )
            .into_response()
    }
}

pub async fn stripe_webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAckResponse>, WebhookRejection> {
    let Some(signature) = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        warn!("stripe webhook rejected: missing signature header");
        return Err(WebhookRejection(AppError::Unauthorized(
            "missing stripe-signature header".to_owned(),
        )));
    };

    match state.webhook_service.handle_webhook(&body, signature).await {
        Ok(outcome) => {
            info!(
                event_id = %outcome.event_id,
                event_type = %outcome.event_type,
                handled = outcome.handled,
                "stripe webhook processed"
            );
            Ok(Json(WebhookAckResponse { received: true }))
        }
        Err(error) => {
            warn!(error = %error, "stripe webhook rejected");
            Err(WebhookRejection(error))
        }
    }
}
