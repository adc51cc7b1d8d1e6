use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use pinegate_core::{AdminIdentity, AppError};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::state::AppState;

/// Header carrying the platform user id of the calling admin.
pub const ADMIN_USER_ID_HEADER: &str = "x-admin-user-id";

pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let identity = admin_identity(request.headers(), state.admin_api_token.as_str())?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

fn admin_identity(headers: &HeaderMap, expected_token: &str) -> Result<AdminIdentity, AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or_else(|| AppError::Unauthorized("admin bearer token required".to_owned()))?;

    if !bool::from(token.as_bytes().ct_eq(expected_token.as_bytes())) {
        return Err(AppError::Unauthorized("invalid admin token".to_owned()));
    }

    let user_id = headers
        .get(ADMIN_USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::Unauthorized(format!("{ADMIN_USER_ID_HEADER} header is required"))
        })?;
    let user_id = Uuid::parse_str(user_id.trim()).map_err(|error| {
        AppError::Unauthorized(format!("invalid {ADMIN_USER_ID_HEADER} header: {error}"))
    })?;

    Ok(AdminIdentity::new(user_id))
}
