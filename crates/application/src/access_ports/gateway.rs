use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pinegate_core::AppResult;
use pinegate_domain::DurationType;
use serde_json::Value;

/// Outcome reported by the remote platform for one pine id.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayIndicatorResult {
    /// Remote script identifier.
    pub pine_id: String,
    /// Whether the remote platform applied the change.
    pub succeeded: bool,
    /// Authoritative expiration, absent for lifetime access or when omitted.
    pub expires_at: Option<DateTime<Utc>>,
    /// Raw result object kept for diagnostics.
    pub raw: Value,
}

/// Port for the remote TradingView access service.
///
/// Implementations return `AppError::Upstream` for transport errors, non-2xx
/// responses, malformed bodies and timeouts. A successful call may still
/// contain failed per-indicator results.
#[async_trait]
pub trait EntitlementGateway: Send + Sync {
    /// Grants access to the given scripts for a username.
    async fn grant_access(
        &self,
        username: &str,
        pine_ids: &[String],
        duration: DurationType,
    ) -> AppResult<Vec<GatewayIndicatorResult>>;

    /// Removes access to the given scripts for a username.
    async fn revoke_access(
        &self,
        username: &str,
        pine_ids: &[String],
    ) -> AppResult<Vec<GatewayIndicatorResult>>;
}
