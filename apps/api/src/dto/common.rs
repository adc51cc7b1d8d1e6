use serde::Serialize;
use ts_rs::TS;

/// Health response payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/health-response.ts"
)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ready: bool,
    pub postgres: HealthDependencyStatus,
}

/// One runtime dependency health status.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/health-dependency-status.ts"
)]
pub struct HealthDependencyStatus {
    pub status: &'static str,
    pub detail: Option<String>,
}

/// Acknowledgement returned to Stripe for accepted deliveries.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/webhook-ack-response.ts"
)]
pub struct WebhookAckResponse {
    pub received: bool,
}
