mod access;
mod common;

pub use access::{BulkIndicatorAccessRequest, BulkIndicatorAccessResponse, BulkPairResultResponse};
pub use common::{HealthDependencyStatus, HealthResponse, WebhookAckResponse};
