use pinegate_application::{BulkAccessService, StripeWebhookService};
use sqlx::PgPool;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub webhook_service: StripeWebhookService,
    pub bulk_access_service: BulkAccessService,
    pub admin_api_token: String,
    pub postgres_pool: PgPool,
}
