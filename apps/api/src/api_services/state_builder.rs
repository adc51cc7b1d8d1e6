use std::sync::Arc;
use std::time::Duration;

use pinegate_application::{
    AccessPolicyResolver, AccessPolicyTable, ActivityRepository, AdminPermissionRepository,
    AuthorizationService, BulkAccessService, CancellationRevokeService, DurationPolicy,
    EntitlementGateway, IndicatorAccessRepository, IndicatorCatalog, PriceCatalog,
    PurchaseGrantService, StripeApi, StripeMirrorRepository, StripeSignatureVerifier,
    StripeWebhookService, UserDirectory,
};
use pinegate_core::AppError;
use pinegate_infrastructure::{
    HttpEntitlementGateway, HttpStripeApi, PostgresActivityRepository,
    PostgresAdminPermissionRepository, PostgresIndicatorAccessRepository,
    PostgresIndicatorCatalog, PostgresStripeMirrorRepository, PostgresUserDirectory,
};
use sqlx::PgPool;

use crate::api_config::ApiConfig;
use crate::state::AppState;

const STRIPE_API_TIMEOUT: Duration = Duration::from_secs(10);

struct RepositorySet {
    users: Arc<dyn UserDirectory>,
    ledger: Arc<dyn IndicatorAccessRepository>,
    catalog: Arc<dyn IndicatorCatalog>,
    mirror: Arc<dyn StripeMirrorRepository>,
    prices: Arc<dyn PriceCatalog>,
    activities: Arc<dyn ActivityRepository>,
    admin_permissions: Arc<dyn AdminPermissionRepository>,
}

fn build_repository_set(pool: &PgPool) -> RepositorySet {
    let stripe_mirror = Arc::new(PostgresStripeMirrorRepository::new(pool.clone()));

    RepositorySet {
        users: Arc::new(PostgresUserDirectory::new(pool.clone())),
        ledger: Arc::new(PostgresIndicatorAccessRepository::new(pool.clone())),
        catalog: Arc::new(PostgresIndicatorCatalog::new(pool.clone())),
        mirror: stripe_mirror.clone(),
        prices: stripe_mirror,
        activities: Arc::new(PostgresActivityRepository::new(pool.clone())),
        admin_permissions: Arc::new(PostgresAdminPermissionRepository::new(pool.clone())),
    }
}

pub fn build_app_state(pool: PgPool, config: &ApiConfig) -> Result<AppState, AppError> {
    let repositories = build_repository_set(&pool);

    let gateway: Arc<dyn EntitlementGateway> = Arc::new(HttpEntitlementGateway::new(
        config.gateway.url.as_str(),
        config.gateway.api_key.clone(),
        config.gateway.timeout,
    )?);
    let stripe_api: Arc<dyn StripeApi> = Arc::new(HttpStripeApi::new(
        config.stripe.api_base_url.as_str(),
        config.stripe.secret_key.as_str(),
        STRIPE_API_TIMEOUT,
    )?);

    let policies = AccessPolicyResolver::new(
        AccessPolicyTable::new(config.access_policies.clone()),
        repositories.catalog.clone(),
    );
    let durations = DurationPolicy::new(repositories.prices)
        .with_overrides(config.price_duration_overrides.clone());

    let grant_service = PurchaseGrantService::new(
        repositories.users.clone(),
        repositories.ledger.clone(),
        gateway.clone(),
        policies,
        durations,
    );
    let revoke_service = CancellationRevokeService::new(
        repositories.users.clone(),
        repositories.ledger.clone(),
        gateway.clone(),
        repositories.activities,
    );
    let webhook_service = StripeWebhookService::new(
        StripeSignatureVerifier::new(config.stripe.webhook_secret.clone()),
        repositories.mirror,
        stripe_api,
        grant_service,
        revoke_service,
    );

    let bulk_access_service = BulkAccessService::new(
        AuthorizationService::new(repositories.admin_permissions),
        repositories.users,
        repositories.catalog,
        repositories.ledger,
        gateway,
    );

    Ok(AppState {
        webhook_service,
        bulk_access_service,
        admin_api_token: config.admin_api_token.clone(),
        postgres_pool: pool,
    })
}
