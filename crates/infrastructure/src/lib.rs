//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_entitlement_gateway;
mod http_stripe_api;
mod postgres_activity_repository;
mod postgres_admin_permission_repository;
mod postgres_indicator_access_repository;
mod postgres_indicator_catalog;
mod postgres_stripe_mirror_repository;
mod postgres_user_directory;

pub use http_entitlement_gateway::HttpEntitlementGateway;
pub use http_stripe_api::HttpStripeApi;
pub use postgres_activity_repository::PostgresActivityRepository;
pub use postgres_admin_permission_repository::PostgresAdminPermissionRepository;
pub use postgres_indicator_access_repository::PostgresIndicatorAccessRepository;
pub use postgres_indicator_catalog::PostgresIndicatorCatalog;
pub use postgres_stripe_mirror_repository::PostgresStripeMirrorRepository;
pub use postgres_user_directory::PostgresUserDirectory;
