//! Pinegate API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use pinegate_core::AppError;
use tracing::info;

use crate::api_config::{ApiConfig, init_tracing};
use crate::api_router::build_router;
use crate::api_services::{build_app_state, connect_and_migrate};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;
    let pool = connect_and_migrate(&config.database_url).await?;

    if config.migrate_only {
        info!("database migrations applied successfully");
        return Ok(());
    }

    info!(
        access_policies = config.access_policies.len(),
        price_duration_overrides = config.price_duration_overrides.len(),
        gateway_url = %config.gateway.url,
        "pinegate-api configuration loaded"
    );

    let app_state = build_app_state(pool, &config)?;
    let app = build_router(app_state, &config.frontend_url)?;

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "pinegate-api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}
