//! Pinegate reconciliation worker runtime.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use pinegate_application::AccessReconciliationService;
use pinegate_core::{AppError, AppResult};
use pinegate_infrastructure::{HttpEntitlementGateway, PostgresIndicatorAccessRepository};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    gateway_url: String,
    gateway_api_key: Option<String>,
    gateway_timeout_ms: u64,
    reconcile_interval_ms: u64,
    reconcile_batch_size: usize,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    let reconciliation_service = build_reconciliation_service(pool, &config)?;

    info!(
        gateway_url = %config.gateway_url,
        reconcile_interval_ms = config.reconcile_interval_ms,
        reconcile_batch_size = config.reconcile_batch_size,
        "pinegate-worker started"
    );

    loop {
        match reconciliation_service
            .reconcile_failed(config.reconcile_batch_size)
            .await
        {
            Ok(report) => {
                // Drain without sleeping while full batches keep making progress.
                if report.examined == config.reconcile_batch_size && report.revoked > 0 {
                    continue;
                }
            }
            Err(error) => {
                warn!(error = %error, "reconciliation pass failed");
            }
        }

        tokio::time::sleep(Duration::from_millis(config.reconcile_interval_ms)).await;
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn build_reconciliation_service(
    pool: PgPool,
    config: &WorkerConfig,
) -> AppResult<AccessReconciliationService> {
    let ledger = Arc::new(PostgresIndicatorAccessRepository::new(pool));
    let gateway = Arc::new(HttpEntitlementGateway::new(
        config.gateway_url.as_str(),
        config.gateway_api_key.clone(),
        Duration::from_millis(config.gateway_timeout_ms),
    )?);

    Ok(AccessReconciliationService::new(ledger, gateway))
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let gateway_url = required_env("TRADINGVIEW_GATEWAY_URL")?;
        let gateway_api_key = env::var("TRADINGVIEW_GATEWAY_API_KEY")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());
        let gateway_timeout_ms = parse_env_u64("TRADINGVIEW_GATEWAY_TIMEOUT_MS", 10_000)?;
        let reconcile_interval_ms = parse_env_u64("RECONCILE_INTERVAL_MS", 60_000)?;
        let reconcile_batch_size = parse_env_usize("RECONCILE_BATCH_SIZE", 50)?;

        if gateway_timeout_ms == 0 {
            return Err(AppError::Validation(
                "TRADINGVIEW_GATEWAY_TIMEOUT_MS must be greater than zero".to_owned(),
            ));
        }

        if reconcile_interval_ms == 0 {
            return Err(AppError::Validation(
                "RECONCILE_INTERVAL_MS must be greater than zero".to_owned(),
            ));
        }

        if reconcile_batch_size == 0 {
            return Err(AppError::Validation(
                "RECONCILE_BATCH_SIZE must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            gateway_url,
            gateway_api_key,
            gateway_timeout_ms,
            reconcile_interval_ms,
            reconcile_batch_size,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env_usize(name: &str, default: usize) -> AppResult<usize> {
    match env::var(name) {
        Ok(value) => value.parse::<usize>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
