use std::collections::HashMap;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use pinegate_core::AppError;
use pinegate_domain::{AccessPolicy, DurationType};
use tracing_subscriber::EnvFilter;

/// Minimum length accepted for the admin bearer token.
const MIN_ADMIN_TOKEN_LENGTH: usize = 32;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub webhook_secret: String,
    pub secret_key: String,
    pub api_base_url: String,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub frontend_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub stripe: StripeConfig,
    pub gateway: GatewayConfig,
    pub admin_api_token: String,
    pub access_policies: HashMap<String, AccessPolicy>,
    pub price_duration_overrides: HashMap<String, DurationType>,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let database_url = required_env("DATABASE_URL")?;
        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());
        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        let stripe = StripeConfig {
            webhook_secret: required_non_empty_env("STRIPE_WEBHOOK_SECRET")?,
            secret_key: required_non_empty_env("STRIPE_SECRET_KEY")?,
            api_base_url: env::var("STRIPE_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.stripe.com".to_owned()),
        };

        let gateway_timeout_ms = match env::var("TRADINGVIEW_GATEWAY_TIMEOUT_MS") {
            Ok(value) => value.parse::<u64>().map_err(|error| {
                AppError::Validation(format!(
                    "invalid TRADINGVIEW_GATEWAY_TIMEOUT_MS value '{value}': {error}"
                ))
            })?,
            Err(_) => 10_000,
        };
        if gateway_timeout_ms == 0 {
            return Err(AppError::Validation(
                "TRADINGVIEW_GATEWAY_TIMEOUT_MS must be greater than zero".to_owned(),
            ));
        }
        let gateway = GatewayConfig {
            url: required_non_empty_env("TRADINGVIEW_GATEWAY_URL")?,
            api_key: env::var("TRADINGVIEW_GATEWAY_API_KEY")
                .ok()
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty()),
            timeout: Duration::from_millis(gateway_timeout_ms),
        };

        let admin_api_token = required_env("ADMIN_API_TOKEN")?;
        if admin_api_token.len() < MIN_ADMIN_TOKEN_LENGTH {
            return Err(AppError::Validation(format!(
                "ADMIN_API_TOKEN must be at least {MIN_ADMIN_TOKEN_LENGTH} characters"
            )));
        }

        let access_policies = parse_access_policy_map(env::var("ACCESS_POLICY_MAP").ok())?;
        let price_duration_overrides =
            parse_price_duration_overrides(env::var("PRICE_DURATION_OVERRIDES").ok())?;

        Ok(Self {
            migrate_only,
            database_url,
            frontend_url,
            api_host,
            api_port,
            stripe,
            gateway,
            admin_api_token,
            access_policies,
            price_duration_overrides,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

/// Parses `{"prod_...": "premium" | "all" | "free" | {"specific": [uuid, ...]}}`.
pub fn parse_access_policy_map(
    raw: Option<String>,
) -> Result<HashMap<String, AccessPolicy>, AppError> {
    let Some(raw) = raw.filter(|value| !value.trim().is_empty()) else {
        return Ok(HashMap::new());
    };

    serde_json::from_str(&raw)
        .map_err(|error| AppError::Validation(format!("invalid ACCESS_POLICY_MAP: {error}")))
}

/// Parses `{"price_...": "30D"}`.
pub fn parse_price_duration_overrides(
    raw: Option<String>,
) -> Result<HashMap<String, DurationType>, AppError> {
    let Some(raw) = raw.filter(|value| !value.trim().is_empty()) else {
        return Ok(HashMap::new());
    };

    serde_json::from_str(&raw).map_err(|error| {
        AppError::Validation(format!("invalid PRICE_DURATION_OVERRIDES: {error}"))
    })
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}
