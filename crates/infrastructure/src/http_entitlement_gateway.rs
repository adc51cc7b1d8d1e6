use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pinegate_application::{EntitlementGateway, GatewayIndicatorResult};
use pinegate_core::{AppError, AppResult};
use pinegate_domain::DurationType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

/// HTTP client for the TradingView access service.
#[derive(Clone)]
pub struct HttpEntitlementGateway {
    http_client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct GrantRequestBody<'a> {
    pine_ids: &'a [String],
    duration: &'static str,
}

#[derive(Debug, Serialize)]
struct RevokeRequestBody<'a> {
    pine_ids: &'a [String],
}

#[derive(Debug, Deserialize)]
struct IndicatorResultBody {
    pine_id: String,
    status: String,
    #[serde(default, alias = "currentExpiration")]
    expiration: Option<String>,
    #[serde(default, rename = "noExpiration")]
    no_expiration: bool,
}

impl HttpEntitlementGateway {
    /// Creates a gateway client with a bounded request timeout.
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> AppResult<Self> {
        let base_url = Url::parse(base_url).map_err(|error| {
            AppError::Validation(format!("invalid entitlement gateway url '{base_url}': {error}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Validation(format!(
                "entitlement gateway url '{base_url}' cannot be used as a base"
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| {
                AppError::Internal(format!("failed to build entitlement gateway client: {error}"))
            })?;

        Ok(Self {
            http_client,
            base_url,
            api_key: api_key.filter(|value| !value.trim().is_empty()),
        })
    }

    fn access_url(&self, username: &str) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                AppError::Internal("entitlement gateway url cannot be a base".to_owned())
            })?
            .pop_if_empty()
            .extend(["api", "access", username]);
        Ok(url)
    }

    async fn send(
        &self,
        operation: &str,
        builder: reqwest::RequestBuilder,
    ) -> AppResult<Vec<GatewayIndicatorResult>> {
        let builder = match &self.api_key {
            Some(api_key) => builder.bearer_auth(api_key),
            None => builder,
        };

        let response = builder.send().await.map_err(|error| {
            if error.is_timeout() {
                AppError::Upstream(format!("entitlement gateway {operation} timed out: {error}"))
            } else {
                AppError::Upstream(format!(
                    "entitlement gateway {operation} transport error: {error}"
                ))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<response body unavailable>".to_owned());
            return Err(AppError::Upstream(format!(
                "entitlement gateway {operation} failed with status {status}: {body}"
            )));
        }

        let items: Vec<Value> = response.json().await.map_err(|error| {
            AppError::Upstream(format!(
                "entitlement gateway {operation} returned a malformed body: {error}"
            ))
        })?;

        let results = items
            .into_iter()
            .map(parse_result)
            .collect::<AppResult<Vec<_>>>()?;
        debug!(
            operation,
            results = results.len(),
            succeeded = results.iter().filter(|result| result.succeeded).count(),
            "entitlement gateway call finished"
        );

        Ok(results)
    }
}

fn parse_result(raw: Value) -> AppResult<GatewayIndicatorResult> {
    let body: IndicatorResultBody = serde_json::from_value(raw.clone()).map_err(|error| {
        AppError::Upstream(format!(
            "entitlement gateway returned a malformed result: {error}"
        ))
    })?;

    let expires_at = if body.no_expiration {
        None
    } else {
        body.expiration.as_deref().and_then(parse_expiration)
    };

    Ok(GatewayIndicatorResult {
        succeeded: body.status.eq_ignore_ascii_case("success"),
        pine_id: body.pine_id,
        expires_at,
        raw,
    })
}

fn parse_expiration(value: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(parsed) => Some(parsed.with_timezone(&Utc)),
        Err(error) => {
            warn!(value, error = %error, "ignoring unparseable gateway expiration");
            None
        }
    }
}

#[async_trait]
impl EntitlementGateway for HttpEntitlementGateway {
    async fn grant_access(
        &self,
        username: &str,
        pine_ids: &[String],
        duration: DurationType,
    ) -> AppResult<Vec<GatewayIndicatorResult>> {
        let url = self.access_url(username)?;
        let builder = self.http_client.post(url).json(&GrantRequestBody {
            pine_ids,
            duration: duration.as_str(),
        });

        self.send("grant", builder).await
    }

    async fn revoke_access(
        &self,
        username: &str,
        pine_ids: &[String],
    ) -> AppResult<Vec<GatewayIndicatorResult>> {
        let url = self.access_url(username)?;
        let builder = self
            .http_client
            .delete(url)
            .json(&RevokeRequestBody { pine_ids });

        self.send("revoke", builder).await
    }
}
