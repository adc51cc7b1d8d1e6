use std::time::Duration;

use async_trait::async_trait;
use pinegate_application::{CheckoutLineItem, StripeApi};
use pinegate_core::{AppError, AppResult};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

/// Largest page Stripe returns for list endpoints.
const LINE_ITEM_PAGE_LIMIT: &str = "100";

/// Read-only Stripe REST client used for webhook follow-up lookups.
#[derive(Clone)]
pub struct HttpStripeApi {
    http_client: reqwest::Client,
    base_url: Url,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct LineItemList {
    #[serde(default)]
    data: Vec<LineItemBody>,
}

#[derive(Debug, Deserialize)]
struct LineItemBody {
    price: Option<LineItemPrice>,
}

#[derive(Debug, Deserialize)]
struct LineItemPrice {
    id: String,
    product: String,
    #[serde(default)]
    recurring: Option<LineItemRecurring>,
}

#[derive(Debug, Deserialize)]
struct LineItemRecurring {
    interval: String,
}

#[derive(Debug, Deserialize)]
struct CustomerBody {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    deleted: bool,
}

impl HttpStripeApi {
    /// Creates a Stripe client authenticating with the account secret key.
    pub fn new(
        base_url: &str,
        secret_key: impl Into<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let base_url = Url::parse(base_url).map_err(|error| {
            AppError::Validation(format!("invalid stripe api url '{base_url}': {error}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Validation(format!(
                "stripe api url '{base_url}' cannot be used as a base"
            )));
        }

        let secret_key = secret_key.into();
        if secret_key.trim().is_empty() {
            return Err(AppError::Validation(
                "stripe secret key must not be empty".to_owned(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| {
                AppError::Internal(format!("failed to build stripe client: {error}"))
            })?;

        Ok(Self {
            http_client,
            base_url,
            secret_key,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| AppError::Internal("stripe api url cannot be a base".to_owned()))?
            .pop_if_empty()
            .push("v1")
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        builder: reqwest::RequestBuilder,
    ) -> AppResult<T> {
        let response = builder
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    AppError::Upstream(format!("stripe {operation} timed out: {error}"))
                } else {
                    AppError::Upstream(format!("stripe {operation} transport error: {error}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<response body unavailable>".to_owned());
            return Err(AppError::Upstream(format!(
                "stripe {operation} failed with status {status}: {body}"
            )));
        }

        response.json().await.map_err(|error| {
            AppError::Upstream(format!("stripe {operation} returned a malformed body: {error}"))
        })
    }
}

#[async_trait]
impl StripeApi for HttpStripeApi {
    async fn checkout_line_items(&self, session_id: &str) -> AppResult<Vec<CheckoutLineItem>> {
        let mut url = self.endpoint(&["checkout", "sessions", session_id, "line_items"])?;
        url.query_pairs_mut().append_pair("limit", LINE_ITEM_PAGE_LIMIT);
        let builder = self.http_client.get(url);
        let list: LineItemList = self.get_json("line item lookup", builder).await?;

        let items = list
            .data
            .into_iter()
            .filter_map(|item| item.price)
            .map(|price| CheckoutLineItem {
                price_id: price.id,
                product_id: price.product,
                recurring_interval: price.recurring.map(|recurring| recurring.interval),
            })
            .collect::<Vec<_>>();
        debug!(session_id, items = items.len(), "fetched checkout line items");

        Ok(items)
    }

    async fn customer_email(&self, customer_id: &str) -> AppResult<Option<String>> {
        let url = self.endpoint(&["customers", customer_id])?;
        let builder = self.http_client.get(url);
        let customer: CustomerBody = self.get_json("customer lookup", builder).await?;

        if customer.deleted {
            return Ok(None);
        }

        Ok(customer.email.filter(|email| !email.trim().is_empty()))
    }
}
