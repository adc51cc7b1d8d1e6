use async_trait::async_trait;
use pinegate_core::AppResult;

/// Product and price bought in a checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLineItem {
    /// Price id.
    pub price_id: String,
    /// Product id.
    pub product_id: String,
    /// `recurring.interval` of the price, `None` for one-time prices.
    pub recurring_interval: Option<String>,
}

/// Port for the few Stripe REST reads the webhook dispatcher needs.
#[async_trait]
pub trait StripeApi: Send + Sync {
    /// Lists the line items of a checkout session.
    async fn checkout_line_items(&self, session_id: &str) -> AppResult<Vec<CheckoutLineItem>>;

    /// Returns the email of a customer, `None` if the customer has none or was deleted.
    async fn customer_email(&self, customer_id: &str) -> AppResult<Option<String>>;
}
