use async_trait::async_trait;
use pinegate_core::AppResult;

use super::objects::{
    StripeCheckoutSession, StripeInvoice, StripePaymentIntent, StripePrice, StripeProduct,
    StripeSubscription,
};

/// Mirrored price row used to resolve entitlement durations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceRecord {
    /// Price id.
    pub id: String,
    /// Owning product id.
    pub product_id: String,
    /// Recurring interval, `None` for one-time prices.
    pub recurring_interval: Option<String>,
    /// Whether the price is active.
    pub active: bool,
}

/// Read port for mirrored prices.
#[async_trait]
pub trait PriceCatalog: Send + Sync {
    /// Returns a mirrored price by id.
    async fn find_price(&self, price_id: &str) -> AppResult<Option<PriceRecord>>;
}

/// Write port for the Stripe object mirrors. Every write is an upsert keyed
/// by the Stripe object id so redelivered events are harmless.
#[async_trait]
pub trait StripeMirrorRepository: Send + Sync {
    /// Upserts a product.
    async fn upsert_product(&self, product: &StripeProduct) -> AppResult<()>;

    /// Marks a product inactive.
    async fn deactivate_product(&self, product_id: &str) -> AppResult<()>;

    /// Upserts a price.
    async fn upsert_price(&self, price: &StripePrice) -> AppResult<()>;

    /// Marks a price inactive.
    async fn deactivate_price(&self, price_id: &str) -> AppResult<()>;

    /// Upserts a subscription.
    async fn upsert_subscription(&self, subscription: &StripeSubscription) -> AppResult<()>;

    /// Upserts an invoice.
    async fn upsert_invoice(&self, invoice: &StripeInvoice) -> AppResult<()>;

    /// Upserts a payment intent.
    async fn upsert_payment_intent(&self, payment_intent: &StripePaymentIntent) -> AppResult<()>;

    /// Records a completed checkout as a purchase.
    async fn upsert_checkout_purchase(
        &self,
        session: &StripeCheckoutSession,
        buyer_email: Option<&str>,
    ) -> AppResult<()>;
}
