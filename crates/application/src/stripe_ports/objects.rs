//! Typed views over the Stripe objects carried by webhook events.
//!
//! Only the fields the dispatcher and mirrors read are modeled; everything
//! else in the payload is ignored.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

/// Webhook event envelope. `data.object` is parsed per event type.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    /// Event id (`evt_...`).
    pub id: String,
    /// Event type such as `checkout.session.completed`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload.
    pub data: StripeEventData,
}

/// Event payload wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    /// The Stripe object the event is about.
    pub object: Value,
}

/// Stripe list envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    /// Page of items.
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> Default for StripeList<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

/// `product` object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeProduct {
    /// Product id (`prod_...`).
    pub id: String,
    /// Whether the product can be purchased.
    #[serde(default)]
    pub active: bool,
    /// Display name.
    pub name: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Recurring part of a price.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeRecurring {
    /// `day`, `week`, `month` or `year`.
    pub interval: String,
    /// Number of intervals between billings.
    pub interval_count: Option<i64>,
}

/// `price` object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripePrice {
    /// Price id (`price_...`).
    pub id: String,
    /// Owning product id.
    pub product: String,
    /// Whether the price can be used for new purchases.
    #[serde(default)]
    pub active: bool,
    /// Three-letter currency code.
    pub currency: Option<String>,
    /// Amount in the smallest currency unit.
    pub unit_amount: Option<i64>,
    /// `one_time` or `recurring`.
    #[serde(rename = "type")]
    pub price_type: Option<String>,
    /// Billing cadence for recurring prices.
    pub recurring: Option<StripeRecurring>,
}

/// Compact price reference embedded in line items.
#[derive(Debug, Clone, Deserialize)]
pub struct StripePriceRef {
    /// Price id.
    pub id: String,
    /// Owning product id.
    pub product: String,
    /// Billing cadence for recurring prices.
    pub recurring: Option<StripeRecurring>,
}

/// Customer details captured by checkout.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StripeCustomerDetails {
    /// Email entered during checkout.
    pub email: Option<String>,
}

/// `checkout.session` object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeCheckoutSession {
    /// Session id (`cs_...`).
    pub id: String,
    /// `payment`, `subscription` or `setup`.
    pub mode: Option<String>,
    /// `paid`, `unpaid` or `no_payment_required`.
    pub payment_status: Option<String>,
    /// Customer id.
    pub customer: Option<String>,
    /// Email passed when the session was created.
    pub customer_email: Option<String>,
    /// Details collected during checkout.
    pub customer_details: Option<StripeCustomerDetails>,
    /// Subscription id in subscription mode.
    pub subscription: Option<String>,
    /// Payment intent id in payment mode.
    pub payment_intent: Option<String>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripeCheckoutSession {
    /// Returns the best known buyer email.
    #[must_use]
    pub fn buyer_email(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|details| details.email.as_deref())
            .or(self.customer_email.as_deref())
    }

    /// Returns `true` when funds were captured or none were required.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        matches!(
            self.payment_status.as_deref(),
            Some("paid") | Some("no_payment_required")
        )
    }
}

/// Subscription item.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscriptionItem {
    /// Subscribed price.
    pub price: StripePriceRef,
}

/// `subscription` object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    /// Subscription id (`sub_...`).
    pub id: String,
    /// Customer id.
    pub customer: String,
    /// Lifecycle status.
    pub status: String,
    /// Subscribed items.
    #[serde(default)]
    pub items: StripeList<StripeSubscriptionItem>,
    /// Whether the subscription ends at period end.
    #[serde(default)]
    pub cancel_at_period_end: bool,
    /// Unix timestamp of the current period end.
    pub current_period_end: Option<i64>,
    /// Unix timestamp of cancellation.
    pub canceled_at: Option<i64>,
    /// Unix timestamp when the subscription ended.
    pub ended_at: Option<i64>,
}

/// Invoice line.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoiceLine {
    /// Billed price, absent for ad-hoc items.
    pub price: Option<StripePriceRef>,
}

/// `invoice` object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoice {
    /// Invoice id (`in_...`).
    pub id: String,
    /// Customer id.
    pub customer: Option<String>,
    /// Customer email snapshot.
    pub customer_email: Option<String>,
    /// Subscription the invoice belongs to.
    pub subscription: Option<String>,
    /// `draft`, `open`, `paid`, `uncollectible` or `void`.
    pub status: Option<String>,
    /// Why the invoice was created, e.g. `subscription_cycle`.
    pub billing_reason: Option<String>,
    /// Amount paid in the smallest currency unit.
    pub amount_paid: Option<i64>,
    /// Amount due in the smallest currency unit.
    pub amount_due: Option<i64>,
    /// Three-letter currency code.
    pub currency: Option<String>,
    /// Invoice lines.
    #[serde(default)]
    pub lines: StripeList<StripeInvoiceLine>,
}

impl StripeInvoice {
    /// Returns `true` for invoices issued by a renewal cycle.
    #[must_use]
    pub fn is_renewal(&self) -> bool {
        self.billing_reason.as_deref() == Some("subscription_cycle")
    }
}

/// `payment_intent` object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripePaymentIntent {
    /// Payment intent id (`pi_...`).
    pub id: String,
    /// Customer id.
    pub customer: Option<String>,
    /// Amount in the smallest currency unit.
    #[serde(default)]
    pub amount: i64,
    /// Three-letter currency code.
    pub currency: Option<String>,
    /// Lifecycle status.
    pub status: String,
    /// Receipt email.
    pub receipt_email: Option<String>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}
