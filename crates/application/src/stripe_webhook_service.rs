//! Stripe webhook dispatcher.
//!
//! Verifies the delivery signature, parses the event, drops event types
//! outside the allowlist and routes the rest to the Stripe mirrors and the
//! grant and revoke engines. Every mirror write is an upsert keyed by the
//! Stripe object id, so redeliveries after a failure are safe.

mod signature;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use pinegate_core::{AppError, AppResult};
use pinegate_domain::AccessSource;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

pub use signature::{DEFAULT_TOLERANCE_SECS, StripeSignatureVerifier};

use crate::{
    CancellationRevokeService, GrantOnPurchaseInput, PriceCadence, PurchaseGrantService,
    StripeApi, StripeCheckoutSession, StripeEvent, StripeInvoice, StripeMirrorRepository,
    StripePaymentIntent, StripePrice, StripeProduct, StripeSubscription,
};

/// Event types the dispatcher acts on. Everything else is acknowledged and ignored.
pub const HANDLED_EVENT_TYPES: &[&str] = &[
    "product.created",
    "product.updated",
    "product.deleted",
    "price.created",
    "price.updated",
    "price.deleted",
    "checkout.session.completed",
    "customer.subscription.created",
    "customer.subscription.updated",
    "customer.subscription.deleted",
    "invoice.payment_succeeded",
    "invoice.payment_failed",
    "payment_intent.succeeded",
    "payment_intent.payment_failed",
];

/// Revoke reason recorded when Stripe deletes a subscription.
pub const SUBSCRIPTION_DELETED_REASON: &str = "subscription_deleted";

/// Returns whether the dispatcher routes the event type.
#[must_use]
pub fn is_handled_event_type(event_type: &str) -> bool {
    HANDLED_EVENT_TYPES.contains(&event_type)
}

/// Acknowledgement for one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookOutcome {
    /// Stripe event id.
    pub event_id: String,
    /// Stripe event type.
    pub event_type: String,
    /// `false` when the type is outside the allowlist.
    pub handled: bool,
}

/// Application service behind the Stripe webhook endpoint.
#[derive(Clone)]
pub struct StripeWebhookService {
    verifier: StripeSignatureVerifier,
    mirror: Arc<dyn StripeMirrorRepository>,
    stripe: Arc<dyn StripeApi>,
    grants: PurchaseGrantService,
    revokes: CancellationRevokeService,
}

impl StripeWebhookService {
    /// Creates a webhook dispatcher.
    #[must_use]
    pub fn new(
        verifier: StripeSignatureVerifier,
        mirror: Arc<dyn StripeMirrorRepository>,
        stripe: Arc<dyn StripeApi>,
        grants: PurchaseGrantService,
        revokes: CancellationRevokeService,
    ) -> Self {
        Self {
            verifier,
            mirror,
            stripe,
            grants,
            revokes,
        }
    }

    /// Verifies, parses and dispatches one raw delivery.
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> AppResult<WebhookOutcome> {
        self.verifier
            .verify(payload, signature_header, Utc::now().timestamp())?;

        let event: StripeEvent = serde_json::from_slice(payload)
            .map_err(|error| AppError::Validation(format!("invalid stripe event: {error}")))?;

        self.dispatch(event).await
    }

    /// Routes an already verified event.
    pub async fn dispatch(&self, event: StripeEvent) -> AppResult<WebhookOutcome> {
        let outcome = WebhookOutcome {
            event_id: event.id.clone(),
            event_type: event.event_type.clone(),
            handled: is_handled_event_type(&event.event_type),
        };

        if !outcome.handled {
            info!(
                event_id = %event.id,
                event_type = %event.event_type,
                "ignoring unhandled stripe event"
            );
            return Ok(outcome);
        }

        let object = event.data.object;
        match event.event_type.as_str() {
            "product.created" | "product.updated" => {
                let product: StripeProduct = parse_object(&event.event_type, object)?;
                self.mirror.upsert_product(&product).await?;
            }
            "product.deleted" => {
                let product: StripeProduct = parse_object(&event.event_type, object)?;
                self.mirror.deactivate_product(&product.id).await?;
            }
            "price.created" | "price.updated" => {
                let price: StripePrice = parse_object(&event.event_type, object)?;
                self.mirror.upsert_price(&price).await?;
            }
            "price.deleted" => {
                let price: StripePrice = parse_object(&event.event_type, object)?;
                self.mirror.deactivate_price(&price.id).await?;
            }
            "checkout.session.completed" => {
                let session: StripeCheckoutSession = parse_object(&event.event_type, object)?;
                self.handle_checkout_completed(&event.id, session).await?;
            }
            "customer.subscription.created" | "customer.subscription.updated" => {
                let subscription: StripeSubscription = parse_object(&event.event_type, object)?;
                self.mirror.upsert_subscription(&subscription).await?;
            }
            "customer.subscription.deleted" => {
                let subscription: StripeSubscription = parse_object(&event.event_type, object)?;
                self.handle_subscription_deleted(&event.id, subscription)
                    .await?;
            }
            "invoice.payment_succeeded" | "invoice.payment_failed" => {
                let invoice: StripeInvoice = parse_object(&event.event_type, object)?;
                self.mirror.upsert_invoice(&invoice).await?;
                if event.event_type == "invoice.payment_succeeded" && invoice.is_renewal() {
                    self.handle_renewal(&event.id, invoice).await?;
                }
            }
            "payment_intent.succeeded" | "payment_intent.payment_failed" => {
                let payment_intent: StripePaymentIntent =
                    parse_object(&event.event_type, object)?;
                self.mirror.upsert_payment_intent(&payment_intent).await?;
            }
            _ => {}
        }

        info!(
            event_id = %outcome.event_id,
            event_type = %outcome.event_type,
            "stripe event handled"
        );

        Ok(outcome)
    }

    async fn handle_checkout_completed(
        &self,
        event_id: &str,
        session: StripeCheckoutSession,
    ) -> AppResult<()> {
        let buyer_email = session.buyer_email().map(str::to_owned);
        self.mirror
            .upsert_checkout_purchase(&session, buyer_email.as_deref())
            .await?;

        if !session.is_paid() {
            info!(
                event_id,
                session_id = %session.id,
                payment_status = session.payment_status.as_deref().unwrap_or("unknown"),
                "checkout completed without payment, not granting"
            );
            return Ok(());
        }

        let Some(customer_email) = buyer_email else {
            warn!(event_id, session_id = %session.id, "checkout session has no buyer email");
            return Ok(());
        };

        let line_items = self.stripe.checkout_line_items(&session.id).await?;
        let product_ids = unique(line_items.iter().map(|item| item.product_id.clone()));
        let price_id = line_items.first().map(|item| item.price_id.clone());
        let price_cadence = line_items
            .first()
            .map(|item| PriceCadence::from_interval(item.recurring_interval.as_deref()));
        if product_ids.is_empty() {
            warn!(event_id, session_id = %session.id, "checkout session has no line items");
            return Ok(());
        }

        let outcome = self
            .grants
            .grant_on_purchase(GrantOnPurchaseInput {
                customer_email,
                product_ids,
                price_id,
                price_cadence,
                purchase_id: session.subscription.clone().unwrap_or(session.id),
                source: AccessSource::Purchase,
            })
            .await?;

        if let Some(reason) = &outcome.reason {
            warn!(event_id, reason = %reason, "checkout grant did not run");
        }

        Ok(())
    }

    async fn handle_subscription_deleted(
        &self,
        event_id: &str,
        subscription: StripeSubscription,
    ) -> AppResult<()> {
        self.mirror.upsert_subscription(&subscription).await?;

        let customer_email = self.stripe.customer_email(&subscription.customer).await?;
        let Some(customer_email) = customer_email else {
            warn!(
                event_id,
                customer_id = %subscription.customer,
                "deleted subscription customer has no email"
            );
            return Ok(());
        };

        let outcome = self
            .revokes
            .revoke_on_cancellation(
                &customer_email,
                &subscription.id,
                SUBSCRIPTION_DELETED_REASON,
            )
            .await?;

        if let Some(reason) = &outcome.reason {
            warn!(event_id, reason = %reason, "cancellation revoke incomplete");
        }

        Ok(())
    }

    async fn handle_renewal(&self, event_id: &str, invoice: StripeInvoice) -> AppResult<()> {
        let customer_email = match (&invoice.customer_email, &invoice.customer) {
            (Some(email), _) => Some(email.clone()),
            (None, Some(customer_id)) => self.stripe.customer_email(customer_id).await?,
            (None, None) => None,
        };
        let Some(customer_email) = customer_email else {
            warn!(event_id, invoice_id = %invoice.id, "renewal invoice has no customer email");
            return Ok(());
        };

        let prices: Vec<_> = invoice
            .lines
            .data
            .iter()
            .filter_map(|line| line.price.as_ref())
            .collect();
        let product_ids = unique(prices.iter().map(|price| price.product.clone()));
        if product_ids.is_empty() {
            warn!(event_id, invoice_id = %invoice.id, "renewal invoice has no priced lines");
            return Ok(());
        }

        let outcome = self
            .grants
            .grant_on_purchase(GrantOnPurchaseInput {
                customer_email,
                product_ids,
                price_id: prices.first().map(|price| price.id.clone()),
                price_cadence: prices.first().map(|price| {
                    PriceCadence::from_interval(
                        price.recurring.as_ref().map(|recurring| recurring.interval.as_str()),
                    )
                }),
                purchase_id: invoice.subscription.clone().unwrap_or(invoice.id),
                source: AccessSource::Purchase,
            })
            .await?;

        if let Some(reason) = &outcome.reason {
            warn!(event_id, reason = %reason, "renewal grant did not run");
        }

        Ok(())
    }
}

fn parse_object<T: DeserializeOwned>(event_type: &str, object: Value) -> AppResult<T> {
    serde_json::from_value(object).map_err(|error| {
        AppError::Validation(format!("invalid '{event_type}' payload: {error}"))
    })
}

fn unique(values: impl Iterator<Item = String>) -> Vec<String> {
    values.collect::<BTreeSet<_>>().into_iter().collect()
}
