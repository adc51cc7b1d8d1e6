use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pinegate_application::{
    PriceCatalog, PriceRecord, StripeCheckoutSession, StripeInvoice, StripeMirrorRepository,
    StripePaymentIntent, StripePrice, StripeProduct, StripeSubscription,
};
use pinegate_core::{AppError, AppResult};
use serde_json::Value;
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed mirror of Stripe catalog and billing objects.
#[derive(Clone)]
pub struct PostgresStripeMirrorRepository {
    pool: PgPool,
}

impl PostgresStripeMirrorRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PriceRow {
    id: String,
    product_id: String,
    recurring_interval: Option<String>,
    active: bool,
}

fn metadata_json(metadata: &HashMap<String, String>) -> AppResult<Value> {
    serde_json::to_value(metadata).map_err(|error| {
        AppError::Internal(format!("failed to encode stripe metadata: {error}"))
    })
}

fn unix_to_utc(value: Option<i64>) -> Option<DateTime<Utc>> {
    value.and_then(|seconds| DateTime::from_timestamp(seconds, 0))
}

#[async_trait]
impl StripeMirrorRepository for PostgresStripeMirrorRepository {
    async fn upsert_product(&self, product: &StripeProduct) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stripe_products (id, name, description, active, metadata)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                active = EXCLUDED.active,
                metadata = EXCLUDED.metadata,
                updated_at = now()
            "#,
        )
        .bind(product.id.as_str())
        .bind(product.name.as_deref())
        .bind(product.description.as_deref())
        .bind(product.active)
        .bind(metadata_json(&product.metadata)?)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to upsert stripe product '{}': {error}",
                product.id
            ))
        })?;

        Ok(())
    }

    async fn deactivate_product(&self, product_id: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stripe_products (id, active)
            VALUES ($1, FALSE)
            ON CONFLICT (id) DO UPDATE SET
                active = FALSE,
                updated_at = now()
            "#,
        )
        .bind(product_id)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to deactivate stripe product '{product_id}': {error}"
            ))
        })?;

        Ok(())
    }

    async fn upsert_price(&self, price: &StripePrice) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stripe_prices (
                id,
                product_id,
                active,
                currency,
                unit_amount,
                price_type,
                recurring_interval,
                recurring_interval_count
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                product_id = EXCLUDED.product_id,
                active = EXCLUDED.active,
                currency = EXCLUDED.currency,
                unit_amount = EXCLUDED.unit_amount,
                price_type = EXCLUDED.price_type,
                recurring_interval = EXCLUDED.recurring_interval,
                recurring_interval_count = EXCLUDED.recurring_interval_count,
                updated_at = now()
            "#,
        )
        .bind(price.id.as_str())
        .bind(price.product.as_str())
        .bind(price.active)
        .bind(price.currency.as_deref())
        .bind(price.unit_amount)
        .bind(price.price_type.as_deref())
        .bind(
            price
                .recurring
                .as_ref()
                .map(|recurring| recurring.interval.as_str()),
        )
        .bind(
            price
                .recurring
                .as_ref()
                .and_then(|recurring| recurring.interval_count),
        )
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to upsert stripe price '{}': {error}",
                price.id
            ))
        })?;

        Ok(())
    }

    async fn deactivate_price(&self, price_id: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE stripe_prices
            SET active = FALSE,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(price_id)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to deactivate stripe price '{price_id}': {error}"
            ))
        })?;

        Ok(())
    }

    async fn upsert_subscription(&self, subscription: &StripeSubscription) -> AppResult<()> {
        let price_ids: Vec<String> = subscription
            .items
            .data
            .iter()
            .map(|item| item.price.id.clone())
            .collect();

        sqlx::query(
            r#"
            INSERT INTO stripe_subscriptions (
                id,
                customer_id,
                status,
                price_ids,
                cancel_at_period_end,
                current_period_end,
                canceled_at,
                ended_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                customer_id = EXCLUDED.customer_id,
                status = EXCLUDED.status,
                price_ids = EXCLUDED.price_ids,
                cancel_at_period_end = EXCLUDED.cancel_at_period_end,
                current_period_end = EXCLUDED.current_period_end,
                canceled_at = EXCLUDED.canceled_at,
                ended_at = EXCLUDED.ended_at,
                updated_at = now()
            "#,
        )
        .bind(subscription.id.as_str())
        .bind(subscription.customer.as_str())
        .bind(subscription.status.as_str())
        .bind(price_ids)
        .bind(subscription.cancel_at_period_end)
        .bind(unix_to_utc(subscription.current_period_end))
        .bind(unix_to_utc(subscription.canceled_at))
        .bind(unix_to_utc(subscription.ended_at))
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to upsert stripe subscription '{}': {error}",
                subscription.id
            ))
        })?;

        Ok(())
    }

    async fn upsert_invoice(&self, invoice: &StripeInvoice) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stripe_invoices (
                id,
                customer_id,
                customer_email,
                subscription_id,
                status,
                billing_reason,
                amount_paid,
                amount_due,
                currency
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                customer_id = EXCLUDED.customer_id,
                customer_email = EXCLUDED.customer_email,
                subscription_id = EXCLUDED.subscription_id,
                status = EXCLUDED.status,
                billing_reason = EXCLUDED.billing_reason,
                amount_paid = EXCLUDED.amount_paid,
                amount_due = EXCLUDED.amount_due,
                currency = EXCLUDED.currency,
                updated_at = now()
            "#,
        )
        .bind(invoice.id.as_str())
        .bind(invoice.customer.as_deref())
        .bind(invoice.customer_email.as_deref())
        .bind(invoice.subscription.as_deref())
        .bind(invoice.status.as_deref())
        .bind(invoice.billing_reason.as_deref())
        .bind(invoice.amount_paid)
        .bind(invoice.amount_due)
        .bind(invoice.currency.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to upsert stripe invoice '{}': {error}",
                invoice.id
            ))
        })?;

        Ok(())
    }

    async fn upsert_payment_intent(&self, payment_intent: &StripePaymentIntent) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stripe_payment_intents (
                id,
                customer_id,
                amount,
                currency,
                status,
                receipt_email,
                metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                customer_id = EXCLUDED.customer_id,
                amount = EXCLUDED.amount,
                currency = EXCLUDED.currency,
                status = EXCLUDED.status,
                receipt_email = EXCLUDED.receipt_email,
                metadata = EXCLUDED.metadata,
                updated_at = now()
            "#,
        )
        .bind(payment_intent.id.as_str())
        .bind(payment_intent.customer.as_deref())
        .bind(payment_intent.amount)
        .bind(payment_intent.currency.as_deref())
        .bind(payment_intent.status.as_str())
        .bind(payment_intent.receipt_email.as_deref())
        .bind(metadata_json(&payment_intent.metadata)?)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to upsert stripe payment intent '{}': {error}",
                payment_intent.id
            ))
        })?;

        Ok(())
    }

    async fn upsert_checkout_purchase(
        &self,
        session: &StripeCheckoutSession,
        buyer_email: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO purchases (
                checkout_session_id,
                mode,
                payment_status,
                customer_id,
                customer_email,
                subscription_id,
                payment_intent_id,
                metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (checkout_session_id) DO UPDATE SET
                mode = EXCLUDED.mode,
                payment_status = EXCLUDED.payment_status,
                customer_id = EXCLUDED.customer_id,
                customer_email = EXCLUDED.customer_email,
                subscription_id = EXCLUDED.subscription_id,
                payment_intent_id = EXCLUDED.payment_intent_id,
                metadata = EXCLUDED.metadata,
                updated_at = now()
            "#,
        )
        .bind(session.id.as_str())
        .bind(session.mode.as_deref())
        .bind(session.payment_status.as_deref())
        .bind(session.customer.as_deref())
        .bind(buyer_email)
        .bind(session.subscription.as_deref())
        .bind(session.payment_intent.as_deref())
        .bind(metadata_json(&session.metadata)?)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to record checkout purchase '{}': {error}",
                session.id
            ))
        })?;

        Ok(())
    }
}

#[async_trait]
impl PriceCatalog for PostgresStripeMirrorRepository {
    async fn find_price(&self, price_id: &str) -> AppResult<Option<PriceRecord>> {
        let row = sqlx::query_as::<_, PriceRow>(
            r#"
            SELECT id, product_id, recurring_interval, active
            FROM stripe_prices
            WHERE id = $1
            "#,
        )
        .bind(price_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find stripe price '{price_id}': {error}"))
        })?;

        Ok(row.map(|row| PriceRecord {
            id: row.id,
            product_id: row.product_id,
            recurring_interval: row.recurring_interval,
            active: row.active,
        }))
    }
}
