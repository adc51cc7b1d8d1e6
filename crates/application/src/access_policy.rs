use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use pinegate_core::AppResult;
use pinegate_domain::{AccessPolicy, DurationType, Indicator, IndicatorId};

use crate::{IndicatorCatalog, PriceCatalog};

/// Product to access policy table, injected from configuration.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicyTable {
    policies: HashMap<String, AccessPolicy>,
}

impl AccessPolicyTable {
    /// Creates a table from product id keyed policies.
    #[must_use]
    pub fn new(policies: HashMap<String, AccessPolicy>) -> Self {
        Self { policies }
    }

    /// Returns the policy for a product. Unmapped products get every active indicator.
    #[must_use]
    pub fn policy_for(&self, product_id: &str) -> AccessPolicy {
        self.policies
            .get(product_id)
            .cloned()
            .unwrap_or(AccessPolicy::All)
    }

    /// Returns the number of mapped products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Returns `true` when no product is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

/// Resolves the indicator set a purchase unlocks.
#[derive(Clone)]
pub struct AccessPolicyResolver {
    table: AccessPolicyTable,
    catalog: Arc<dyn IndicatorCatalog>,
}

impl AccessPolicyResolver {
    /// Creates a resolver over the live catalog.
    #[must_use]
    pub fn new(table: AccessPolicyTable, catalog: Arc<dyn IndicatorCatalog>) -> Self {
        Self { table, catalog }
    }

    /// Returns the union of the indicator sets of every product, ordered by id.
    ///
    /// The catalog is queried on every call so newly published indicators are
    /// picked up without a restart.
    pub async fn indicators_for_products(
        &self,
        product_ids: &[String],
    ) -> AppResult<Vec<Indicator>> {
        let mut resolved: BTreeMap<IndicatorId, Indicator> = BTreeMap::new();

        for product_id in product_ids {
            let indicators = match self.table.policy_for(product_id) {
                AccessPolicy::Specific(indicator_ids) => {
                    if indicator_ids.is_empty() {
                        Vec::new()
                    } else {
                        self.catalog.find_active_indicators(&indicator_ids).await?
                    }
                }
                policy => {
                    self.catalog
                        .list_active_indicators(policy.tier_filter())
                        .await?
                }
            };

            for indicator in indicators {
                resolved.entry(indicator.id()).or_insert(indicator);
            }
        }

        Ok(resolved.into_values().collect())
    }
}

/// Maps a purchased price to the entitlement duration.
#[derive(Clone)]
pub struct DurationPolicy {
    overrides: HashMap<String, DurationType>,
    prices: Arc<dyn PriceCatalog>,
}

impl DurationPolicy {
    /// Creates a policy backed by the mirrored price catalog.
    #[must_use]
    pub fn new(prices: Arc<dyn PriceCatalog>) -> Self {
        Self {
            overrides: HashMap::new(),
            prices,
        }
    }

    /// Adds per-price duration overrides.
    #[must_use]
    pub fn with_overrides(mut self, overrides: HashMap<String, DurationType>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Resolves the duration for an optional price id.
    ///
    /// Overrides win, then the mirrored recurring interval. Unknown prices and
    /// purchases without a price fall back to one year.
    pub async fn duration_for_price(&self, price_id: Option<&str>) -> AppResult<DurationType> {
        self.duration_for_purchase(price_id, None).await
    }

    /// Resolves the duration using the cadence carried by the triggering event.
    ///
    /// Order: per-price override, event cadence, mirrored price, one year.
    pub async fn duration_for_purchase(
        &self,
        price_id: Option<&str>,
        cadence: Option<&PriceCadence>,
    ) -> AppResult<DurationType> {
        if let Some(duration) = price_id.and_then(|price_id| self.overrides.get(price_id)) {
            return Ok(*duration);
        }

        if let Some(cadence) = cadence {
            return Ok(cadence.duration());
        }

        let Some(price_id) = price_id else {
            return Ok(DurationType::OneYear);
        };

        Ok(self
            .prices
            .find_price(price_id)
            .await?
            .map(|price| {
                DurationType::from_billing_interval(price.recurring_interval.as_deref())
            })
            .unwrap_or(DurationType::OneYear))
    }
}

/// Billing cadence of a purchased price as reported by Stripe with the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceCadence {
    /// One-time price.
    OneTime,
    /// Recurring price with its Stripe interval.
    Recurring(String),
}

impl PriceCadence {
    /// Builds a cadence from an optional `recurring.interval`.
    #[must_use]
    pub fn from_interval(interval: Option<&str>) -> Self {
        match interval {
            Some(interval) => Self::Recurring(interval.to_owned()),
            None => Self::OneTime,
        }
    }

    fn duration(&self) -> DurationType {
        match self {
            Self::OneTime => DurationType::from_billing_interval(None),
            Self::Recurring(interval) => DurationType::from_billing_interval(Some(interval)),
        }
    }
}
