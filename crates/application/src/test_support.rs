//! Hand-written fakes shared by the service test modules.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pinegate_core::{AppError, AppResult};
use pinegate_domain::{
    AccessSource, AccessStatus, AccessTier, DurationType, EmailAddress, Indicator, IndicatorId,
    Permission, PlatformUser, UserId,
};
use serde_json::json;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    AccessWithIndicator, ActivityRecord, ActivityRepository, AdminPermissionRepository,
    CheckoutLineItem, EntitlementGateway, GatewayIndicatorResult, IndicatorAccess,
    IndicatorAccessRepository, IndicatorCatalog, MarkRevokedInput, NewAccessLogEntry, PriceCatalog,
    PriceRecord, StripeApi, StripeCheckoutSession, StripeInvoice, StripeMirrorRepository,
    StripePaymentIntent, StripePrice, StripeProduct, StripeSubscription,
    UpsertIndicatorAccessInput, UpsertedAccess, UserDirectory,
};

pub(crate) fn indicator(name: &str, pine_id: &str, tier: AccessTier) -> Indicator {
    match Indicator::new(IndicatorId::new(), name, pine_id, tier) {
        Ok(indicator) => indicator,
        Err(error) => panic!("test indicator should be valid: {error}"),
    }
}

pub(crate) fn user(email: &str, username: Option<&str>) -> PlatformUser {
    match EmailAddress::new(email) {
        Ok(email) => PlatformUser::new(UserId::new(), email, username.map(str::to_owned)),
        Err(error) => panic!("test email should be valid: {error}"),
    }
}

#[derive(Default)]
pub(crate) struct FakeUserDirectory {
    users: Vec<PlatformUser>,
}

impl FakeUserDirectory {
    pub(crate) fn with(users: Vec<PlatformUser>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl UserDirectory for FakeUserDirectory {
    async fn find_user_by_email(&self, email: &EmailAddress) -> AppResult<Option<PlatformUser>> {
        Ok(self
            .users
            .iter()
            .find(|user| user.email() == email)
            .cloned())
    }

    async fn find_users_by_ids(&self, user_ids: &[UserId]) -> AppResult<Vec<PlatformUser>> {
        Ok(self
            .users
            .iter()
            .filter(|user| user_ids.contains(&user.id()))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct FakeIndicatorCatalog {
    indicators: Mutex<Vec<Indicator>>,
}

impl FakeIndicatorCatalog {
    pub(crate) fn with(indicators: Vec<Indicator>) -> Self {
        Self {
            indicators: Mutex::new(indicators),
        }
    }

    pub(crate) async fn publish(&self, indicator: Indicator) {
        self.indicators.lock().await.push(indicator);
    }
}

#[async_trait]
impl IndicatorCatalog for FakeIndicatorCatalog {
    async fn list_active_indicators(&self, tier: Option<AccessTier>) -> AppResult<Vec<Indicator>> {
        Ok(self
            .indicators
            .lock()
            .await
            .iter()
            .filter(|indicator| tier.is_none_or(|tier| indicator.access_tier() == tier))
            .cloned()
            .collect())
    }

    async fn find_active_indicators(
        &self,
        indicator_ids: &[IndicatorId],
    ) -> AppResult<Vec<Indicator>> {
        Ok(self
            .indicators
            .lock()
            .await
            .iter()
            .filter(|indicator| indicator_ids.contains(&indicator.id()))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct FakePriceCatalog {
    prices: HashMap<String, PriceRecord>,
}

impl FakePriceCatalog {
    pub(crate) fn with(prices: Vec<(&str, Option<&str>)>) -> Self {
        Self {
            prices: prices
                .into_iter()
                .map(|(id, interval)| {
                    (
                        id.to_owned(),
                        PriceRecord {
                            id: id.to_owned(),
                            product_id: "prod_test".to_owned(),
                            recurring_interval: interval.map(str::to_owned),
                            active: true,
                        },
                    )
                })
                .collect(),
        }
    }
}

#[async_trait]
impl PriceCatalog for FakePriceCatalog {
    async fn find_price(&self, price_id: &str) -> AppResult<Option<PriceRecord>> {
        Ok(self.prices.get(price_id).cloned())
    }
}

/// In-memory ledger keyed by the user and indicator pair.
#[derive(Default)]
pub(crate) struct FakeLedger {
    indicators: Vec<Indicator>,
    rows: Mutex<Vec<IndicatorAccess>>,
    logs: Mutex<Vec<NewAccessLogEntry>>,
    fail_batch: bool,
    failing_upserts: HashSet<IndicatorId>,
}

impl FakeLedger {
    pub(crate) fn with_indicators(indicators: Vec<Indicator>) -> Self {
        Self {
            indicators,
            ..Self::default()
        }
    }

    pub(crate) fn failing_batch(mut self) -> Self {
        self.fail_batch = true;
        self
    }

    pub(crate) fn failing_upsert_for(mut self, indicator_id: IndicatorId) -> Self {
        self.failing_upserts.insert(indicator_id);
        self
    }

    pub(crate) async fn seed(&self, access: IndicatorAccess) {
        self.rows.lock().await.push(access);
    }

    pub(crate) async fn rows(&self) -> Vec<IndicatorAccess> {
        self.rows.lock().await.clone()
    }

    pub(crate) async fn logs(&self) -> Vec<NewAccessLogEntry> {
        self.logs.lock().await.clone()
    }

    fn join(&self, access: IndicatorAccess) -> Option<AccessWithIndicator> {
        self.indicators
            .iter()
            .find(|indicator| indicator.id() == access.indicator_id)
            .cloned()
            .map(|indicator| AccessWithIndicator { access, indicator })
    }

    fn apply_upsert(
        rows: &mut Vec<IndicatorAccess>,
        input: UpsertIndicatorAccessInput,
    ) -> UpsertedAccess {
        if let Some(row) = rows
            .iter_mut()
            .find(|row| row.user_id == input.user_id && row.indicator_id == input.indicator_id)
        {
            row.tradingview_username = input.tradingview_username;
            row.status = AccessStatus::Active;
            row.granted_at = input.granted_at;
            row.expires_at = input.expires_at;
            row.revoked_at = None;
            row.revoked_by = None;
            row.duration_type = input.duration_type;
            row.access_source = input.access_source;
            row.granted_by = input.granted_by;
            row.tradingview_response = input.tradingview_response;
            row.notes = input.notes;
            return UpsertedAccess {
                access: row.clone(),
                previously_existed: true,
            };
        }

        let access = IndicatorAccess {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            indicator_id: input.indicator_id,
            tradingview_username: input.tradingview_username,
            status: AccessStatus::Active,
            granted_at: input.granted_at,
            expires_at: input.expires_at,
            revoked_at: None,
            duration_type: input.duration_type,
            access_source: input.access_source,
            granted_by: input.granted_by,
            revoked_by: None,
            tradingview_response: input.tradingview_response,
            notes: input.notes,
        };
        rows.push(access.clone());
        UpsertedAccess {
            access,
            previously_existed: false,
        }
    }
}

#[async_trait]
impl IndicatorAccessRepository for FakeLedger {
    async fn find_access(
        &self,
        user_id: UserId,
        indicator_id: IndicatorId,
    ) -> AppResult<Option<IndicatorAccess>> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .find(|row| row.user_id == user_id && row.indicator_id == indicator_id)
            .cloned())
    }

    async fn list_active_access_for_user(
        &self,
        user_id: UserId,
        tier: Option<AccessTier>,
    ) -> AppResult<Vec<AccessWithIndicator>> {
        let rows = self.rows.lock().await.clone();
        Ok(rows
            .into_iter()
            .filter(|row| row.user_id == user_id && row.status == AccessStatus::Active)
            .filter_map(|row| self.join(row))
            .filter(|joined| tier.is_none_or(|tier| joined.indicator.access_tier() == tier))
            .collect())
    }

    async fn list_failed_access(&self, limit: usize) -> AppResult<Vec<AccessWithIndicator>> {
        let rows = self.rows.lock().await.clone();
        Ok(rows
            .into_iter()
            .filter(|row| row.status == AccessStatus::Failed)
            .filter_map(|row| self.join(row))
            .take(limit)
            .collect())
    }

    async fn upsert_access(&self, input: UpsertIndicatorAccessInput) -> AppResult<UpsertedAccess> {
        if self.failing_upserts.contains(&input.indicator_id) {
            return Err(AppError::Internal(format!(
                "failed to upsert access for indicator '{}'",
                input.indicator_id
            )));
        }

        let mut rows = self.rows.lock().await;
        Ok(Self::apply_upsert(&mut rows, input))
    }

    async fn upsert_access_batch(
        &self,
        inputs: Vec<UpsertIndicatorAccessInput>,
    ) -> AppResult<Vec<UpsertedAccess>> {
        if self.fail_batch
            || inputs
                .iter()
                .any(|input| self.failing_upserts.contains(&input.indicator_id))
        {
            return Err(AppError::Internal(
                "failed to upsert access batch".to_owned(),
            ));
        }

        let mut rows = self.rows.lock().await;
        Ok(inputs
            .into_iter()
            .map(|input| Self::apply_upsert(&mut rows, input))
            .collect())
    }

    async fn mark_revoked(&self, input: MarkRevokedInput) -> AppResult<()> {
        let mut rows = self.rows.lock().await;
        let Some(row) = rows.iter_mut().find(|row| row.id == input.access_id) else {
            return Err(AppError::NotFound(format!(
                "indicator access '{}' does not exist",
                input.access_id
            )));
        };
        row.status = AccessStatus::Revoked;
        row.revoked_at = Some(input.revoked_at);
        row.revoked_by = input.revoked_by;
        Ok(())
    }

    async fn mark_failed(&self, access_ids: &[Uuid]) -> AppResult<()> {
        let mut rows = self.rows.lock().await;
        // Touched rows move to the back, mirroring `ORDER BY updated_at`.
        let (mut touched, rest): (Vec<_>, Vec<_>) = rows
            .drain(..)
            .partition(|row| access_ids.contains(&row.id));
        for row in &mut touched {
            row.status = AccessStatus::Failed;
        }
        rows.extend(rest);
        rows.extend(touched);
        Ok(())
    }

    async fn append_log(&self, entry: NewAccessLogEntry) -> AppResult<()> {
        self.logs.lock().await.push(entry);
        Ok(())
    }
}

pub(crate) fn active_access(
    user: &PlatformUser,
    indicator: &Indicator,
    duration_type: DurationType,
) -> IndicatorAccess {
    let granted_at = Utc::now();
    IndicatorAccess {
        id: Uuid::new_v4(),
        user_id: user.id(),
        indicator_id: indicator.id(),
        tradingview_username: user.tradingview_username().unwrap_or("unknown").to_owned(),
        status: AccessStatus::Active,
        granted_at,
        expires_at: duration_type.expires_at_from(granted_at),
        revoked_at: None,
        duration_type,
        access_source: AccessSource::Purchase,
        granted_by: None,
        revoked_by: None,
        tradingview_response: None,
        notes: None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum GatewayCallKind {
    Grant(DurationType),
    Revoke,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GatewayCall {
    pub(crate) kind: GatewayCallKind,
    pub(crate) username: String,
    pub(crate) pine_ids: Vec<String>,
}

/// Scripted remote platform.
#[derive(Default)]
pub(crate) struct FakeGateway {
    calls: Mutex<Vec<GatewayCall>>,
    rejected: HashSet<(String, String)>,
    unreachable_for: HashSet<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl FakeGateway {
    /// Rejects the pine id for the username inside an otherwise successful call.
    pub(crate) fn rejecting(mut self, username: &str, pine_id: &str) -> Self {
        self.rejected
            .insert((username.to_owned(), pine_id.to_owned()));
        self
    }

    /// Fails every call for the username as a transport error.
    pub(crate) fn unreachable_for(mut self, username: &str) -> Self {
        self.unreachable_for.insert(username.to_owned());
        self
    }

    pub(crate) fn reporting_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub(crate) async fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().await.clone()
    }

    async fn respond(
        &self,
        kind: GatewayCallKind,
        username: &str,
        pine_ids: &[String],
    ) -> AppResult<Vec<GatewayIndicatorResult>> {
        self.calls.lock().await.push(GatewayCall {
            kind: kind.clone(),
            username: username.to_owned(),
            pine_ids: pine_ids.to_vec(),
        });

        if self.unreachable_for.contains(username) {
            return Err(AppError::Upstream(
                "entitlement gateway request timed out".to_owned(),
            ));
        }

        Ok(pine_ids
            .iter()
            .map(|pine_id| {
                let succeeded = !self
                    .rejected
                    .contains(&(username.to_owned(), pine_id.clone()));
                let expires_at = match kind {
                    GatewayCallKind::Grant(_) if succeeded => self.expires_at,
                    _ => None,
                };
                GatewayIndicatorResult {
                    pine_id: pine_id.clone(),
                    succeeded,
                    expires_at,
                    raw: json!({
                        "pine_id": pine_id,
                        "status": if succeeded { "Success" } else { "Failure" },
                    }),
                }
            })
            .collect())
    }
}

#[async_trait]
impl EntitlementGateway for FakeGateway {
    async fn grant_access(
        &self,
        username: &str,
        pine_ids: &[String],
        duration: DurationType,
    ) -> AppResult<Vec<GatewayIndicatorResult>> {
        self.respond(GatewayCallKind::Grant(duration), username, pine_ids)
            .await
    }

    async fn revoke_access(
        &self,
        username: &str,
        pine_ids: &[String],
    ) -> AppResult<Vec<GatewayIndicatorResult>> {
        self.respond(GatewayCallKind::Revoke, username, pine_ids)
            .await
    }
}

#[derive(Default)]
pub(crate) struct FakeActivityRepository {
    records: Mutex<Vec<ActivityRecord>>,
    failing: bool,
}

impl FakeActivityRepository {
    pub(crate) fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub(crate) async fn records(&self) -> Vec<ActivityRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl ActivityRepository for FakeActivityRepository {
    async fn record_activity(&self, record: ActivityRecord) -> AppResult<()> {
        if self.failing {
            return Err(AppError::Internal(
                "failed to record activity".to_owned(),
            ));
        }

        self.records.lock().await.push(record);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeAdminPermissionRepository {
    grants: HashMap<UserId, Vec<Permission>>,
}

impl FakeAdminPermissionRepository {
    pub(crate) fn granting(user_id: UserId, permissions: Vec<Permission>) -> Self {
        Self {
            grants: HashMap::from([(user_id, permissions)]),
        }
    }
}

#[async_trait]
impl AdminPermissionRepository for FakeAdminPermissionRepository {
    async fn list_permissions_for_user(&self, user_id: UserId) -> AppResult<Vec<Permission>> {
        Ok(self.grants.get(&user_id).cloned().unwrap_or_default())
    }
}

/// Records every mirror write as `"<kind>:<id>"`.
#[derive(Default)]
pub(crate) struct FakeStripeMirror {
    writes: Mutex<Vec<String>>,
}

impl FakeStripeMirror {
    pub(crate) async fn writes(&self) -> Vec<String> {
        self.writes.lock().await.clone()
    }

    async fn push(&self, write: String) -> AppResult<()> {
        self.writes.lock().await.push(write);
        Ok(())
    }
}

#[async_trait]
impl StripeMirrorRepository for FakeStripeMirror {
    async fn upsert_product(&self, product: &StripeProduct) -> AppResult<()> {
        self.push(format!("product:{}", product.id)).await
    }

    async fn deactivate_product(&self, product_id: &str) -> AppResult<()> {
        self.push(format!("product_inactive:{product_id}")).await
    }

    async fn upsert_price(&self, price: &StripePrice) -> AppResult<()> {
        self.push(format!("price:{}", price.id)).await
    }

    async fn deactivate_price(&self, price_id: &str) -> AppResult<()> {
        self.push(format!("price_inactive:{price_id}")).await
    }

    async fn upsert_subscription(&self, subscription: &StripeSubscription) -> AppResult<()> {
        self.push(format!("subscription:{}", subscription.id)).await
    }

    async fn upsert_invoice(&self, invoice: &StripeInvoice) -> AppResult<()> {
        self.push(format!("invoice:{}", invoice.id)).await
    }

    async fn upsert_payment_intent(&self, payment_intent: &StripePaymentIntent) -> AppResult<()> {
        self.push(format!("payment_intent:{}", payment_intent.id))
            .await
    }

    async fn upsert_checkout_purchase(
        &self,
        session: &StripeCheckoutSession,
        _buyer_email: Option<&str>,
    ) -> AppResult<()> {
        self.push(format!("purchase:{}", session.id)).await
    }
}

#[derive(Default)]
pub(crate) struct FakeStripeApi {
    line_items: HashMap<String, Vec<CheckoutLineItem>>,
    customer_emails: HashMap<String, String>,
}

impl FakeStripeApi {
    pub(crate) fn with_line_items(
        mut self,
        session_id: &str,
        items: Vec<(&str, &str, Option<&str>)>,
    ) -> Self {
        self.line_items.insert(
            session_id.to_owned(),
            items
                .into_iter()
                .map(|(price_id, product_id, interval)| CheckoutLineItem {
                    price_id: price_id.to_owned(),
                    product_id: product_id.to_owned(),
                    recurring_interval: interval.map(str::to_owned),
                })
                .collect(),
        );
        self
    }

    pub(crate) fn with_customer(mut self, customer_id: &str, email: &str) -> Self {
        self.customer_emails
            .insert(customer_id.to_owned(), email.to_owned());
        self
    }
}

#[async_trait]
impl StripeApi for FakeStripeApi {
    async fn checkout_line_items(&self, session_id: &str) -> AppResult<Vec<CheckoutLineItem>> {
        self.line_items.get(session_id).cloned().ok_or_else(|| {
            AppError::Upstream(format!("checkout session '{session_id}' not found"))
        })
    }

    async fn customer_email(&self, customer_id: &str) -> AppResult<Option<String>> {
        Ok(self.customer_emails.get(customer_id).cloned())
    }
}
