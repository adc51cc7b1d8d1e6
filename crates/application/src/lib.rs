//! Application services and ports.

#![forbid(unsafe_code)]

mod access_outcome;
mod access_policy;
mod access_ports;
mod authorization_service;
mod bulk_access_service;
mod grant_service;
mod reconciliation_service;
mod revoke_service;
mod stripe_ports;
mod stripe_webhook_service;

#[cfg(test)]
mod test_support;

pub use access_outcome::{IndicatorError, OutcomeReason};
pub use access_policy::{AccessPolicyResolver, AccessPolicyTable, DurationPolicy, PriceCadence};
pub use access_ports::{
    AccessWithIndicator, ActivityRecord, ActivityRepository, EntitlementGateway,
    GatewayIndicatorResult, IndicatorAccess, IndicatorAccessRepository, IndicatorCatalog,
    MarkRevokedInput, NewAccessLogEntry, UpsertIndicatorAccessInput, UpsertedAccess,
    UserDirectory,
};
pub use authorization_service::{AdminPermissionRepository, AuthorizationService};
pub use bulk_access_service::{
    BulkAccessRequest, BulkAccessService, BulkAccessSummary, BulkOperationType, BulkPairResult,
};
pub use grant_service::{GrantOnPurchaseInput, GrantOutcome, PurchaseGrantService};
pub use reconciliation_service::{AccessReconciliationService, ReconciliationReport};
pub use revoke_service::{CancellationRevokeService, RevokeOutcome};
pub use stripe_ports::{
    CheckoutLineItem, PriceCatalog, PriceRecord, StripeApi, StripeCheckoutSession,
    StripeCustomerDetails, StripeEvent, StripeEventData, StripeInvoice, StripeInvoiceLine,
    StripeList, StripeMirrorRepository, StripePaymentIntent, StripePrice, StripePriceRef,
    StripeProduct, StripeRecurring, StripeSubscription, StripeSubscriptionItem,
};
pub use stripe_webhook_service::{
    DEFAULT_TOLERANCE_SECS, HANDLED_EVENT_TYPES, SUBSCRIPTION_DELETED_REASON,
    StripeSignatureVerifier, StripeWebhookService, WebhookOutcome, is_handled_event_type,
};
