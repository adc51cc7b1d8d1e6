mod api;
mod mirror;
mod objects;

pub use api::{CheckoutLineItem, StripeApi};
pub use mirror::{PriceCatalog, PriceRecord, StripeMirrorRepository};
pub use objects::{
    StripeCheckoutSession, StripeCustomerDetails, StripeEvent, StripeEventData, StripeInvoice,
    StripeInvoiceLine, StripeList, StripePaymentIntent, StripePrice, StripePriceRef, StripeProduct,
    StripeRecurring, StripeSubscription, StripeSubscriptionItem,
};
