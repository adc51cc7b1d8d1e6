//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod access;
mod indicator;
mod security;
mod user;

pub use access::{
    AccessPolicy, AccessSource, AccessStatus, AccessTier, DurationType, OperationType,
};
pub use indicator::{Indicator, IndicatorId};
pub use security::{ActivityKind, Permission};
pub use user::{EmailAddress, PlatformUser, UserId};
