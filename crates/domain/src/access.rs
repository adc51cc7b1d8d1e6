//! Indicator entitlement vocabulary: ledger status, duration, source and
//! operation codes, plus the product access policies.

use std::str::FromStr;

use chrono::{DateTime, Duration, Months, Utc};
use pinegate_core::AppError;
use serde::{Deserialize, Serialize};

use crate::IndicatorId;

/// Current state of one ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessStatus {
    /// Entitlement is live on the remote platform.
    Active,
    /// Entitlement was removed remotely and the removal was confirmed.
    Revoked,
    /// A remote call failed; the remote state is unknown and needs reconciliation.
    Failed,
}

impl AccessStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for AccessStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "revoked" => Ok(Self::Revoked),
            "failed" => Ok(Self::Failed),
            _ => Err(AppError::Validation(format!(
                "unknown access status '{value}'"
            ))),
        }
    }
}

/// Entitlement lifespan code understood by the remote platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DurationType {
    /// Seven days.
    #[serde(rename = "7D")]
    SevenDays,
    /// Thirty days.
    #[serde(rename = "30D")]
    ThirtyDays,
    /// One calendar year.
    #[serde(rename = "1Y")]
    OneYear,
    /// Lifetime access that never expires.
    #[serde(rename = "1L")]
    Lifetime,
}

impl DurationType {
    /// Returns the wire and storage code for this duration.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SevenDays => "7D",
            Self::ThirtyDays => "30D",
            Self::OneYear => "1Y",
            Self::Lifetime => "1L",
        }
    }

    /// Maps a Stripe price recurring interval to a duration.
    ///
    /// `None` means a one-time price and yields lifetime access. Intervals
    /// without a dedicated code fall back to one year.
    #[must_use]
    pub fn from_billing_interval(interval: Option<&str>) -> Self {
        match interval {
            None => Self::Lifetime,
            Some("week") => Self::SevenDays,
            Some("month") => Self::ThirtyDays,
            Some(_) => Self::OneYear,
        }
    }

    /// Computes the nominal expiration when counting from `now`.
    ///
    /// Only used when the remote platform does not report an expiration.
    /// Returns `None` for lifetime access.
    #[must_use]
    pub fn expires_at_from(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::SevenDays => now.checked_add_signed(Duration::days(7)),
            Self::ThirtyDays => now.checked_add_signed(Duration::days(30)),
            Self::OneYear => now.checked_add_months(Months::new(12)),
            Self::Lifetime => None,
        }
    }
}

impl FromStr for DurationType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "7D" => Ok(Self::SevenDays),
            "30D" => Ok(Self::ThirtyDays),
            "1Y" => Ok(Self::OneYear),
            "1L" => Ok(Self::Lifetime),
            _ => Err(AppError::Validation(format!(
                "unknown duration type '{value}', expected one of 7D, 30D, 1Y, 1L"
            ))),
        }
    }
}

/// How an entitlement came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessSource {
    /// Stripe purchase or subscription.
    Purchase,
    /// Single manual admin grant.
    Manual,
    /// Admin bulk operation.
    Bulk,
    /// Promotion code redemption.
    Promocode,
    /// Imported from a previous system.
    Migration,
}

impl AccessSource {
    /// Returns a stable storage value for this source.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Manual => "manual",
            Self::Bulk => "bulk",
            Self::Promocode => "promocode",
            Self::Migration => "migration",
        }
    }
}

impl FromStr for AccessSource {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "purchase" => Ok(Self::Purchase),
            "manual" => Ok(Self::Manual),
            "bulk" => Ok(Self::Bulk),
            "promocode" => Ok(Self::Promocode),
            "migration" => Ok(Self::Migration),
            _ => Err(AppError::Validation(format!(
                "unknown access source '{value}'"
            ))),
        }
    }
}

/// Operation recorded in the append-only access log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// First grant for a user and indicator pair.
    Grant,
    /// Grant over an existing ledger row.
    Renew,
    /// Confirmed removal.
    Revoke,
}

impl OperationType {
    /// Returns a stable storage value for this operation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grant => "grant",
            Self::Renew => "renew",
            Self::Revoke => "revoke",
        }
    }
}

impl FromStr for OperationType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "grant" => Ok(Self::Grant),
            "renew" => Ok(Self::Renew),
            "revoke" => Ok(Self::Revoke),
            _ => Err(AppError::Validation(format!(
                "unknown operation type '{value}'"
            ))),
        }
    }
}

/// Pricing tier of an indicator in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessTier {
    /// Available without a paid plan.
    Free,
    /// Requires a paid plan.
    Premium,
}

impl AccessTier {
    /// Returns a stable storage value for this tier.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
        }
    }
}

impl FromStr for AccessTier {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "free" => Ok(Self::Free),
            "premium" => Ok(Self::Premium),
            _ => Err(AppError::Validation(format!(
                "unknown access tier '{value}'"
            ))),
        }
    }
}

/// Rule mapping a purchased product to a set of indicators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPolicy {
    /// Every active indicator.
    All,
    /// Active premium indicators.
    Premium,
    /// Active free indicators.
    Free,
    /// An explicit indicator list.
    Specific(Vec<IndicatorId>),
}

impl AccessPolicy {
    /// Returns the catalog tier filter for tier-based policies.
    ///
    /// `None` means no tier filter; callers must handle `Specific` separately.
    #[must_use]
    pub fn tier_filter(&self) -> Option<AccessTier> {
        match self {
            Self::Premium => Some(AccessTier::Premium),
            Self::Free => Some(AccessTier::Free),
            Self::All | Self::Specific(_) => None,
        }
    }
}
