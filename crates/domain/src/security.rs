use std::str::FromStr;

use pinegate_core::AppError;
use serde::{Deserialize, Serialize};

/// Admin permissions enforced by application policy checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Allows reading the indicator access ledger.
    IndicatorAccessRead,
    /// Allows bulk grant and revoke operations.
    IndicatorAccessBulkManage,
}

impl Permission {
    /// Returns a stable storage value for this permission.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IndicatorAccessRead => "indicator_access.read",
            Self::IndicatorAccessBulkManage => "indicator_access.bulk_manage",
        }
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "indicator_access.read" => Ok(Self::IndicatorAccessRead),
            "indicator_access.bulk_manage" => Ok(Self::IndicatorAccessBulkManage),
            _ => Err(AppError::Validation(format!(
                "unknown permission value '{value}'"
            ))),
        }
    }
}

/// Stable activity kinds shown in the customer activity feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Emitted when a subscription cancellation ends paid access.
    SubscriptionCancelled,
}

impl ActivityKind {
    /// Returns a stable storage value for this activity.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubscriptionCancelled => "subscription_cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::Permission;

    #[test]
    fn permission_roundtrip_storage_value() {
        let permission = Permission::IndicatorAccessBulkManage;
        let restored = Permission::from_str(permission.as_str());
        assert_eq!(restored.ok(), Some(permission));
    }

    #[test]
    fn unknown_permission_is_rejected() {
        let parsed = Permission::from_str("indicator_access.delete");
        assert!(parsed.is_err());
    }
}
