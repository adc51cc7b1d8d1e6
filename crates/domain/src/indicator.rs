use pinegate_core::{AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AccessTier;

/// Unique identifier for an indicator in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndicatorId(Uuid);

impl IndicatorId {
    /// Creates a new random indicator identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an indicator identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for IndicatorId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for IndicatorId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Catalog entry for a published TradingView indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indicator {
    id: IndicatorId,
    name: NonEmptyString,
    pine_id: NonEmptyString,
    access_tier: AccessTier,
}

impl Indicator {
    /// Creates a validated catalog indicator.
    pub fn new(
        id: IndicatorId,
        name: impl Into<String>,
        pine_id: impl Into<String>,
        access_tier: AccessTier,
    ) -> AppResult<Self> {
        Ok(Self {
            id,
            name: NonEmptyString::new(name)?,
            pine_id: NonEmptyString::new(pine_id)?,
            access_tier,
        })
    }

    /// Returns the catalog identifier.
    #[must_use]
    pub fn id(&self) -> IndicatorId {
        self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the remote platform script identifier.
    #[must_use]
    pub fn pine_id(&self) -> &str {
        self.pine_id.as_str()
    }

    /// Returns the pricing tier.
    #[must_use]
    pub fn access_tier(&self) -> AccessTier {
        self.access_tier
    }
}
