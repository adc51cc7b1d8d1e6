use std::str::FromStr;

use chrono::{DateTime, Utc};
use pinegate_application::{AccessWithIndicator, IndicatorAccess, UpsertedAccess};
use pinegate_core::AppResult;
use pinegate_domain::{
    AccessSource, AccessStatus, AccessTier, DurationType, Indicator, IndicatorId, UserId,
};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, FromRow)]
pub(super) struct IndicatorAccessRow {
    id: Uuid,
    user_id: Uuid,
    indicator_id: Uuid,
    tradingview_username: String,
    status: String,
    granted_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
    duration_type: String,
    access_source: String,
    granted_by: Option<Uuid>,
    revoked_by: Option<Uuid>,
    tradingview_response: Option<Value>,
    notes: Option<String>,
}

impl IndicatorAccessRow {
    pub(super) fn into_access(self) -> AppResult<IndicatorAccess> {
        Ok(IndicatorAccess {
            id: self.id,
            user_id: UserId::from_uuid(self.user_id),
            indicator_id: IndicatorId::from_uuid(self.indicator_id),
            tradingview_username: self.tradingview_username,
            status: AccessStatus::from_str(&self.status)?,
            granted_at: self.granted_at,
            expires_at: self.expires_at,
            revoked_at: self.revoked_at,
            duration_type: DurationType::from_str(&self.duration_type)?,
            access_source: AccessSource::from_str(&self.access_source)?,
            granted_by: self.granted_by.map(UserId::from_uuid),
            revoked_by: self.revoked_by.map(UserId::from_uuid),
            tradingview_response: self.tradingview_response,
            notes: self.notes,
        })
    }
}

#[derive(Debug, FromRow)]
pub(super) struct UpsertedAccessRow {
    #[sqlx(flatten)]
    access: IndicatorAccessRow,
    previously_existed: bool,
}

impl UpsertedAccessRow {
    pub(super) fn into_upserted(self) -> AppResult<UpsertedAccess> {
        Ok(UpsertedAccess {
            access: self.access.into_access()?,
            previously_existed: self.previously_existed,
        })
    }
}

#[derive(Debug, FromRow)]
pub(super) struct AccessWithIndicatorRow {
    #[sqlx(flatten)]
    access: IndicatorAccessRow,
    indicator_name: String,
    indicator_pine_id: String,
    indicator_access_tier: String,
}

impl AccessWithIndicatorRow {
    pub(super) fn into_joined(self) -> AppResult<AccessWithIndicator> {
        let indicator = Indicator::new(
            IndicatorId::from_uuid(self.access.indicator_id),
            self.indicator_name,
            self.indicator_pine_id,
            AccessTier::from_str(&self.indicator_access_tier)?,
        )?;

        Ok(AccessWithIndicator {
            access: self.access.into_access()?,
            indicator,
        })
    }
}
