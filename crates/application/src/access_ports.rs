mod activity;
mod directory;
mod gateway;
mod ledger;

pub use activity::{ActivityRecord, ActivityRepository};
pub use directory::{IndicatorCatalog, UserDirectory};
pub use gateway::{EntitlementGateway, GatewayIndicatorResult};
pub use ledger::{
    AccessWithIndicator, IndicatorAccess, IndicatorAccessRepository, MarkRevokedInput,
    NewAccessLogEntry, UpsertIndicatorAccessInput, UpsertedAccess,
};
