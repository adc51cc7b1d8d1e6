use async_trait::async_trait;
use pinegate_core::AppResult;
use pinegate_domain::{ActivityKind, UserId};
use serde_json::Value;

/// Customer-facing activity feed entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    /// Affected user.
    pub user_id: UserId,
    /// Stable activity kind.
    pub kind: ActivityKind,
    /// Human-readable summary.
    pub description: String,
    /// Structured context for display.
    pub metadata: Value,
}

/// Repository port for the activity feed.
#[async_trait]
pub trait ActivityRepository: Send + Sync {
    /// Appends one activity record.
    async fn record_activity(&self, record: ActivityRecord) -> AppResult<()>;
}
