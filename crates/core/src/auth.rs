use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Admin caller resolved by the API authentication middleware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminIdentity {
    user_id: Uuid,
}

impl AdminIdentity {
    /// Creates an admin identity for a platform user id.
    #[must_use]
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }

    /// Returns the platform user id of the admin.
    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }
}
