//! Platform user types consumed by the entitlement engines.

use pinegate_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a platform user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random user identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a user identifier from an existing UUID value.
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

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Normalized email address used to match Stripe customers to users.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Creates a normalized email address.
    ///
    /// Trims and lowercases the value; requires one `@` with non-empty parts.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let normalized = value.trim().to_lowercase();

        let Some((local, domain)) = normalized.split_once('@') else {
            return Err(AppError::Validation(
                "email address must contain '@'".to_owned(),
            ));
        };

        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(AppError::Validation(format!(
                "email address '{normalized}' is malformed"
            )));
        }

        Ok(Self(normalized))
    }

    /// Returns the normalized email string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Platform user as seen by the entitlement engines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformUser {
    id: UserId,
    email: EmailAddress,
    tradingview_username: Option<NonEmptyString>,
}

impl PlatformUser {
    /// Creates a user projection. Blank usernames count as missing.
    #[must_use]
    pub fn new(id: UserId, email: EmailAddress, tradingview_username: Option<String>) -> Self {
        Self {
            id,
            email,
            tradingview_username: tradingview_username
                .and_then(|value| NonEmptyString::new(value.trim()).ok()),
        }
    }

    /// Returns the user identifier.
    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    /// Returns the account email.
    #[must_use]
    pub fn email(&self) -> &EmailAddress {
        &self.email
    }

    /// Returns the TradingView username if onboarding was completed.
    #[must_use]
    pub fn tradingview_username(&self) -> Option<&str> {
        self.tradingview_username.as_ref().map(NonEmptyString::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::{EmailAddress, PlatformUser, UserId};

    #[test]
    fn email_is_normalized() {
        let email = EmailAddress::new("  Trader@Example.COM ");
        assert_eq!(
            email.ok().as_ref().map(EmailAddress::as_str),
            Some("trader@example.com")
        );
    }

    #[test]
    fn email_without_at_is_rejected() {
        assert!(EmailAddress::new("trader.example.com").is_err());
    }

    #[test]
    fn blank_username_counts_as_missing() {
        let Ok(email) = EmailAddress::new("a@b.io") else {
            panic!("email should parse");
        };
        let user = PlatformUser::new(UserId::new(), email, Some("   ".to_owned()));
        assert_eq!(user.tradingview_username(), None);
    }
}
