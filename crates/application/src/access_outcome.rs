use pinegate_core::AppResult;
use pinegate_domain::{EmailAddress, IndicatorId, PlatformUser};

use crate::UserDirectory;

/// Why an engine stopped early or reported failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeReason {
    /// No platform account matches the buyer email.
    UserNotRegistered,
    /// The account never completed TradingView onboarding.
    MissingTradingViewUsername,
    /// The purchased products resolve to no active indicator.
    NoActiveIndicators,
    /// The remote platform call failed as a whole.
    GatewayFailure(String),
}

impl std::fmt::Display for OutcomeReason {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserNotRegistered => formatter.write_str("user not registered"),
            Self::MissingTradingViewUsername => {
                formatter.write_str("missing TradingView username")
            }
            Self::NoActiveIndicators => formatter.write_str("no active indicators found"),
            Self::GatewayFailure(message) => write!(formatter, "gateway failure: {message}"),
        }
    }
}

/// Failure for one indicator inside an otherwise completed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorError {
    /// Catalog indicator, when the remote result could be matched.
    pub indicator_id: Option<IndicatorId>,
    /// Remote script identifier.
    pub pine_id: String,
    /// Failure description.
    pub message: String,
}

/// Buyer resolution shared by the grant and revoke engines.
pub(crate) enum BuyerResolution {
    Ready { user: PlatformUser, username: String },
    Terminal {
        user: Option<PlatformUser>,
        reason: OutcomeReason,
    },
}

/// Resolves a Stripe customer email to a user with a TradingView username.
///
/// Malformed emails cannot match any account and resolve as unregistered.
pub(crate) async fn resolve_buyer(
    users: &dyn UserDirectory,
    customer_email: &str,
) -> AppResult<BuyerResolution> {
    let Ok(email) = EmailAddress::new(customer_email) else {
        return Ok(BuyerResolution::Terminal {
            user: None,
            reason: OutcomeReason::UserNotRegistered,
        });
    };

    let Some(user) = users.find_user_by_email(&email).await? else {
        return Ok(BuyerResolution::Terminal {
            user: None,
            reason: OutcomeReason::UserNotRegistered,
        });
    };

    match user.tradingview_username().map(str::to_owned) {
        Some(username) => Ok(BuyerResolution::Ready { user, username }),
        None => Ok(BuyerResolution::Terminal {
            user: Some(user),
            reason: OutcomeReason::MissingTradingViewUsername,
        }),
    }
}
