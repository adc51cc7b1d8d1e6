use hmac::{Hmac, Mac};
use pinegate_core::{AppError, AppResult};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted age of a signed timestamp, in seconds.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Maximum accepted clock skew for timestamps in the future, in seconds.
const FUTURE_SKEW_SECS: i64 = 60;

/// Verifies the `Stripe-Signature` header of webhook deliveries.
#[derive(Clone)]
pub struct StripeSignatureVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl std::fmt::Debug for StripeSignatureVerifier {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("StripeSignatureVerifier")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish_non_exhaustive()
    }
}

impl StripeSignatureVerifier {
    /// Creates a verifier for an endpoint signing secret.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    /// Overrides the timestamp tolerance.
    #[must_use]
    pub fn with_tolerance_secs(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Checks `t=<unix>,v1=<hex>[,v1=<hex>...]` against the raw payload.
    ///
    /// Any matching `v1` entry is accepted, which keeps deliveries valid
    /// while a secret is being rolled.
    pub fn verify(&self, payload: &[u8], header: &str, now_unix: i64) -> AppResult<()> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let part = part.trim();
            if let Some(value) = part.strip_prefix("t=") {
                timestamp = Some(value);
            } else if let Some(value) = part.strip_prefix("v1=") {
                signatures.push(value);
            }
        }

        let Some(timestamp) = timestamp else {
            return Err(AppError::Unauthorized(
                "stripe signature header is missing a timestamp".to_owned(),
            ));
        };
        if signatures.is_empty() {
            return Err(AppError::Unauthorized(
                "stripe signature header has no v1 signature".to_owned(),
            ));
        }

        let signed_at: i64 = timestamp.parse().map_err(|_| {
            AppError::Unauthorized("stripe signature timestamp is not a number".to_owned())
        })?;
        let age = now_unix - signed_at;
        if age > self.tolerance_secs {
            return Err(AppError::Unauthorized(format!(
                "stripe signature timestamp is too old ({age}s)"
            )));
        }
        if age < -FUTURE_SKEW_SECS {
            return Err(AppError::Unauthorized(
                "stripe signature timestamp is in the future".to_owned(),
            ));
        }

        let expected = self.sign(timestamp, payload)?;
        let matches = signatures.iter().any(|candidate| {
            let candidate = candidate.as_bytes();
            candidate.len() == expected.len() && bool::from(candidate.ct_eq(expected.as_bytes()))
        });

        if matches {
            Ok(())
        } else {
            Err(AppError::Unauthorized(
                "stripe signature does not match payload".to_owned(),
            ))
        }
    }

    /// Computes the hex `v1` signature for a timestamp and payload.
    pub fn sign(&self, timestamp: &str, payload: &[u8]) -> AppResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).map_err(|error| {
            AppError::Internal(format!("invalid stripe webhook secret: {error}"))
        })?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}
