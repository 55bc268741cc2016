use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::VerificationFailure;

/// Fallback claim consulted when the configured email claim is absent.
pub const STANDARD_EMAIL_CLAIM: &str = "email";

/// Identity extracted from a verified token.
///
/// Only produced after the signature, audience and expiry checks have passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaim {
    pub email: String,
    pub subject: Option<String>,
    pub audiences: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

impl IdentityClaim {
    /// Build from a verified claim set.
    ///
    /// `email_claim` names the claim carrying the caller's email; the standard
    /// `email` claim is used when it is absent.
    pub fn from_verified(
        claims: &Map<String, Value>,
        email_claim: &str,
    ) -> Result<Self, VerificationFailure> {
        let email = [email_claim, STANDARD_EMAIL_CLAIM]
            .iter()
            .find_map(|name| claims.get(*name).and_then(Value::as_str))
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| VerificationFailure::MissingClaim(email_claim.to_string()))?
            .to_string();

        let exp = claims
            .get("exp")
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .ok_or_else(|| VerificationFailure::MissingClaim("exp".into()))?;
        let expires_at = DateTime::<Utc>::from_timestamp(exp, 0)
            .ok_or_else(|| VerificationFailure::Invalid(format!("exp {exp} out of range")))?;

        let audiences = match claims.get("aud") {
            Some(Value::String(aud)) => vec![aud.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self {
            email,
            subject: claims.get("sub").and_then(Value::as_str).map(str::to_string),
            audiences,
            expires_at,
        })
    }
}
