//! Bearer token verification.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Validation, decode, decode_header};
use serde_json::{Map, Value};

use crate::bearer::parse_authorization_header;
use crate::{AuthError, IdentityClaim, KeySetResolver, VerificationFailure};

/// Static verification parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierSettings {
    /// A token is accepted when its `aud` intersects this set.
    pub audiences: Vec<String>,
    /// Claim carrying the caller's email.
    pub email_claim: String,
    /// Clock skew tolerated on `exp`/`nbf`, in seconds.
    pub leeway_secs: u64,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            audiences: vec![
                "https://saas-api.tmprl.cloud".to_string(),
                "temporal.cloud".to_string(),
            ],
            email_claim: "https://saas-api.tmprl.cloud/user/email".to_string(),
            leeway_secs: 30,
        }
    }
}

/// Turns an `Authorization` header into a verified [`IdentityClaim`].
pub struct TokenVerifier {
    keys: KeySetResolver,
    settings: VerifierSettings,
}

impl TokenVerifier {
    pub fn new(keys: KeySetResolver, settings: VerifierSettings) -> Self {
        Self { keys, settings }
    }

    /// Verify a raw `Authorization` header value.
    ///
    /// The only network call is the key lookup. The header's `alg` must be one
    /// the resolved key is bound to; it is never trusted on its own.
    pub async fn verify(&self, raw_header: &str) -> Result<IdentityClaim, AuthError> {
        let token = parse_authorization_header(raw_header)?;

        let header = decode_header(token).map_err(|e| AuthError::malformed_token(e.to_string()))?;
        let kid = header
            .kid
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AuthError::malformed_token("token header has no key id"))?;

        let entry = self.keys.resolve(&kid).await?;

        if !entry.algorithms.contains(&header.alg) {
            tracing::warn!(kid = %kid, declared = ?header.alg, bound = ?entry.algorithms, "token algorithm does not match key");
            return Err(VerificationFailure::AlgorithmMismatch {
                declared: format!("{:?}", header.alg),
                kid,
            }
            .into());
        }

        let mut validation = Validation::new(header.alg);
        validation.set_audience(self.settings.audiences.as_slice());
        validation.set_required_spec_claims(&["exp", "aud"]);
        validation.leeway = self.settings.leeway_secs;

        let data = decode::<Map<String, Value>>(token, &entry.key, &validation)
            .map_err(|e| AuthError::from(classify(e.kind())))?;

        let identity = IdentityClaim::from_verified(&data.claims, &self.settings.email_claim)?;
        tracing::debug!(kid = %kid, email = %identity.email, "token verified");
        Ok(identity)
    }
}

fn classify(kind: &ErrorKind) -> VerificationFailure {
    match kind {
        ErrorKind::InvalidSignature => VerificationFailure::Signature,
        ErrorKind::ExpiredSignature => VerificationFailure::Expired,
        ErrorKind::ImmatureSignature => VerificationFailure::NotYetValid,
        ErrorKind::InvalidAudience => VerificationFailure::Audience,
        ErrorKind::MissingRequiredClaim(claim) if claim == "aud" => VerificationFailure::Audience,
        ErrorKind::MissingRequiredClaim(claim) => VerificationFailure::MissingClaim(claim.clone()),
        other => VerificationFailure::Invalid(format!("{other:?}")),
    }
}
