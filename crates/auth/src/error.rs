//! Authentication and authorization errors.

use thiserror::Error;

/// Failure resolving a verification key from the trust authority.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// No key in the published set carries the token's key id.
    #[error("no key with id '{kid}' in the key set")]
    KeyNotFound { kid: String },

    /// The key set could not be fetched (network, status, timeout, bad body).
    #[error("key set unavailable: {0}")]
    KeySourceUnavailable(String),

    /// The key exists but cannot be used to verify signatures.
    #[error("key '{kid}' is not usable: {reason}")]
    UnsupportedKey { kid: String, reason: String },
}

impl KeyError {
    pub fn not_found(kid: impl Into<String>) -> Self {
        Self::KeyNotFound { kid: kid.into() }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::KeySourceUnavailable(msg.into())
    }
}

/// Why a structurally valid token was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerificationFailure {
    #[error("invalid signature")]
    Signature,

    #[error("token expired")]
    Expired,

    #[error("token not yet valid")]
    NotYetValid,

    #[error("audience not accepted")]
    Audience,

    /// The header's algorithm is not the one bound to the resolved key.
    #[error("algorithm {declared} is not permitted for key '{kid}'")]
    AlgorithmMismatch { declared: String, kid: String },

    #[error("missing claim: {0}")]
    MissingClaim(String),

    #[error("{0}")]
    Invalid(String),
}

/// Errors raised while turning an `Authorization` header into an identity.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("malformed authorization header: {0}")]
    MalformedAuthHeader(String),

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("key resolution failed: {0}")]
    KeyResolutionFailed(#[from] KeyError),

    #[error("token verification failed: {0}")]
    TokenVerificationFailed(#[from] VerificationFailure),
}

impl AuthError {
    pub fn malformed_header(msg: impl Into<String>) -> Self {
        Self::MalformedAuthHeader(msg.into())
    }

    pub fn malformed_token(msg: impl Into<String>) -> Self {
        Self::MalformedToken(msg.into())
    }

    /// True when the failure is the trust authority's, not the caller's.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::KeyResolutionFailed(KeyError::KeySourceUnavailable(_))
        )
    }
}

/// The role authority could not answer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthorityError {
    #[error("authorization service unavailable: {0}")]
    Unavailable(String),
}

impl AuthorityError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}
