//! `sealgate-auth`: caller identity and authorization.
//!
//! Token verification against a rotating key set, and the two-tier
//! (account role, then namespace permission) access decision. Network access
//! goes through the [`KeySource`] and [`RoleDirectory`] seams; this crate has
//! no HTTP client or server of its own.

pub mod authority;
pub mod authorize;
pub mod bearer;
pub mod claims;
pub mod error;
pub mod keys;
pub mod permissions;
pub mod roles;
pub mod user;
pub mod verifier;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use authority::{AuthorizationClient, RoleDirectory};
pub use authorize::{AccessPolicy, AuthorizationDecision, DecisionReason};
pub use bearer::parse_authorization_header;
pub use claims::IdentityClaim;
pub use error::{AuthError, AuthorityError, KeyError, VerificationFailure};
pub use keys::{KeyEntry, KeySetResolver, KeySource};
pub use permissions::Permission;
pub use roles::Role;
pub use user::UserRecord;
pub use verifier::{TokenVerifier, VerifierSettings};
