//! Identity and authorization gate in front of the transform.
//!
//! Verification failures end the request. A verified caller who is not
//! authorized either gets their batch back untouched or a 403, depending on
//! the configured [`DenyPolicy`].

use sealgate_auth::{AuthError, AuthorizationClient, TokenVerifier};
use sealgate_core::Namespace;

use crate::app::errors::PipelineError;
use crate::config::DenyPolicy;

/// Whether the pipeline should run the transform.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Admission {
    Transform,
    PassThrough,
}

pub struct Gatekeeper {
    verifier: TokenVerifier,
    authorizer: AuthorizationClient,
    deny_policy: DenyPolicy,
}

impl Gatekeeper {
    pub fn new(verifier: TokenVerifier, authorizer: AuthorizationClient, deny_policy: DenyPolicy) -> Self {
        Self {
            verifier,
            authorizer,
            deny_policy,
        }
    }

    pub async fn admit(
        &self,
        authorization: Option<&str>,
        namespace: &Namespace,
    ) -> Result<Admission, PipelineError> {
        let header =
            authorization.ok_or_else(|| AuthError::malformed_header("missing authorization header"))?;
        let identity = self.verifier.verify(header).await?;
        tracing::info!(email = %identity.email, "caller verified");

        let decision = self.authorizer.decide(&identity.email, namespace).await?;
        if decision.allowed {
            return Ok(Admission::Transform);
        }

        match self.deny_policy {
            DenyPolicy::PassThrough => {
                tracing::info!(email = %identity.email, "not authorized; returning batch unchanged");
                Ok(Admission::PassThrough)
            }
            DenyPolicy::Reject => Err(PipelineError::AccessDenied {
                namespace: namespace.to_string(),
            }),
        }
    }
}
