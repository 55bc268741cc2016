//! Service wiring: adapters, verifier, authorizer and codec.

use std::sync::Arc;

use thiserror::Error;

use sealgate_auth::{
    AccessPolicy, AuthorityError, AuthorizationClient, KeyError, KeySetResolver, KeySource,
    RoleDirectory, TokenVerifier, VerifierSettings,
};
use sealgate_core::{Namespace, PayloadCodec, TransformDispatcher};
use sealgate_infra::{AesGcmCodec, CloudOpsDirectory, CloudOpsSettings, HttpKeySource};

use crate::authz::Gatekeeper;
use crate::config::{AuthMode, GatewayConfig};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("key source: {0}")]
    KeySource(#[from] KeyError),

    #[error("role authority: {0}")]
    Authority(#[from] AuthorityError),

    #[error("{0} is required when authentication is enforced")]
    MissingCredential(&'static str),
}

/// Everything a transform request needs, shared across requests.
pub struct AppServices {
    /// Absent when authentication is disabled.
    pub gatekeeper: Option<Gatekeeper>,
    pub dispatcher: TransformDispatcher,
    pub default_namespace: Namespace,
}

/// Wire the production adapters described by `config`.
pub fn build_services(config: &GatewayConfig) -> Result<AppServices, StartupError> {
    let codec: Arc<dyn PayloadCodec> = Arc::new(AesGcmCodec::new(config.codec_keys.clone()));

    let gatekeeper = match config.auth_mode {
        AuthMode::Disabled => {
            tracing::warn!("authentication disabled; every request will be transformed");
            None
        }
        AuthMode::Enforced => {
            let api_key = config
                .ops_api_key
                .as_ref()
                .ok_or(StartupError::MissingCredential(crate::config::OPS_API_KEY))?;

            let keys: Arc<dyn KeySource> =
                Arc::new(HttpKeySource::new(config.jwks_url.clone(), config.remote_timeout)?);

            let mut ops = CloudOpsSettings::new(api_key.expose());
            ops.base_url = config.ops_address.clone();
            ops.api_version = config.ops_api_version.clone();
            let directory: Arc<dyn RoleDirectory> =
                Arc::new(CloudOpsDirectory::new(ops, config.remote_timeout)?);

            Some(gatekeeper(config, keys, directory))
        }
    };

    Ok(AppServices {
        gatekeeper,
        dispatcher: TransformDispatcher::new(codec),
        default_namespace: config.default_namespace.clone(),
    })
}

/// Build the gate from any key source and role directory.
pub fn gatekeeper(
    config: &GatewayConfig,
    keys: Arc<dyn KeySource>,
    directory: Arc<dyn RoleDirectory>,
) -> Gatekeeper {
    let resolver =
        KeySetResolver::new(keys, config.remote_timeout).with_cache(config.jwks_cache_ttl);
    let verifier = TokenVerifier::new(
        resolver,
        VerifierSettings {
            audiences: config.audiences.clone(),
            email_claim: config.email_claim.clone(),
            ..VerifierSettings::default()
        },
    );

    let policy = AccessPolicy::new(
        config.account_roles.iter().cloned(),
        config.namespace_permissions.iter().cloned(),
    );
    let authorizer = AuthorizationClient::new(directory, policy, config.remote_timeout);

    Gatekeeper::new(verifier, authorizer, config.deny_policy)
}
