//! Gateway configuration, read once at startup.
//!
//! Every setting comes from an environment variable with a default where one
//! makes sense. Lookup goes through a closure so tests can pass a map.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use sealgate_auth::{Permission, Role};
use sealgate_core::Namespace;
use sealgate_infra::KeyRing;

pub const BIND: &str = "SEALGATE_BIND";
pub const AUTH_MODE: &str = "SEALGATE_AUTH_MODE";
pub const JWKS_URL: &str = "SEALGATE_JWKS_URL";
pub const JWKS_CACHE_TTL_SECS: &str = "SEALGATE_JWKS_CACHE_TTL_SECS";
pub const AUDIENCES: &str = "SEALGATE_AUDIENCES";
pub const EMAIL_CLAIM: &str = "SEALGATE_EMAIL_CLAIM";
pub const ACCOUNT_ROLES: &str = "SEALGATE_ACCOUNT_ROLES";
pub const NAMESPACE_PERMISSIONS: &str = "SEALGATE_NAMESPACE_PERMISSIONS";
pub const DENY_POLICY: &str = "SEALGATE_DENY_POLICY";
pub const ALLOWED_ORIGINS: &str = "SEALGATE_ALLOWED_ORIGINS";
pub const REMOTE_TIMEOUT_MS: &str = "SEALGATE_REMOTE_TIMEOUT_MS";
pub const DEFAULT_NAMESPACE: &str = "SEALGATE_DEFAULT_NAMESPACE";
pub const OPS_ADDRESS: &str = "TEMPORAL_OPS_ADDRESS";
pub const OPS_API_VERSION: &str = "TEMPORAL_OPS_API_VERSION";
pub const OPS_API_KEY: &str = "TEMPORAL_CLOUD_OPS_API_KEY";
pub const CODEC_KEY: &str = "SEALGATE_CODEC_KEY";
pub const TLS_CERT: &str = "SEALGATE_TLS_CERT";
pub const TLS_KEY: &str = "SEALGATE_TLS_KEY";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(var: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// Bearer token and role lookup on every transform request.
    Enforced,
    /// No identity checks; every request is transformed.
    Disabled,
}

/// What happens to a verified caller the role authority does not authorize.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DenyPolicy {
    /// Answer 200 with the batch exactly as received.
    PassThrough,
    /// Answer 403.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// A credential that must never show up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for Secret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Secret(..)")
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind: SocketAddr,
    pub auth_mode: AuthMode,
    pub jwks_url: String,
    pub jwks_cache_ttl: Duration,
    pub audiences: Vec<String>,
    pub email_claim: String,
    pub account_roles: Vec<Role>,
    pub namespace_permissions: Vec<Permission>,
    pub deny_policy: DenyPolicy,
    pub allowed_origins: Vec<String>,
    pub remote_timeout: Duration,
    pub default_namespace: Namespace,
    pub ops_address: String,
    pub ops_api_version: String,
    /// Present whenever `auth_mode` is `Enforced`.
    pub ops_api_key: Option<Secret>,
    pub codec_keys: KeyRing,
    pub tls: Option<TlsFiles>,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        let bind = or(BIND, "127.0.0.1:8081")
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid(BIND, e.to_string()))?;

        let auth_mode = match or(AUTH_MODE, "enforced").to_ascii_lowercase().as_str() {
            "enforced" => AuthMode::Enforced,
            "disabled" => AuthMode::Disabled,
            other => {
                return Err(ConfigError::invalid(
                    AUTH_MODE,
                    format!("'{other}' (expected enforced or disabled)"),
                ));
            }
        };

        let deny_policy = match or(DENY_POLICY, "pass-through").to_ascii_lowercase().as_str() {
            "pass-through" | "passthrough" => DenyPolicy::PassThrough,
            "reject" => DenyPolicy::Reject,
            other => {
                return Err(ConfigError::invalid(
                    DENY_POLICY,
                    format!("'{other}' (expected pass-through or reject)"),
                ));
            }
        };

        let jwks_cache_ttl = Duration::from_secs(parse_number(JWKS_CACHE_TTL_SECS, &or(JWKS_CACHE_TTL_SECS, "0"))?);

        let remote_timeout_ms = parse_number(REMOTE_TIMEOUT_MS, &or(REMOTE_TIMEOUT_MS, "5000"))?;
        if remote_timeout_ms == 0 {
            return Err(ConfigError::invalid(REMOTE_TIMEOUT_MS, "must be greater than zero"));
        }

        let audiences = list(&or(AUDIENCES, "https://saas-api.tmprl.cloud,temporal.cloud"));
        if auth_mode == AuthMode::Enforced && audiences.is_empty() {
            return Err(ConfigError::invalid(AUDIENCES, "at least one audience is required"));
        }

        let default_namespace = Namespace::parse(&or(DEFAULT_NAMESPACE, "default"))
            .map_err(|e| ConfigError::invalid(DEFAULT_NAMESPACE, e.to_string()))?;

        let ops_api_key = get(OPS_API_KEY).map(Secret);
        if auth_mode == AuthMode::Enforced && ops_api_key.is_none() {
            return Err(ConfigError::Missing(OPS_API_KEY));
        }

        let codec_keys = KeyRing::from_base64(&get(CODEC_KEY).ok_or(ConfigError::Missing(CODEC_KEY))?)
            .map_err(|e| ConfigError::invalid(CODEC_KEY, e.to_string()))?;

        let tls = match (get(TLS_CERT), get(TLS_KEY)) {
            (Some(cert), Some(key)) => Some(TlsFiles {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT)),
        };

        Ok(Self {
            bind,
            auth_mode,
            jwks_url: or(JWKS_URL, "https://login.tmprl.cloud/.well-known/jwks.json"),
            jwks_cache_ttl,
            audiences,
            email_claim: or(EMAIL_CLAIM, "https://saas-api.tmprl.cloud/user/email"),
            account_roles: list(&or(ACCOUNT_ROLES, "owner,admin"))
                .into_iter()
                .map(Role::new)
                .collect(),
            namespace_permissions: list(&or(NAMESPACE_PERMISSIONS, "read,write,admin"))
                .into_iter()
                .map(Permission::new)
                .collect(),
            deny_policy,
            allowed_origins: list(&or(
                ALLOWED_ORIGINS,
                "http://localhost:8233,https://cloud.temporal.io",
            )),
            remote_timeout: Duration::from_millis(remote_timeout_ms),
            default_namespace,
            ops_address: or(OPS_ADDRESS, "https://saas-api.tmprl.cloud"),
            ops_api_version: or(OPS_API_VERSION, "2024-05-13-00"),
            ops_api_key,
            codec_keys,
            tls,
        })
    }

    /// Requests count as received over a secure transport when TLS terminates here.
    pub fn is_secure(&self) -> bool {
        self.tls.is_some()
    }
}

fn list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse::<u64>()
        .map_err(|e| ConfigError::invalid(var, format!("'{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const KEY: &str = "AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE=";

    fn load(vars: &[(&str, &str)]) -> Result<GatewayConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GatewayConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_fill_everything_but_secrets() {
        let cfg = load(&[(CODEC_KEY, KEY), (OPS_API_KEY, "k")]).unwrap();

        assert_eq!(cfg.bind, "127.0.0.1:8081".parse().unwrap());
        assert_eq!(cfg.auth_mode, AuthMode::Enforced);
        assert_eq!(cfg.deny_policy, DenyPolicy::PassThrough);
        assert_eq!(cfg.audiences, vec!["https://saas-api.tmprl.cloud", "temporal.cloud"]);
        assert_eq!(cfg.account_roles, vec![Role::new("owner"), Role::new("admin")]);
        assert_eq!(cfg.namespace_permissions.len(), 3);
        assert_eq!(
            cfg.allowed_origins,
            vec!["http://localhost:8233", "https://cloud.temporal.io"]
        );
        assert_eq!(cfg.remote_timeout, Duration::from_secs(5));
        assert!(cfg.jwks_cache_ttl.is_zero());
        assert_eq!(cfg.default_namespace.as_str(), "default");
        assert!(!cfg.is_secure());
    }

    #[test]
    fn api_key_required_only_when_enforced() {
        assert_eq!(
            load(&[(CODEC_KEY, KEY)]).unwrap_err(),
            ConfigError::Missing(OPS_API_KEY)
        );
        let cfg = load(&[(CODEC_KEY, KEY), (AUTH_MODE, "disabled")]).unwrap();
        assert_eq!(cfg.auth_mode, AuthMode::Disabled);
        assert!(cfg.ops_api_key.is_none());
    }

    #[test]
    fn codec_key_is_required_and_checked() {
        assert_eq!(
            load(&[(OPS_API_KEY, "k")]).unwrap_err(),
            ConfigError::Missing(CODEC_KEY)
        );
        assert!(matches!(
            load(&[(OPS_API_KEY, "k"), (CODEC_KEY, "c2hvcnQ=")]).unwrap_err(),
            ConfigError::Invalid { var: CODEC_KEY, .. }
        ));
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let base = [(CODEC_KEY, KEY), (OPS_API_KEY, "k")];
        for (var, value) in [
            (BIND, "not-an-address"),
            (AUTH_MODE, "sometimes"),
            (DENY_POLICY, "shrug"),
            (REMOTE_TIMEOUT_MS, "0"),
            (JWKS_CACHE_TTL_SECS, "-1"),
            (DEFAULT_NAMESPACE, "has space"),
        ] {
            let mut vars = base.to_vec();
            vars.push((var, value));
            let err = load(&vars).unwrap_err();
            assert!(
                matches!(&err, ConfigError::Invalid { var: v, .. } if *v == var),
                "{var}: {err}"
            );
        }
    }

    #[test]
    fn tls_pair_must_be_complete() {
        let base = [(CODEC_KEY, KEY), (OPS_API_KEY, "k")];

        let mut vars = base.to_vec();
        vars.push((TLS_CERT, "/etc/sealgate/cert.pem"));
        assert_eq!(load(&vars).unwrap_err(), ConfigError::Missing(TLS_KEY));

        vars.push((TLS_KEY, "/etc/sealgate/key.pem"));
        let cfg = load(&vars).unwrap();
        assert!(cfg.is_secure());
    }

    #[test]
    fn lists_are_trimmed_and_roles_normalised() {
        let cfg = load(&[
            (CODEC_KEY, KEY),
            (OPS_API_KEY, "k"),
            (ACCOUNT_ROLES, " ROLE_OWNER , ,finance_admin"),
            (DENY_POLICY, "Reject"),
        ])
        .unwrap();
        assert_eq!(cfg.account_roles, vec![Role::new("owner"), Role::new("finance_admin")]);
        assert_eq!(cfg.deny_policy, DenyPolicy::Reject);
    }

    #[test]
    fn secrets_are_not_debug_printed() {
        let cfg = load(&[(CODEC_KEY, KEY), (OPS_API_KEY, "super-secret")]).unwrap();
        assert!(!format!("{cfg:?}").contains("super-secret"));
    }
}
