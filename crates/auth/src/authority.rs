//! Remote authorization: role directory lookup + access policy.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use sealgate_core::Namespace;

use crate::{AccessPolicy, AuthorityError, AuthorizationDecision, UserRecord};

/// The remote role authority's "list users" capability.
///
/// Implementations acquire whatever connection they need per call and release
/// it before returning.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    async fn list_users(&self) -> Result<Vec<UserRecord>, AuthorityError>;
}

/// Decides whether a verified caller may transform payloads in a namespace.
pub struct AuthorizationClient {
    directory: Arc<dyn RoleDirectory>,
    policy: AccessPolicy,
    timeout: Duration,
}

impl AuthorizationClient {
    pub fn new(directory: Arc<dyn RoleDirectory>, policy: AccessPolicy, timeout: Duration) -> Self {
        Self {
            directory,
            policy,
            timeout,
        }
    }

    /// Full decision, including the reason.
    ///
    /// Fails only when the directory cannot be read; an unknown caller is a
    /// deny, not an error.
    pub async fn decide(
        &self,
        email: &str,
        namespace: &Namespace,
    ) -> Result<AuthorizationDecision, AuthorityError> {
        let records = tokio::time::timeout(self.timeout, self.directory.list_users())
            .await
            .map_err(|_| {
                AuthorityError::unavailable(format!(
                    "role lookup timed out after {:?}",
                    self.timeout
                ))
            })??;

        let decision = self.policy.decide(&records, email, namespace);
        tracing::info!(
            %namespace,
            allowed = decision.allowed,
            reason = ?decision.reason,
            records = records.len(),
            "authorization decided"
        );
        Ok(decision)
    }

    pub async fn is_authorized(
        &self,
        email: &str,
        namespace: &Namespace,
    ) -> Result<bool, AuthorityError> {
        Ok(self.decide(email, namespace).await?.allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::StaticDirectory;
    use crate::{DecisionReason, Permission, Role};

    fn client(directory: Arc<StaticDirectory>) -> AuthorizationClient {
        AuthorizationClient::new(directory, AccessPolicy::default(), Duration::from_secs(1))
    }

    fn ns(name: &str) -> Namespace {
        Namespace::parse(name).unwrap()
    }

    #[tokio::test]
    async fn admin_is_authorized_everywhere() {
        let dir = Arc::new(StaticDirectory::new(vec![
            UserRecord::new("admin@example.com").with_account_role(Role::new("admin")),
        ]));
        let c = client(dir.clone());

        assert!(c.is_authorized("admin@example.com", &ns("ns1")).await.unwrap());
        assert!(c.is_authorized("ADMIN@example.com", &ns("ns2")).await.unwrap());
        assert_eq!(dir.call_count(), 2);
    }

    #[tokio::test]
    async fn namespace_writer_is_scoped() {
        let dir = Arc::new(StaticDirectory::new(vec![
            UserRecord::new("dev@example.com")
                .with_account_role(Role::new("developer"))
                .with_namespace_permission("ns1", Permission::new("write")),
        ]));
        let c = client(dir);

        let d = c.decide("dev@example.com", &ns("ns1")).await.unwrap();
        assert!(d.allowed);
        let d = c.decide("dev@example.com", &ns("ns2")).await.unwrap();
        assert_eq!(d.reason, DecisionReason::InsufficientAccess);
    }

    #[tokio::test]
    async fn unknown_caller_is_denied_not_errored() {
        let c = client(Arc::new(StaticDirectory::new(vec![])));
        assert!(!c.is_authorized("nobody@example.com", &ns("ns1")).await.unwrap());
    }

    #[tokio::test]
    async fn directory_failure_is_unavailable() {
        let dir = Arc::new(StaticDirectory::new(vec![]));
        dir.fail_with("permission denied: bad api key");

        let err = client(dir).decide("a@example.com", &ns("ns1")).await.unwrap_err();
        assert_eq!(
            err,
            AuthorityError::unavailable("permission denied: bad api key")
        );
    }

    #[tokio::test]
    async fn slow_directory_times_out() {
        let dir = Arc::new(StaticDirectory::new(vec![]));
        dir.delay(Duration::from_millis(200));

        let c = AuthorizationClient::new(dir, AccessPolicy::default(), Duration::from_millis(20));
        let err = c.decide("a@example.com", &ns("ns1")).await.unwrap_err();
        assert!(matches!(err, AuthorityError::Unavailable(msg) if msg.contains("timed out")));
    }
}
