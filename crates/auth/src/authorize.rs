use std::collections::HashSet;

use serde::Serialize;

use sealgate_core::Namespace;

use crate::{Permission, Role, UserRecord};

/// Two-tier access policy.
///
/// A caller is allowed when their account role is one of `account_roles`, or
/// when they hold one of `namespace_permissions` on the requested namespace.
/// Everything else is denied, including callers the authority does not know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    account_roles: HashSet<Role>,
    namespace_permissions: HashSet<Permission>,
}

/// Outcome of a policy check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationDecision {
    pub allowed: bool,
    pub reason: DecisionReason,
}

/// Why a decision came out the way it did (for audit logging).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionReason {
    /// Granted by an account-wide role.
    AccountRole { role: String },
    /// Granted by a permission on the requested namespace.
    NamespacePermission { permission: String },
    /// The caller is known but holds nothing sufficient here.
    InsufficientAccess,
    /// No user record matches the caller's email.
    NoMatchingRecord,
}

impl AuthorizationDecision {
    fn allow(reason: DecisionReason) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    fn deny(reason: DecisionReason) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

impl AccessPolicy {
    pub fn new(
        account_roles: impl IntoIterator<Item = Role>,
        namespace_permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        Self {
            account_roles: account_roles.into_iter().collect(),
            namespace_permissions: namespace_permissions.into_iter().collect(),
        }
    }

    /// Decide access for `email` on `namespace` given the authority's records.
    ///
    /// - No IO
    /// - Every record matching the email is considered; any grant wins
    pub fn decide(
        &self,
        records: &[UserRecord],
        email: &str,
        namespace: &Namespace,
    ) -> AuthorizationDecision {
        let mut matched = false;

        for record in records.iter().filter(|r| r.matches_email(email)) {
            matched = true;

            if let Some(role) = record
                .account_role
                .as_ref()
                .filter(|role| self.account_roles.contains(*role))
            {
                return AuthorizationDecision::allow(DecisionReason::AccountRole {
                    role: role.as_str().to_string(),
                });
            }

            if let Some(permission) = record
                .permission_for(namespace)
                .filter(|p| self.namespace_permissions.contains(*p))
            {
                return AuthorizationDecision::allow(DecisionReason::NamespacePermission {
                    permission: permission.as_str().to_string(),
                });
            }
        }

        if matched {
            AuthorizationDecision::deny(DecisionReason::InsufficientAccess)
        } else {
            AuthorizationDecision::deny(DecisionReason::NoMatchingRecord)
        }
    }
}

impl Default for AccessPolicy {
    /// `owner`/`admin` account roles; `read`/`write`/`admin` namespace permissions.
    fn default() -> Self {
        Self::new(
            [Role::new("owner"), Role::new("admin")],
            [
                Permission::new("read"),
                Permission::new("write"),
                Permission::new("admin"),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ns(name: &str) -> Namespace {
        Namespace::parse(name).unwrap()
    }

    fn directory() -> Vec<UserRecord> {
        vec![
            UserRecord::new("admin@example.com").with_account_role(Role::new("admin")),
            UserRecord::new("dev@example.com")
                .with_account_role(Role::new("developer"))
                .with_namespace_permission("ns1", Permission::new("write")),
            UserRecord::new("reader@example.com")
                .with_account_role(Role::new("read"))
                .with_namespace_permission("ns1", Permission::new("PERMISSION_UNSPECIFIED")),
        ]
    }

    #[test]
    fn account_role_grants_any_namespace() {
        let policy = AccessPolicy::default();
        let d = policy.decide(&directory(), "Admin@Example.com", &ns("anything"));
        assert!(d.allowed);
        assert_eq!(
            d.reason,
            DecisionReason::AccountRole {
                role: "admin".into()
            }
        );
    }

    #[test]
    fn namespace_permission_grants_only_that_namespace() {
        let policy = AccessPolicy::default();

        let d = policy.decide(&directory(), "dev@example.com", &ns("ns1"));
        assert!(d.allowed);
        assert_eq!(
            d.reason,
            DecisionReason::NamespacePermission {
                permission: "write".into()
            }
        );

        let d = policy.decide(&directory(), "dev@example.com", &ns("ns2"));
        assert!(!d.allowed);
        assert_eq!(d.reason, DecisionReason::InsufficientAccess);
    }

    #[test]
    fn unauthorized_permission_value_is_denied() {
        let policy = AccessPolicy::default();
        let d = policy.decide(&directory(), "reader@example.com", &ns("ns1"));
        assert!(!d.allowed);
    }

    #[test]
    fn unknown_email_is_denied() {
        let policy = AccessPolicy::default();
        let d = policy.decide(&directory(), "stranger@example.com", &ns("ns1"));
        assert!(!d.allowed);
        assert_eq!(d.reason, DecisionReason::NoMatchingRecord);

        let d = policy.decide(&[], "admin@example.com", &ns("ns1"));
        assert_eq!(d.reason, DecisionReason::NoMatchingRecord);
    }

    #[test]
    fn any_matching_record_may_grant() {
        let records = vec![
            UserRecord::new("dup@example.com").with_account_role(Role::new("developer")),
            UserRecord::new("dup@example.com").with_namespace_permission("ns1", Permission::new("read")),
        ];
        assert!(AccessPolicy::default().decide(&records, "dup@example.com", &ns("ns1")).allowed);
    }

    #[test]
    fn empty_policy_denies_everyone() {
        let policy = AccessPolicy::new([], []);
        assert!(!policy.decide(&directory(), "admin@example.com", &ns("ns1")).allowed);
    }

    fn role_strategy() -> impl Strategy<Value = Option<String>> {
        prop::option::of(prop::sample::select(vec![
            "owner", "admin", "developer", "read", "financeadmin",
        ]))
        .prop_map(|r| r.map(str::to_string))
    }

    fn permission_strategy() -> impl Strategy<Value = Option<String>> {
        prop::option::of(prop::sample::select(vec!["read", "write", "admin", "none"]))
            .prop_map(|p| p.map(str::to_string))
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: decision == (account role authorized) || (namespace permission authorized).
        #[test]
        fn decision_matches_two_tier_rule(
            role in role_strategy(),
            permission in permission_strategy(),
            permission_ns in prop::sample::select(vec!["ns1", "ns2"]),
            requested in prop::sample::select(vec!["ns1", "ns2", "ns3"]),
            known in any::<bool>(),
        ) {
            let policy = AccessPolicy::default();
            let mut record = UserRecord::new(if known { "user@example.com" } else { "other@example.com" });
            if let Some(r) = &role {
                record = record.with_account_role(Role::new(r.clone()));
            }
            if let Some(p) = &permission {
                record = record.with_namespace_permission(permission_ns, Permission::new(p.clone()));
            }

            let decision = policy.decide(&[record], "user@example.com", &ns(requested));

            let by_role = role.as_deref().is_some_and(|r| r == "owner" || r == "admin");
            let by_ns = permission_ns == requested
                && permission.as_deref().is_some_and(|p| matches!(p, "read" | "write" | "admin"));
            prop_assert_eq!(decision.allowed, known && (by_role || by_ns));
        }
    }
}
