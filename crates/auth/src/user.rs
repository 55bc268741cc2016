//! User records as reported by the role authority.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use sealgate_core::Namespace;

use crate::{Permission, Role};

/// One user known to the role authority.
///
/// Carries both authorization tiers: an optional account-wide role and a map
/// of per-namespace permissions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserRecord {
    pub email: String,
    pub account_role: Option<Role>,
    pub namespace_permissions: BTreeMap<String, Permission>,
}

impl UserRecord {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Default::default()
        }
    }

    pub fn with_account_role(mut self, role: Role) -> Self {
        self.account_role = Some(role);
        self
    }

    pub fn with_namespace_permission(
        mut self,
        namespace: impl Into<String>,
        permission: Permission,
    ) -> Self {
        self.namespace_permissions.insert(namespace.into(), permission);
        self
    }

    /// Case-insensitive email comparison.
    pub fn matches_email(&self, email: &str) -> bool {
        let ours = self.email.trim();
        !ours.is_empty() && ours.eq_ignore_ascii_case(email.trim())
    }

    pub fn permission_for(&self, namespace: &Namespace) -> Option<&Permission> {
        self.namespace_permissions.get(namespace.as_str())
    }
}
