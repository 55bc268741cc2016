use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Account-level role held by a user (e.g. "owner", "admin").
///
/// Role names are normalised on construction: trimmed, lower-cased, and with
/// an enum-style `ROLE_` prefix removed, so `"ROLE_ADMIN"` and `"admin"` are
/// the same role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(normalize(name.into(), "role_"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.0.into_owned()
    }
}

pub(crate) fn normalize(name: Cow<'static, str>, enum_prefix: &str) -> Cow<'static, str> {
    let trimmed = name.trim();
    let is_canonical = trimmed.len() == name.len()
        && !trimmed.bytes().any(|b| b.is_ascii_uppercase())
        && !trimmed.starts_with(enum_prefix);
    if is_canonical {
        return name;
    }

    let lowered = trimmed.to_ascii_lowercase();
    match lowered.strip_prefix(enum_prefix) {
        Some(rest) => Cow::Owned(rest.to_string()),
        None => Cow::Owned(lowered),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_and_string_forms_are_equal() {
        assert_eq!(Role::new("ROLE_ADMIN"), Role::new("admin"));
        assert_eq!(Role::new(" Owner "), Role::new("owner"));
        assert_eq!(Role::new("role_developer").as_str(), "developer");
    }

    #[test]
    fn deserializes_through_normalisation() {
        let role: Role = serde_json::from_str("\"ROLE_OWNER\"").unwrap();
        assert_eq!(role.as_str(), "owner");
    }
}
