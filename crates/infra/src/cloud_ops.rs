//! Role authority adapter for the cloud operations API.
//!
//! `GET {base}/cloud/users` is paged with `pageSize` / `pageToken`; each user
//! carries an account role and a map of namespace permissions. Roles arrive
//! either enum-shaped (`ROLE_ADMIN`) or plain (`admin`); both normalise to the
//! same [`Role`] / [`Permission`].

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use sealgate_auth::{AuthorityError, Permission, Role, RoleDirectory, UserRecord};

/// Header naming the API revision the request is written against.
pub const API_VERSION_HEADER: &str = "temporal-cloud-api-version";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudOpsSettings {
    pub base_url: String,
    pub api_key: String,
    pub api_version: String,
    pub page_size: u32,
}

impl CloudOpsSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: "https://saas-api.tmprl.cloud".to_string(),
            api_key: api_key.into(),
            api_version: "2024-05-13-00".to_string(),
            page_size: 100,
        }
    }
}

/// Lists users from the cloud operations API.
///
/// The underlying connection pool is reused across calls; each call holds a
/// connection only for the duration of its requests.
pub struct CloudOpsDirectory {
    base_url: String,
    page_size: u32,
    headers: HeaderMap,
    client: Client,
}

impl core::fmt::Debug for CloudOpsDirectory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CloudOpsDirectory")
            .field("base_url", &self.base_url)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsersPage {
    #[serde(default)]
    users: Vec<Value>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct WireUser {
    spec: WireSpec,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct WireSpec {
    email: Option<String>,
    access: WireAccess,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct WireAccess {
    account_access: Option<WireAccountAccess>,
    namespace_accesses: BTreeMap<String, WireNamespaceAccess>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct WireAccountAccess {
    role: Value,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct WireNamespaceAccess {
    permission: Value,
}

impl CloudOpsDirectory {
    pub fn new(settings: CloudOpsSettings, timeout: Duration) -> Result<Self, AuthorityError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", settings.api_key))
            .map_err(|_| AuthorityError::unavailable("api key is not a valid header value"))?;
        headers.insert(reqwest::header::AUTHORIZATION, bearer);
        let version = HeaderValue::from_str(&settings.api_version)
            .map_err(|_| AuthorityError::unavailable("api version is not a valid header value"))?;
        headers.insert(API_VERSION_HEADER, version);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| AuthorityError::unavailable(format!("cannot build http client: {e}")))?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            page_size: settings.page_size.max(1),
            headers,
            client,
        })
    }

    async fn page(&self, token: Option<&str>) -> Result<UsersPage, AuthorityError> {
        let mut query = vec![("pageSize", self.page_size.to_string())];
        if let Some(token) = token {
            query.push(("pageToken", token.to_string()));
        }

        let response = self
            .client
            .get(format!("{}/cloud/users", self.base_url))
            .headers(self.headers.clone())
            .query(&query)
            .send()
            .await
            .map_err(|e| AuthorityError::unavailable(format!("list users failed: {e}")))?;

        match response.status() {
            StatusCode::OK => response
                .json()
                .await
                .map_err(|e| AuthorityError::unavailable(format!("list users returned invalid JSON: {e}"))),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AuthorityError::unavailable(
                "role authority rejected the api key",
            )),
            status => Err(AuthorityError::unavailable(format!(
                "role authority returned {status}"
            ))),
        }
    }
}

#[async_trait]
impl RoleDirectory for CloudOpsDirectory {
    async fn list_users(&self) -> Result<Vec<UserRecord>, AuthorityError> {
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        let mut token: Option<String> = None;

        loop {
            let page = self.page(token.as_deref()).await?;
            records.extend(page.users.into_iter().filter_map(to_record));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) if seen.insert(next.clone()) => token = Some(next),
                Some(next) => {
                    tracing::warn!(token = %next, "role authority repeated a page token; stopping");
                    break;
                }
                None => break,
            }
        }

        tracing::debug!(users = records.len(), "listed users");
        Ok(records)
    }
}

fn to_record(value: Value) -> Option<UserRecord> {
    let user: WireUser = match serde_json::from_value(value) {
        Ok(user) => user,
        Err(e) => {
            tracing::debug!(error = %e, "skipping unreadable user entry");
            return None;
        }
    };

    let email = user.spec.email.filter(|e| !e.trim().is_empty())?;
    let mut record = UserRecord::new(email);

    if let Some(role) = user
        .spec
        .access
        .account_access
        .as_ref()
        .and_then(|a| a.role.as_str())
        .filter(|r| !r.is_empty())
    {
        record = record.with_account_role(Role::new(role.to_string()));
    }

    for (namespace, access) in user.spec.access.namespace_accesses {
        if let Some(permission) = access.permission.as_str().filter(|p| !p.is_empty()) {
            record = record.with_namespace_permission(namespace, Permission::new(permission.to_string()));
        }
    }

    Some(record)
}
