//! JWKS over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::Value;

use sealgate_auth::{KeyError, KeySource};

/// Fetches the trust authority's published key set from a well-known URL.
///
/// Entries the verifier cannot represent (unknown `kty`, missing fields) are
/// dropped with a warning instead of failing the whole set.
#[derive(Debug, Clone)]
pub struct HttpKeySource {
    url: String,
    client: Client,
}

#[derive(Deserialize)]
struct RawKeySet {
    #[serde(default)]
    keys: Vec<Value>,
}

impl HttpKeySource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, KeyError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| KeyError::unavailable(format!("cannot build http client: {e}")))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch(&self) -> Result<JwkSet, KeyError> {
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| KeyError::unavailable(format!("key set request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeyError::unavailable(format!(
                "key set endpoint returned {status}"
            )));
        }

        let raw: RawKeySet = response
            .json()
            .await
            .map_err(|e| KeyError::unavailable(format!("key set is not valid JSON: {e}")))?;

        let keys: Vec<Jwk> = raw
            .keys
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<Jwk>(value) {
                Ok(jwk) => Some(jwk),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unusable key set entry");
                    None
                }
            })
            .collect();

        Ok(JwkSet { keys })
    }
}

#[cfg(test)]
mod tests {
    use axum::{Json, Router, http::StatusCode, routing::get};
    use serde_json::json;

    use super::*;
    use crate::testing::TestServer;
    use sealgate_auth::testutil;

    fn source(srv: &TestServer) -> HttpKeySource {
        HttpKeySource::new(
            format!("{}/.well-known/jwks.json", srv.base_url),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn fetches_published_keys() {
        let body = serde_json::to_value(testutil::jwk_set(vec![
            testutil::rsa_primary_jwk("rsa-1", Some("RS256")),
            testutil::ec_jwk("ec-1"),
        ]))
        .unwrap();
        let srv = TestServer::spawn(Router::new().route(
            "/.well-known/jwks.json",
            get(move || async move { Json(body) }),
        ))
        .await;

        let keys = source(&srv).fetch().await.unwrap();
        assert_eq!(keys.keys.len(), 2);
        assert!(keys.find("rsa-1").is_some());
        assert!(keys.find("ec-1").is_some());
    }

    #[tokio::test]
    async fn skips_entries_it_cannot_read() {
        let mut body = serde_json::to_value(testutil::jwk_set(vec![testutil::rsa_primary_jwk(
            "rsa-1", None,
        )]))
        .unwrap();
        body["keys"]
            .as_array_mut()
            .unwrap()
            .push(json!({"kty": "quantum", "kid": "q-1"}));
        let srv = TestServer::spawn(Router::new().route(
            "/.well-known/jwks.json",
            get(move || async move { Json(body) }),
        ))
        .await;

        let keys = source(&srv).fetch().await.unwrap();
        assert_eq!(keys.keys.len(), 1);
        assert!(keys.find("rsa-1").is_some());
    }

    #[tokio::test]
    async fn error_status_is_unavailable() {
        let srv = TestServer::spawn(Router::new().route(
            "/.well-known/jwks.json",
            get(|| async { StatusCode::BAD_GATEWAY }),
        ))
        .await;

        let err = source(&srv).fetch().await.unwrap_err();
        assert!(matches!(err, KeyError::KeySourceUnavailable(msg) if msg.contains("502")));
    }

    #[tokio::test]
    async fn non_json_body_is_unavailable() {
        let srv = TestServer::spawn(Router::new().route(
            "/.well-known/jwks.json",
            get(|| async { "<html>maintenance</html>" }),
        ))
        .await;

        let err = source(&srv).fetch().await.unwrap_err();
        assert!(matches!(err, KeyError::KeySourceUnavailable(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_unavailable() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source = HttpKeySource::new(format!("http://{addr}/jwks"), Duration::from_secs(1)).unwrap();
        assert!(matches!(
            source.fetch().await,
            Err(KeyError::KeySourceUnavailable(_))
        ));
    }
}
