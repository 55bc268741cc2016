//! Trust-authority key set resolution.
//!
//! A [`KeySource`] produces the authority's published JWK set; the
//! [`KeySetResolver`] selects a key by id and binds it to the signature
//! algorithms it may be used with.
//!
//! Without a cache every resolution fetches the set afresh, so rotated keys
//! are picked up immediately. With a cache, a key id missing from a fresh
//! cached set forces exactly one refetch before `KeyNotFound` is returned.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::KeyError;

/// Where the published key set comes from.
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn fetch(&self) -> Result<JwkSet, KeyError>;
}

/// A verification key bound to the algorithms it may verify.
#[derive(Clone)]
pub struct KeyEntry {
    pub kid: String,
    pub algorithms: Vec<Algorithm>,
    pub key: DecodingKey,
}

impl core::fmt::Debug for KeyEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyEntry")
            .field("kid", &self.kid)
            .field("algorithms", &self.algorithms)
            .finish_non_exhaustive()
    }
}

impl KeyEntry {
    /// Bind a published key to its algorithms.
    ///
    /// A declared `alg` on the key wins; otherwise the key type decides.
    /// Symmetric keys are rejected outright.
    pub fn from_jwk(kid: &str, jwk: &Jwk) -> Result<Self, KeyError> {
        let unsupported = |reason: String| KeyError::UnsupportedKey {
            kid: kid.to_string(),
            reason,
        };

        let family: &[Algorithm] = match &jwk.algorithm {
            AlgorithmParameters::RSA(_) => &[
                Algorithm::RS256,
                Algorithm::RS384,
                Algorithm::RS512,
                Algorithm::PS256,
                Algorithm::PS384,
                Algorithm::PS512,
            ],
            AlgorithmParameters::EllipticCurve(params) => match params.curve {
                EllipticCurve::P256 => &[Algorithm::ES256],
                EllipticCurve::P384 => &[Algorithm::ES384],
                ref other => return Err(unsupported(format!("curve {other:?}"))),
            },
            AlgorithmParameters::OctetKeyPair(params) => match params.curve {
                EllipticCurve::Ed25519 => &[Algorithm::EdDSA],
                ref other => return Err(unsupported(format!("curve {other:?}"))),
            },
            AlgorithmParameters::OctetKey(_) => {
                return Err(unsupported("symmetric keys are not accepted".into()));
            }
        };

        let algorithms = match jwk.common.key_algorithm.clone() {
            None => family.to_vec(),
            Some(declared) => {
                let alg = signing_algorithm(&declared)
                    .ok_or_else(|| unsupported(format!("{declared:?} is not a signature algorithm")))?;
                if !family.contains(&alg) {
                    return Err(unsupported(format!(
                        "declared {alg:?} does not fit the key type"
                    )));
                }
                vec![alg]
            }
        };

        let key = DecodingKey::from_jwk(jwk).map_err(|e| unsupported(e.to_string()))?;

        Ok(Self {
            kid: kid.to_string(),
            algorithms,
            key,
        })
    }
}

fn signing_algorithm(alg: &KeyAlgorithm) -> Option<Algorithm> {
    match alg {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}

struct CachedSet {
    keys: Arc<JwkSet>,
    fetched_at: Instant,
}

/// Shortest gap between an unknown-kid refresh and the fetch before it.
pub const DEFAULT_REFRESH_FLOOR: Duration = Duration::from_secs(30);

struct KeyCache {
    ttl: Duration,
    refresh_floor: Duration,
    slot: RwLock<Option<CachedSet>>,
}

impl KeyCache {
    /// The cached set while within ttl, and whether it may be force-refreshed.
    async fn fresh(&self) -> Option<(Arc<JwkSet>, bool)> {
        let slot = self.slot.read().await;
        slot.as_ref()
            .filter(|c| c.fetched_at.elapsed() < self.ttl)
            .map(|c| {
                let refreshable = c.fetched_at.elapsed() >= self.refresh_floor;
                (Arc::clone(&c.keys), refreshable)
            })
    }

    async fn store(&self, keys: Arc<JwkSet>) {
        *self.slot.write().await = Some(CachedSet {
            keys,
            fetched_at: Instant::now(),
        });
    }
}

/// Resolves key ids against the trust authority's key set.
pub struct KeySetResolver {
    source: Arc<dyn KeySource>,
    timeout: Duration,
    cache: Option<KeyCache>,
}

impl KeySetResolver {
    /// Uncached resolver: every call fetches the key set.
    pub fn new(source: Arc<dyn KeySource>, timeout: Duration) -> Self {
        Self {
            source,
            timeout,
            cache: None,
        }
    }

    /// Cache fetched sets for `ttl`. A zero ttl leaves the resolver uncached.
    pub fn with_cache(mut self, ttl: Duration) -> Self {
        self.cache = (!ttl.is_zero()).then(|| KeyCache {
            ttl,
            refresh_floor: DEFAULT_REFRESH_FLOOR,
            slot: RwLock::new(None),
        });
        self
    }

    /// An unknown kid refetches the set only once the cached copy is at least
    /// `floor` old. No effect on an uncached resolver.
    pub fn with_refresh_floor(mut self, floor: Duration) -> Self {
        if let Some(cache) = &mut self.cache {
            cache.refresh_floor = floor;
        }
        self
    }

    pub async fn resolve(&self, kid: &str) -> Result<KeyEntry, KeyError> {
        let Some(cache) = &self.cache else {
            let keys = self.fetch().await?;
            return select(&keys, kid);
        };

        if let Some((keys, refreshable)) = cache.fresh().await {
            if let Some(jwk) = keys.find(kid) {
                return KeyEntry::from_jwk(kid, jwk);
            }
            if !refreshable {
                tracing::debug!(kid, "key id not in cached set; refreshed too recently");
                return Err(KeyError::not_found(kid));
            }
            tracing::debug!(kid, "key id not in cached set; refreshing");
        }

        let keys = self.fetch().await?;
        cache.store(Arc::clone(&keys)).await;
        select(&keys, kid)
    }

    async fn fetch(&self) -> Result<Arc<JwkSet>, KeyError> {
        let keys = tokio::time::timeout(self.timeout, self.source.fetch())
            .await
            .map_err(|_| {
                KeyError::unavailable(format!("key set fetch timed out after {:?}", self.timeout))
            })??;
        tracing::debug!(keys = keys.keys.len(), "fetched key set");
        Ok(Arc::new(keys))
    }
}

fn select(keys: &JwkSet, kid: &str) -> Result<KeyEntry, KeyError> {
    let jwk = keys.find(kid).ok_or_else(|| KeyError::not_found(kid))?;
    KeyEntry::from_jwk(kid, jwk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{self, StaticKeySource};

    fn resolver(source: &Arc<StaticKeySource>) -> KeySetResolver {
        KeySetResolver::new(source.clone(), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn resolves_known_kid() {
        let source = Arc::new(StaticKeySource::new(testutil::jwk_set(vec![
            testutil::rsa_primary_jwk("k1", Some("RS256")),
        ])));

        let entry = resolver(&source).resolve("k1").await.unwrap();
        assert_eq!(entry.kid, "k1");
        assert_eq!(entry.algorithms, vec![Algorithm::RS256]);
    }

    #[tokio::test]
    async fn unknown_kid_is_not_found() {
        let source = Arc::new(StaticKeySource::new(testutil::jwk_set(vec![
            testutil::rsa_primary_jwk("k1", None),
        ])));

        let err = resolver(&source).resolve("missing").await.unwrap_err();
        assert_eq!(err, KeyError::not_found("missing"));
    }

    #[tokio::test]
    async fn source_failure_is_unavailable() {
        let source = Arc::new(StaticKeySource::new(testutil::jwk_set(vec![])));
        source.fail_with("connection refused");

        let err = resolver(&source).resolve("k1").await.unwrap_err();
        assert!(matches!(err, KeyError::KeySourceUnavailable(_)));
    }

    #[tokio::test]
    async fn slow_source_times_out() {
        let source = Arc::new(StaticKeySource::new(testutil::jwk_set(vec![])));
        source.delay(Duration::from_millis(200));

        let resolver = KeySetResolver::new(source.clone(), Duration::from_millis(20));
        let err = resolver.resolve("k1").await.unwrap_err();
        assert!(matches!(err, KeyError::KeySourceUnavailable(msg) if msg.contains("timed out")));
    }

    #[tokio::test]
    async fn uncached_resolver_fetches_every_time() {
        let source = Arc::new(StaticKeySource::new(testutil::jwk_set(vec![
            testutil::rsa_primary_jwk("k1", None),
        ])));
        let resolver = resolver(&source);

        resolver.resolve("k1").await.unwrap();
        resolver.resolve("k1").await.unwrap();
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn cached_resolver_refreshes_once_on_rotation() {
        let source = Arc::new(StaticKeySource::new(testutil::jwk_set(vec![
            testutil::rsa_primary_jwk("k1", None),
        ])));
        let resolver = resolver(&source)
            .with_cache(Duration::from_secs(300))
            .with_refresh_floor(Duration::ZERO);

        resolver.resolve("k1").await.unwrap();
        resolver.resolve("k1").await.unwrap();
        assert_eq!(source.fetch_count(), 1);

        // Authority rotates to k2.
        source.replace(testutil::jwk_set(vec![
            testutil::rsa_primary_jwk("k1", None),
            testutil::rsa_rotated_jwk("k2", None),
        ]));
        resolver.resolve("k2").await.unwrap();
        assert_eq!(source.fetch_count(), 2);

        // A kid that never appears costs exactly one refresh.
        let err = resolver.resolve("ghost").await.unwrap_err();
        assert_eq!(err, KeyError::not_found("ghost"));
        assert_eq!(source.fetch_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_kids_do_not_refetch_within_refresh_floor() {
        let source = Arc::new(StaticKeySource::new(testutil::jwk_set(vec![
            testutil::rsa_primary_jwk("k1", None),
        ])));
        let resolver = resolver(&source)
            .with_cache(Duration::from_secs(300))
            .with_refresh_floor(Duration::from_secs(30));

        resolver.resolve("k1").await.unwrap();
        for kid in ["ghost-1", "ghost-2", "ghost-3"] {
            let err = resolver.resolve(kid).await.unwrap_err();
            assert_eq!(err, KeyError::not_found(kid));
        }
        assert_eq!(source.fetch_count(), 1);

        source.replace(testutil::jwk_set(vec![
            testutil::rsa_primary_jwk("k1", None),
            testutil::rsa_rotated_jwk("k2", None),
        ]));
        tokio::time::advance(Duration::from_secs(31)).await;

        resolver.resolve("k2").await.unwrap();
        assert_eq!(source.fetch_count(), 2);
        assert!(resolver.resolve("ghost-4").await.is_err());
        assert_eq!(source.fetch_count(), 2);
    }

    #[test]
    fn binds_algorithm_from_key_type_when_undeclared() {
        let rsa = KeyEntry::from_jwk("r", &testutil::rsa_primary_jwk("r", None)).unwrap();
        assert!(rsa.algorithms.contains(&Algorithm::RS256));
        assert!(rsa.algorithms.contains(&Algorithm::PS512));
        assert!(!rsa.algorithms.contains(&Algorithm::ES256));

        let ec = KeyEntry::from_jwk("e", &testutil::ec_jwk("e")).unwrap();
        assert_eq!(ec.algorithms, vec![Algorithm::ES256]);
    }

    #[test]
    fn rejects_symmetric_and_mismatched_keys() {
        let oct = testutil::jwk(serde_json::json!({
            "kty": "oct", "kid": "s", "k": "c2VjcmV0"
        }));
        assert!(matches!(
            KeyEntry::from_jwk("s", &oct),
            Err(KeyError::UnsupportedKey { .. })
        ));

        // RSA key claiming an EC algorithm.
        let lying = testutil::rsa_primary_jwk("r", Some("ES256"));
        assert!(matches!(
            KeyEntry::from_jwk("r", &lying),
            Err(KeyError::UnsupportedKey { .. })
        ));
    }
}
