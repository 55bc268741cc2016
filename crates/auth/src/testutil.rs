//! Fixed test keys, token minting, and in-memory key/role sources.
//!
//! Compiled for this crate's tests and, through the `testutil` feature, for
//! downstream test suites. Never enable the feature in production builds.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};

use crate::{AuthorityError, KeyError, KeySource, RoleDirectory, UserRecord};

const RSA_PRIMARY_PEM: &str = include_str!("testutil/rsa_primary.pem");
const RSA_PRIMARY_PUBLIC_PEM: &str = include_str!("testutil/rsa_primary_pub.pem");
const RSA_ROTATED_PEM: &str = include_str!("testutil/rsa_rotated.pem");
const EC_P256_PEM: &str = include_str!("testutil/ec_p256.pem");

const RSA_PRIMARY_N: &str = "03TYtuGeMjJl-RdqDTWQgWecGBlr-XLw8cbTogKl5huQ8xTqPacUCPTqmtHpFKhc1wXrBG1oQpQh3fdy9-LzZZkLsl4cgshQ2vzMjn7tNmfpj96f295zQIKBC7XgpRW8hFm9GjALNxf12t_HX3vYR0w-f6V987PGn6yb-BbYepgA_hjz2zoNRwBVzCo-S90XAEXhI8Q4fmNZeNlIeJ76FMa5AcM-rZap8qP20zdX91tUaRLIbAp-h_vAnArTBPjdPuhUoGqrg_uIcehA2-eAXgLqSVzwYXP0hqWY1tTe08qBEDMgLLAWa4frpCotVivxtnhGj2NdrDnHPegZcHiJOQ";
const RSA_ROTATED_N: &str = "vTMEsMrGryIL59kOeZbsXetDSQUDXnG1PXgrIxmd55sF0FoYisshBdcm4g5lIgR8wb6bPRTqV6ecal-kZ-cXC9hQWDRTvCC7o4oyuQ6OA54SiDpeJurUQwA7TJqXXengE9fKjnyiTrJnAyrnT7Qvco6kZOV8pupXg4hqlFrqjr4xgsJNG2cyaBxMoCtCF2pw4fE6tiZFlot0KP60u12GqkLIb2Ny4xa76FDO1VqaEr04gkymKSzXbsDGWiDZh99CMd7IdvxguJNJQ4KEUWDQdr7BDxwnl5rlUip3zuqN5EmboozCclwMP2x05FPUBvHxyvxOmWKr_XgNxza_rirelw";
const RSA_E: &str = "AQAB";
const EC_P256_X: &str = "ak2vbySSJ7A687X6dHWnpcTJzYY02G0LsjtkFjFnV-M";
const EC_P256_Y: &str = "VL862osZ4a8k6VNtwibvNFrpleCSfuy2gUa58kByf40";

/// Private keys available for signing test tokens.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TestKey {
    RsaPrimary,
    RsaRotated,
    EcP256,
}

impl TestKey {
    pub fn encoding_key(&self) -> EncodingKey {
        let key = match self {
            TestKey::RsaPrimary => EncodingKey::from_rsa_pem(RSA_PRIMARY_PEM.as_bytes()),
            TestKey::RsaRotated => EncodingKey::from_rsa_pem(RSA_ROTATED_PEM.as_bytes()),
            TestKey::EcP256 => EncodingKey::from_ec_pem(EC_P256_PEM.as_bytes()),
        };
        key.expect("fixture key parses")
    }
}

/// Sign `claims` with `key` under `alg`, stamping `kid` into the header.
pub fn mint(key: TestKey, alg: Algorithm, kid: Option<&str>, claims: &Value) -> String {
    let mut header = Header::new(alg);
    header.kid = kid.map(str::to_string);
    jsonwebtoken::encode(&header, claims, &key.encoding_key()).expect("token encodes")
}

/// HS256 token keyed with the primary RSA public key PEM (algorithm-confusion probe).
pub fn mint_hs256_with_public_pem(kid: Option<&str>, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_secret(RSA_PRIMARY_PUBLIC_PEM.as_bytes());
    jsonwebtoken::encode(&header, claims, &key).expect("token encodes")
}

pub fn jwk(value: Value) -> Jwk {
    serde_json::from_value(value).expect("fixture jwk parses")
}

fn rsa_jwk(kid: &str, n: &str, alg: Option<&str>) -> Jwk {
    let mut v = json!({ "kty": "RSA", "use": "sig", "kid": kid, "n": n, "e": RSA_E });
    if let Some(alg) = alg {
        v["alg"] = json!(alg);
    }
    jwk(v)
}

pub fn rsa_primary_jwk(kid: &str, alg: Option<&str>) -> Jwk {
    rsa_jwk(kid, RSA_PRIMARY_N, alg)
}

pub fn rsa_rotated_jwk(kid: &str, alg: Option<&str>) -> Jwk {
    rsa_jwk(kid, RSA_ROTATED_N, alg)
}

pub fn ec_jwk(kid: &str) -> Jwk {
    jwk(json!({
        "kty": "EC", "use": "sig", "crv": "P-256", "kid": kid,
        "x": EC_P256_X, "y": EC_P256_Y,
    }))
}

pub fn jwk_set(keys: Vec<Jwk>) -> JwkSet {
    JwkSet { keys }
}

/// In-memory key source with fetch counting and failure injection.
#[derive(Debug)]
pub struct StaticKeySource {
    keys: Mutex<JwkSet>,
    failure: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
    fetches: AtomicUsize,
}

impl StaticKeySource {
    pub fn new(keys: JwkSet) -> Self {
        Self {
            keys: Mutex::new(keys),
            failure: Mutex::new(None),
            delay: Mutex::new(None),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn replace(&self, keys: JwkSet) {
        *self.keys.lock().unwrap() = keys;
    }

    pub fn fail_with(&self, msg: &str) {
        *self.failure.lock().unwrap() = Some(msg.to_string());
    }

    pub fn delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn fetch(&self) -> Result<JwkSet, KeyError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(msg) = self.failure.lock().unwrap().clone() {
            return Err(KeyError::unavailable(msg));
        }
        Ok(self.keys.lock().unwrap().clone())
    }
}

/// In-memory role directory with call counting and failure injection.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    users: Mutex<Vec<UserRecord>>,
    failure: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl StaticDirectory {
    pub fn new(users: Vec<UserRecord>) -> Self {
        Self {
            users: Mutex::new(users),
            ..Default::default()
        }
    }

    pub fn fail_with(&self, msg: &str) {
        *self.failure.lock().unwrap() = Some(msg.to_string());
    }

    pub fn delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoleDirectory for StaticDirectory {
    async fn list_users(&self) -> Result<Vec<UserRecord>, AuthorityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(msg) = self.failure.lock().unwrap().clone() {
            return Err(AuthorityError::unavailable(msg));
        }
        Ok(self.users.lock().unwrap().clone())
    }
}
