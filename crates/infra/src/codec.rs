//! AES-256-GCM payload codec with per-namespace data keys.
//!
//! Each namespace gets its own data key, derived from one master secret as
//! `HMAC-SHA256(master, "sealgate/data-key/v1/" + namespace)`. An encoded
//! payload carries:
//!
//! - `encoding = binary/encrypted`
//! - `encryption-key-id = <namespace>.<fingerprint>`
//! - data = 12-byte nonce followed by the ciphertext of the JSON-serialised
//!   original payload (metadata included)

use async_trait::async_trait;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use thiserror::Error;

use sealgate_core::{CodecError, METADATA_ENCODING, Namespace, Payload, PayloadCodec};

pub const ENCODING_ENCRYPTED: &str = "binary/encrypted";
pub const METADATA_KEY_ID: &str = "encryption-key-id";

const KEY_DERIVATION_PREFIX: &str = "sealgate/data-key/v1/";
const MASTER_KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyRingError {
    #[error("master key is not valid base64")]
    NotBase64,

    #[error("master key must be {MASTER_KEY_LEN} bytes, got {0}")]
    WrongLength(usize),
}

/// Holds the master secret and derives namespace data keys from it.
#[derive(Clone)]
pub struct KeyRing {
    master: [u8; MASTER_KEY_LEN],
}

impl core::fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("KeyRing(..)")
    }
}

struct DataKey {
    id: String,
    cipher: Aes256Gcm,
}

impl KeyRing {
    pub fn new(master: [u8; MASTER_KEY_LEN]) -> Self {
        Self { master }
    }

    pub fn from_base64(encoded: &str) -> Result<Self, KeyRingError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|_| KeyRingError::NotBase64)?;
        let master: [u8; MASTER_KEY_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyRingError::WrongLength(bytes.len()))?;
        Ok(Self::new(master))
    }

    /// Identifier stamped on payloads encoded for `namespace`.
    pub fn key_id(&self, namespace: &Namespace) -> Result<String, CodecError> {
        Ok(self.data_key(namespace)?.id)
    }

    fn data_key(&self, namespace: &Namespace) -> Result<DataKey, CodecError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.master)
            .map_err(|e| CodecError::Encrypt(format!("key derivation: {e}")))?;
        mac.update(KEY_DERIVATION_PREFIX.as_bytes());
        mac.update(namespace.as_str().as_bytes());
        let key = mac.finalize().into_bytes();

        let fingerprint: String = Sha256::digest(key)
            .iter()
            .take(8)
            .map(|b| format!("{b:02x}"))
            .collect();
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| CodecError::Encrypt(format!("data key: {e}")))?;

        Ok(DataKey {
            id: format!("{namespace}.{fingerprint}"),
            cipher,
        })
    }
}

/// Reference [`PayloadCodec`]: authenticated encryption under namespace keys.
#[derive(Debug, Clone)]
pub struct AesGcmCodec {
    keys: KeyRing,
}

impl AesGcmCodec {
    pub fn new(keys: KeyRing) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl PayloadCodec for AesGcmCodec {
    async fn encode(&self, namespace: &Namespace, payload: &Payload) -> Result<Payload, CodecError> {
        let key = self.keys.data_key(namespace)?;
        let plaintext =
            serde_json::to_vec(payload).map_err(|e| CodecError::Encrypt(e.to_string()))?;

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = key
            .cipher
            .encrypt(&nonce, plaintext.as_slice())
            .map_err(|_| CodecError::Encrypt("cipher rejected the payload".into()))?;

        let mut data = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        data.extend_from_slice(&nonce);
        data.extend_from_slice(&ciphertext);

        Ok(Payload::new(Default::default(), data)
            .with_metadata(METADATA_ENCODING, ENCODING_ENCRYPTED)
            .with_metadata(METADATA_KEY_ID, key.id))
    }

    async fn decode(&self, namespace: &Namespace, payload: &Payload) -> Result<Payload, CodecError> {
        if payload.encoding() != Some(ENCODING_ENCRYPTED) {
            return Ok(payload.clone());
        }

        let key_id = payload
            .metadata_str(METADATA_KEY_ID)
            .ok_or_else(|| CodecError::Malformed(format!("missing {METADATA_KEY_ID}")))?;
        let key = self.keys.data_key(namespace)?;
        if key_id != key.id {
            return Err(CodecError::UnknownKey(key_id.to_string()));
        }

        if payload.data.len() < NONCE_LEN {
            return Err(CodecError::Malformed("data shorter than nonce".into()));
        }
        let (nonce, ciphertext) = payload.data.split_at(NONCE_LEN);
        let plaintext = key
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CodecError::Decrypt("ciphertext failed authentication".into()))?;

        serde_json::from_slice(&plaintext).map_err(|e| CodecError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> AesGcmCodec {
        AesGcmCodec::new(KeyRing::new([7u8; 32]))
    }

    fn ns(name: &str) -> Namespace {
        Namespace::parse(name).unwrap()
    }

    fn plain() -> Payload {
        Payload::new(Default::default(), b"{\"amount\":42}".to_vec())
            .with_metadata(METADATA_ENCODING, "json/plain")
    }

    #[tokio::test]
    async fn round_trip_restores_payload() {
        let c = codec();
        let encoded = c.encode(&ns("ns1"), &plain()).await.unwrap();

        assert_eq!(encoded.encoding(), Some(ENCODING_ENCRYPTED));
        assert!(encoded.metadata_str(METADATA_KEY_ID).unwrap().starts_with("ns1."));
        assert_ne!(encoded.data, plain().data);

        let decoded = c.decode(&ns("ns1"), &encoded).await.unwrap();
        assert_eq!(decoded, plain());
    }

    #[tokio::test]
    async fn nonces_are_fresh_per_encode() {
        let c = codec();
        let a = c.encode(&ns("ns1"), &plain()).await.unwrap();
        let b = c.encode(&ns("ns1"), &plain()).await.unwrap();
        assert_ne!(a.data, b.data);
    }

    #[tokio::test]
    async fn other_namespace_key_is_unknown() {
        let c = codec();
        let encoded = c.encode(&ns("ns1"), &plain()).await.unwrap();
        let err = c.decode(&ns("ns2"), &encoded).await.unwrap_err();
        assert!(matches!(err, CodecError::UnknownKey(id) if id.starts_with("ns1.")));
    }

    #[tokio::test]
    async fn tampered_ciphertext_fails_authentication() {
        let c = codec();
        let mut encoded = c.encode(&ns("ns1"), &plain()).await.unwrap();
        let last = encoded.data.len() - 1;
        encoded.data[last] ^= 0x01;

        let err = c.decode(&ns("ns1"), &encoded).await.unwrap_err();
        assert_eq!(err, CodecError::Decrypt("ciphertext failed authentication".into()));
    }

    #[tokio::test]
    async fn different_master_cannot_decode() {
        let encoded = codec().encode(&ns("ns1"), &plain()).await.unwrap();
        let other = AesGcmCodec::new(KeyRing::new([9u8; 32]));
        assert!(matches!(
            other.decode(&ns("ns1"), &encoded).await,
            Err(CodecError::UnknownKey(_))
        ));
    }

    #[tokio::test]
    async fn unencrypted_payload_passes_through_decode() {
        let p = plain();
        assert_eq!(codec().decode(&ns("ns1"), &p).await.unwrap(), p);
    }

    #[tokio::test]
    async fn truncated_or_unlabelled_payload_is_malformed() {
        let c = codec();
        let short = Payload::new(Default::default(), vec![1, 2, 3])
            .with_metadata(METADATA_ENCODING, ENCODING_ENCRYPTED)
            .with_metadata(METADATA_KEY_ID, c.keys.key_id(&ns("ns1")).unwrap());
        assert!(matches!(c.decode(&ns("ns1"), &short).await, Err(CodecError::Malformed(_))));

        let unlabelled = Payload::new(Default::default(), vec![0; 40])
            .with_metadata(METADATA_ENCODING, ENCODING_ENCRYPTED);
        assert!(matches!(c.decode(&ns("ns1"), &unlabelled).await, Err(CodecError::Malformed(_))));
    }

    #[test]
    fn master_key_parsing() {
        let encoded = STANDARD.encode([1u8; 32]);
        assert!(KeyRing::from_base64(&encoded).is_ok());
        assert_eq!(
            KeyRing::from_base64(&STANDARD.encode([1u8; 16])).unwrap_err(),
            KeyRingError::WrongLength(16)
        );
        assert_eq!(KeyRing::from_base64("%%%").unwrap_err(), KeyRingError::NotBase64);
    }

    #[test]
    fn key_ids_are_stable_and_namespace_specific() {
        let keys = KeyRing::new([3u8; 32]);
        assert_eq!(keys.key_id(&ns("a")).unwrap(), keys.key_id(&ns("a")).unwrap());
        assert_ne!(keys.key_id(&ns("a")).unwrap(), keys.key_id(&ns("b")).unwrap());
    }
}
