//! The payload codec capability.
//!
//! The gateway never looks inside payloads; it hands each one to a codec keyed
//! by namespace. Implementations live outside this crate (see
//! `sealgate-infra` for the AES-GCM one).

use async_trait::async_trait;
use thiserror::Error;

use crate::{Namespace, Payload};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The payload names a data key this codec does not hold for the namespace.
    #[error("unknown data key '{0}'")]
    UnknownKey(String),

    #[error("encryption failed: {0}")]
    Encrypt(String),

    /// Ciphertext failed authentication or could not be decrypted.
    #[error("decryption failed: {0}")]
    Decrypt(String),

    /// An encoded payload does not have the expected layout.
    #[error("malformed encoded payload: {0}")]
    Malformed(String),
}

/// Per-payload encode/decode, scoped to a namespace.
///
/// `decode(encode(p)) == p` must hold for every payload under the same
/// namespace.
#[async_trait]
pub trait PayloadCodec: Send + Sync {
    async fn encode(&self, namespace: &Namespace, payload: &Payload) -> Result<Payload, CodecError>;

    async fn decode(&self, namespace: &Namespace, payload: &Payload) -> Result<Payload, CodecError>;
}
