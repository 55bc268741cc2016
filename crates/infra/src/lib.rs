//! Infrastructure layer: network adapters and the reference payload codec.
//!
//! Implements the capability traits declared in `sealgate-auth` and
//! `sealgate-core` against real services.

pub mod cloud_ops;
pub mod codec;
pub mod jwks;

pub use cloud_ops::{CloudOpsDirectory, CloudOpsSettings};
pub use codec::{AesGcmCodec, ENCODING_ENCRYPTED, KeyRing, KeyRingError, METADATA_KEY_ID};
pub use jwks::HttpKeySource;

#[cfg(test)]
pub(crate) mod testing;
