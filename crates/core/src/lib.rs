//! `sealgate-core`: payload batch model and transform capability.
//!
//! Pure types and dispatch; no network or HTTP concerns.

pub mod codec;
pub mod direction;
pub mod error;
pub mod namespace;
pub mod payload;
pub mod transform;

pub use codec::{CodecError, PayloadCodec};
pub use direction::Direction;
pub use error::{CoreError, CoreResult};
pub use namespace::Namespace;
pub use payload::{METADATA_ENCODING, Payload, PayloadBatch};
pub use transform::{TransformDispatcher, TransformError};
