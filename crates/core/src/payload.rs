//! Payloads and payload batches.
//!
//! The JSON form follows the protobuf JSON mapping workflow clients speak:
//!
//! ```json
//! {"payloads": [{"metadata": {"encoding": "anNvbi9wbGFpbg=="}, "data": "eyJhIjoxfQ=="}]}
//! ```
//!
//! Both metadata values and `data` are byte strings carried as base64. Standard
//! and URL-safe alphabets are accepted on input, with or without padding; output
//! always uses the padded standard alphabet.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Metadata key naming how a payload's data is encoded.
pub const METADATA_ENCODING: &str = "encoding";

/// A single opaque payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Payload {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty", with = "b64_map")]
    pub metadata: BTreeMap<String, Vec<u8>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "b64_bytes")]
    pub data: Vec<u8>,
}

impl Payload {
    pub fn new(metadata: BTreeMap<String, Vec<u8>>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            metadata,
            data: data.into(),
        }
    }

    /// Builder-style metadata insertion.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Metadata value as UTF-8, if present and valid.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(|v| std::str::from_utf8(v).ok())
    }

    pub fn encoding(&self) -> Option<&str> {
        self.metadata_str(METADATA_ENCODING)
    }
}

/// Ordered batch of payloads; the unit of transformation.
///
/// Order is significant and is preserved through every transform.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PayloadBatch {
    #[serde(default)]
    pub payloads: Vec<Payload>,
}

impl PayloadBatch {
    pub fn new(payloads: Vec<Payload>) -> Self {
        Self { payloads }
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Payload> {
        self.payloads.iter()
    }

    /// Parse a request body.
    pub fn from_json(body: &[u8]) -> CoreResult<Self> {
        serde_json::from_slice(body).map_err(|e| CoreError::malformed_batch(e.to_string()))
    }

    /// Serialize for a response body.
    pub fn to_json(&self) -> CoreResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| CoreError::malformed_batch(e.to_string()))
    }
}

impl From<Vec<Payload>> for PayloadBatch {
    fn from(payloads: Vec<Payload>) -> Self {
        Self::new(payloads)
    }
}

pub(crate) fn decode_base64(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};

    STANDARD
        .decode(s)
        .or_else(|_| STANDARD_NO_PAD.decode(s))
        .or_else(|_| URL_SAFE.decode(s))
        .or_else(|_| URL_SAFE_NO_PAD.decode(s))
}

pub(crate) fn encode_base64(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

mod b64_bytes {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&super::encode_base64(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        super::decode_base64(&s).map_err(D::Error::custom)
    }
}

mod b64_map {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serializer, de::Error as _, ser::SerializeMap};

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<String, Vec<u8>>,
        ser: S,
    ) -> Result<S::Ok, S::Error> {
        let mut out = ser.serialize_map(Some(map.len()))?;
        for (k, v) in map {
            out.serialize_entry(k, &super::encode_base64(v))?;
        }
        out.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        de: D,
    ) -> Result<BTreeMap<String, Vec<u8>>, D::Error> {
        let raw = BTreeMap::<String, String>::deserialize(de)?;
        raw.into_iter()
            .map(|(k, v)| {
                super::decode_base64(&v)
                    .map(|bytes| (k.clone(), bytes))
                    .map_err(|e| D::Error::custom(format!("metadata '{k}': {e}")))
            })
            .collect()
    }
}
