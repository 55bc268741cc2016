//! Batch transform dispatch.

use std::sync::Arc;

use thiserror::Error;

use crate::{CodecError, Direction, Namespace, PayloadBatch, PayloadCodec};

/// A codec failure while transforming a batch.
///
/// The message is the codec's own; `index` records which payload failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{source}")]
pub struct TransformError {
    pub index: usize,
    #[source]
    pub source: CodecError,
}

/// Applies a codec to whole batches.
///
/// The input batch is only borrowed, so a failure part-way through leaves the
/// caller holding the untouched original: a batch is either fully transformed
/// or not at all.
#[derive(Clone)]
pub struct TransformDispatcher {
    codec: Arc<dyn PayloadCodec>,
}

impl TransformDispatcher {
    pub fn new(codec: Arc<dyn PayloadCodec>) -> Self {
        Self { codec }
    }

    pub async fn apply(
        &self,
        direction: Direction,
        namespace: &Namespace,
        batch: &PayloadBatch,
    ) -> Result<PayloadBatch, TransformError> {
        let mut out = Vec::with_capacity(batch.len());

        for (index, payload) in batch.iter().enumerate() {
            let transformed = match direction {
                Direction::Encode => self.codec.encode(namespace, payload).await,
                Direction::Decode => self.codec.decode(namespace, payload).await,
            }
            .map_err(|source| {
                tracing::warn!(%direction, %namespace, index, error = %source, "payload transform failed");
                TransformError { index, source }
            })?;
            out.push(transformed);
        }

        Ok(PayloadBatch::new(out))
    }
}

impl core::fmt::Debug for TransformDispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TransformDispatcher").finish_non_exhaustive()
    }
}
