//! Chunked streaming in both directions.
//!
//! Outbound, a serialized inference result is cut into fixed-size byte
//! chunks. Inbound, a training upload arrives as a sequence of chunks whose
//! first element carries the request metadata.

use super::processor::TrainingRequest;
use crate::error::{Error, Result};
use crate::storage::model_ref::non_empty;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use std::collections::BTreeMap;
use std::iter::FusedIterator;
use tracing::debug;

/// One outbound chunk of an inference result.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultChunk {
    pub data: Bytes,
    pub chunk_id: u32,
    pub total_chunks: u32,
    pub is_last_chunk: bool,
    pub success: bool,
    pub error_message: String,
    /// Only set on the last chunk
    pub confidence: f64,
    /// Only set on the last chunk
    pub metadata: BTreeMap<String, String>,
}

enum Source {
    Payload {
        payload: Bytes,
        chunk_size: usize,
        confidence: f64,
        metadata: BTreeMap<String, String>,
    },
    Failure {
        message: String,
    },
}

/// Chunks of one streamed result, in order.
pub struct ResultChunks {
    source: Source,
    next: usize,
    total: usize,
}

impl ResultChunks {
    pub fn total_chunks(&self) -> usize {
        self.total
    }
}

impl Iterator for ResultChunks {
    type Item = ResultChunk;

    fn next(&mut self) -> Option<ResultChunk> {
        if self.next >= self.total {
            return None;
        }
        let index = self.next;
        self.next += 1;
        let is_last_chunk = self.next == self.total;

        let chunk = match &mut self.source {
            Source::Payload {
                payload,
                chunk_size,
                confidence,
                metadata,
            } => {
                let start = (index * *chunk_size).min(payload.len());
                let end = (start + *chunk_size).min(payload.len());
                ResultChunk {
                    data: payload.slice(start..end),
                    chunk_id: index as u32,
                    total_chunks: self.total as u32,
                    is_last_chunk,
                    success: true,
                    error_message: String::new(),
                    confidence: if is_last_chunk { *confidence } else { 0.0 },
                    metadata: if is_last_chunk {
                        std::mem::take(metadata)
                    } else {
                        BTreeMap::new()
                    },
                }
            }
            Source::Failure { message } => ResultChunk {
                data: Bytes::new(),
                chunk_id: 0,
                total_chunks: 1,
                is_last_chunk: true,
                success: false,
                error_message: std::mem::take(message),
                confidence: 0.0,
                metadata: BTreeMap::new(),
            },
        };
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ResultChunks {}

impl FusedIterator for ResultChunks {}

/// Split `payload` into chunks of at most `chunk_size` bytes.
///
/// An empty payload still produces one (empty) final chunk.
pub fn produce_chunks(
    payload: impl Into<Bytes>,
    confidence: f64,
    metadata: BTreeMap<String, String>,
    chunk_size: usize,
) -> Result<ResultChunks> {
    if chunk_size == 0 {
        return Err(Error::invalid_argument("chunk_size must be at least 1"));
    }
    let payload = payload.into();
    let total = payload.len().div_ceil(chunk_size).max(1);
    debug!("Streaming {} bytes in {} chunks of {}", payload.len(), total, chunk_size);
    Ok(ResultChunks {
        source: Source::Payload {
            payload,
            chunk_size,
            confidence,
            metadata,
        },
        next: 0,
        total,
    })
}

/// The single chunk reporting a failed streamed request.
pub fn error_chunk(message: impl Into<String>) -> ResultChunks {
    ResultChunks {
        source: Source::Failure {
            message: message.into(),
        },
        next: 0,
        total: 1,
    }
}

/// One inbound chunk of a training upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingChunk {
    pub data: Bytes,
    pub is_first_chunk: bool,
    pub is_last_chunk: bool,
    pub model_name: String,
    pub hyperparameters: BTreeMap<String, String>,
    pub validate: bool,
    pub framework: String,
    pub initial_stage: String,
}

/// Reassemble a chunked training upload into one request.
///
/// Metadata is taken from the first chunk, which must be flagged
/// `is_first_chunk`; metadata on later chunks is ignored. Reading stops at
/// the first chunk flagged `is_last_chunk`.
pub async fn consume_chunks<S>(chunks: S) -> Result<TrainingRequest>
where
    S: Stream<Item = Result<TrainingChunk>>,
{
    futures::pin_mut!(chunks);

    let mut request: Option<TrainingRequest> = None;
    let mut buffer = BytesMut::new();
    let mut received = 0usize;

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        received += 1;

        if request.is_none() {
            if !chunk.is_first_chunk {
                return Err(Error::invalid_argument(
                    "First chunk must be flagged is_first_chunk and carry the training metadata",
                ));
            }
            request = Some(TrainingRequest {
                training_data: String::new(),
                model_name: chunk.model_name.clone(),
                hyperparameters: chunk.hyperparameters.clone(),
                validate: chunk.validate,
                framework: non_empty(&chunk.framework),
                initial_stage: non_empty(&chunk.initial_stage),
            });
        }

        buffer.extend_from_slice(&chunk.data);

        if chunk.is_last_chunk {
            let mut req = request
                .take()
                .ok_or_else(|| Error::internal("training metadata missing"))?;
            req.training_data = String::from_utf8(buffer.to_vec())
                .map_err(|_| Error::invalid_argument("Training data is not valid UTF-8"))?;
            debug!(
                "Reassembled {} bytes of training data for {} from {} chunks",
                req.training_data.len(),
                req.model_name,
                received
            );
            return Ok(req);
        }
    }

    Err(Error::invalid_argument(
        "Incomplete streaming data: no ending chunk received",
    ))
}
