//! Shared error taxonomy and the extracted record type.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::extract::category::Category;

/// Errors surfaced by the ingestion pipeline.
///
/// Structural failures (index, checksum, collection settings) abort a run
/// before or instead of streaming; `CorruptBlock` is contained to one block
/// and `BatchFailed` to one batch so callers always learn which offset or
/// batch went wrong.
#[derive(Debug, Error)]
pub enum IngestError {
    /// An index line could not be parsed. Fatal before streaming starts.
    #[error("malformed index line {line}: {reason}")]
    MalformedIndex { line: usize, reason: String },

    /// A downloaded artifact failed its integrity check. The artifact is
    /// discarded.
    #[error("checksum mismatch for {artifact}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        artifact: String,
        expected: String,
        actual: String,
    },

    /// One block failed to decompress, decode, or parse. Recoverable: the
    /// stream continues past it when the skip policy is enabled.
    #[error("corrupt block at offset {offset}: {reason}")]
    CorruptBlock { offset: u64, reason: String },

    /// The target collection exists with settings incompatible with the
    /// configured dimensionality or distance metric.
    #[error("collection '{collection}' exists with incompatible settings: {reason}")]
    CollectionMismatch { collection: String, reason: String },

    /// The embedding provider errored or returned a malformed response.
    #[error("embedding provider failed: {0}")]
    EmbeddingProvider(String),

    /// Parallel id/vector/payload lists disagree in length.
    #[error("ids, vectors, and payloads must have the same length (ids={ids}, vectors={vectors}, payloads={payloads})")]
    ShapeMismatch {
        ids: usize,
        vectors: usize,
        payloads: usize,
    },

    /// One embed-and-upsert batch failed; nothing from it was committed.
    #[error("batch {batch} of block at offset {offset} failed: {source}")]
    BatchFailed {
        offset: u64,
        batch: usize,
        #[source]
        source: Box<IngestError>,
    },

    /// Vector store request or response error.
    #[error("vector store error: {0}")]
    Storage(String),

    /// Tokenizer construction or decode error.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// One extracted content item: a classified page with plain-text body.
///
/// Records missing id, title, or body never get this far; the extractor
/// drops them silently before classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    /// Page id from the dump; unique across the dump and stable across runs.
    pub id: u64,
    pub title: String,
    /// Body text with all markup stripped.
    pub body: String,
    pub category: Category,
    /// Upload-host URL derived from the infobox image parameter, if any.
    pub image: Option<String>,
}
