//! ```text
//! Index file ──► dump::index::load_stream_offsets ──► sorted block offsets
//!                                                        │
//! Dump file ──► dump::BlockStream ──► decoded block text │
//!                       │                                │
//!                       ▼                                ▼
//! extract::extract_records ──► classified PageRecords (per block)
//!                       │
//!                       ▼
//! embeddings::EmbeddingBatcher ──► token-bounded batches ──► vectors
//!                       │
//!                       ▼
//! stores::VectorSink ──► idempotent by-id upserts ──► vector collection
//! ```
//!
//! The whole pipeline is driven sequentially by [`pipeline::IngestPipeline`];
//! no stage holds more than one block's records or one batch's vectors.

pub mod config;
pub mod dump;
pub mod embeddings;
pub mod extract;
pub mod pipeline;
pub mod stores;
pub mod types;

pub use config::{ImagePolicy, IngestConfig};
pub use pipeline::{IngestPipeline, IngestReport};
pub use types::{IngestError, PageRecord};
