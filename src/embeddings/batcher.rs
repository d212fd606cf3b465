//! Token-bounded batching for embedding calls.

use std::sync::Arc;

use tiktoken_rs::{CoreBPE, cl100k_base};
use tracing::debug;

use crate::types::{IngestError, PageRecord};

use super::EmbeddingProvider;

/// Groups records into provider-sized batches and enforces the per-record
/// token budget.
///
/// Truncation is encode-then-truncate-then-decode: the body is tokenized,
/// cut at the budget, and decoded back to text. A cut that lands inside a
/// multi-byte sequence backs off token by token until the decode is valid,
/// so truncated text never carries encoding artifacts.
pub struct EmbeddingBatcher {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    max_tokens: usize,
    bpe: CoreBPE,
}

impl EmbeddingBatcher {
    /// The effective batch size is the configured size clamped to the
    /// provider's per-call maximum.
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
        max_tokens: usize,
    ) -> Result<Self, IngestError> {
        let bpe = cl100k_base().map_err(|err| IngestError::Tokenizer(err.to_string()))?;
        let batch_size = batch_size.clamp(1, provider.max_batch_size());
        Ok(Self {
            provider,
            batch_size,
            max_tokens,
            bpe,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Truncates `text` to at most the configured token budget.
    pub fn truncate(&self, text: &str) -> Result<String, IngestError> {
        let tokens = self.bpe.encode_ordinary(text);
        if tokens.len() <= self.max_tokens {
            return Ok(text.to_string());
        }

        let mut end = self.max_tokens;
        while end > 0 {
            if let Ok(decoded) = self.bpe.decode(tokens[..end].to_vec()) {
                debug!(tokens = tokens.len(), kept = end, "body truncated");
                return Ok(decoded);
            }
            end -= 1;
        }
        Ok(String::new())
    }

    /// Embeds one batch of records, preserving order: `vector[i]` pairs with
    /// `records[i]`. Any provider error, count mismatch, or dimensionality
    /// mismatch fails the whole batch; nothing is partially returned.
    pub async fn embed(&self, records: &[PageRecord]) -> Result<Vec<Vec<f32>>, IngestError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        if records.len() > self.batch_size {
            return Err(IngestError::EmbeddingProvider(format!(
                "batch of {} exceeds configured max {}",
                records.len(),
                self.batch_size
            )));
        }

        let texts = records
            .iter()
            .map(|record| self.truncate(&record.body))
            .collect::<Result<Vec<_>, _>>()?;

        let vectors = self.provider.embed_batch(&texts).await?;
        if vectors.len() != records.len() {
            return Err(IngestError::EmbeddingProvider(format!(
                "provider returned {} vectors for {} inputs",
                vectors.len(),
                records.len()
            )));
        }
        let dimension = self.provider.dimension();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(IngestError::EmbeddingProvider(format!(
                "provider returned a {}-dimensional vector, expected {dimension}",
                bad.len()
            )));
        }
        Ok(vectors)
    }
}
