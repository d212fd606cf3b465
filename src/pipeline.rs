//! Sequential ingestion driver.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::IngestConfig;
use crate::dump::{BlockStream, load_stream_offsets};
use crate::embeddings::{EmbeddingBatcher, EmbeddingProvider};
use crate::extract::extract_records;
use crate::stores::{PointPayload, VectorSink, VectorStore};
use crate::types::{IngestError, PageRecord};

/// Counters for one run.
///
/// `truncated` is set when the dump ended before covering every indexed
/// offset; callers must treat such a run as partial coverage, not failure.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub blocks_read: usize,
    pub blocks_skipped: usize,
    pub records_extracted: usize,
    pub batches_embedded: usize,
    pub points_upserted: usize,
    pub truncated: bool,
}

/// Drives one dump file through the full pipeline:
/// index → blocks → extract + classify → batch → embed → upsert.
///
/// The driver owns every collaborator and processes strictly sequentially:
/// at no point does it hold more than one block's records and one batch's
/// vectors. Index and collection-bootstrap failures abort before streaming;
/// corrupt blocks are skipped (by default) with a warning; an embedding or
/// store failure aborts the run wrapped in `BatchFailed` so the report names
/// the offset and batch, and never partially commits that batch.
pub struct IngestPipeline<S: VectorStore> {
    batcher: EmbeddingBatcher,
    sink: VectorSink<S>,
    config: IngestConfig,
}

impl<S: VectorStore> IngestPipeline<S> {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        store: S,
        config: IngestConfig,
    ) -> Result<Self, IngestError> {
        let batcher = EmbeddingBatcher::new(provider, config.batch_size, config.max_tokens)?;
        let sink = VectorSink::new(
            store,
            config.collection.clone(),
            config.vector_dimension,
            config.distance,
        );
        Ok(Self {
            batcher,
            sink,
            config,
        })
    }

    /// Access to the sink, mainly so callers can query the store afterwards.
    pub fn sink(&self) -> &VectorSink<S> {
        &self.sink
    }

    pub async fn run(
        &mut self,
        dump_path: impl AsRef<Path>,
        index_path: impl AsRef<Path>,
    ) -> Result<IngestReport, IngestError> {
        let offsets = load_stream_offsets(index_path.as_ref())?;
        info!(
            blocks = offsets.len(),
            dump = %dump_path.as_ref().display(),
            "index loaded"
        );

        self.sink.ensure_collection().await?;

        let mut report = IngestReport::default();
        let mut stream = BlockStream::open(dump_path.as_ref(), offsets)?;

        for next in stream.by_ref() {
            let block = match next {
                Ok(block) => block,
                Err(IngestError::CorruptBlock { offset, reason })
                    if self.config.skip_corrupt_blocks =>
                {
                    warn!(offset, %reason, "skipping corrupt block");
                    report.blocks_skipped += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };

            let records =
                match extract_records(&block.text, block.offset, self.config.image_policy) {
                    Ok(records) => records,
                    Err(IngestError::CorruptBlock { offset, reason })
                        if self.config.skip_corrupt_blocks =>
                    {
                        warn!(offset, %reason, "skipping unparseable block");
                        report.blocks_skipped += 1;
                        continue;
                    }
                    Err(err) => return Err(err),
                };
            report.blocks_read += 1;
            report.records_extracted += records.len();

            for (batch_index, batch) in records.chunks(self.batcher.batch_size()).enumerate() {
                let upserted = self
                    .embed_and_upsert(batch)
                    .await
                    .map_err(|err| IngestError::BatchFailed {
                        offset: block.offset,
                        batch: batch_index,
                        source: Box::new(err),
                    })?;
                report.batches_embedded += 1;
                report.points_upserted += upserted;
            }
        }

        report.truncated = stream.truncated();
        if report.truncated {
            warn!("dump ended before the index was exhausted; run covered a prefix only");
        }
        info!(
            blocks_read = report.blocks_read,
            blocks_skipped = report.blocks_skipped,
            records = report.records_extracted,
            points = report.points_upserted,
            "ingestion finished"
        );
        Ok(report)
    }

    async fn embed_and_upsert(&self, batch: &[PageRecord]) -> Result<usize, IngestError> {
        let vectors = self.batcher.embed(batch).await?;
        let ids = batch.iter().map(|record| record.id).collect();
        let payloads = batch.iter().map(PointPayload::from).collect();
        self.sink.upsert(ids, vectors, payloads).await
    }
}
