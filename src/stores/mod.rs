//! Vector storage behind a unified backend trait.
//!
//! [`VectorStore`] abstracts the external vector service; [`VectorSink`]
//! layers the pipeline-facing contract on top: idempotent collection
//! bootstrap with a fatal settings-mismatch check, and shape-checked
//! parallel-list upserts with by-id overwrite semantics.

pub mod memory;
pub mod qdrant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::extract::category::Category;
use crate::types::{IngestError, PageRecord};

pub use memory::MemoryVectorStore;
pub use qdrant::QdrantStore;

/// Distance metric a collection is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    Cosine,
    Dot,
    Euclid,
}

/// Persisted collection settings: fixed at creation, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub size: usize,
    pub distance: Distance,
}

/// Metadata stored alongside each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointPayload {
    pub title: String,
    pub image: Option<String>,
    pub category: Category,
}

impl From<&PageRecord> for PointPayload {
    fn from(record: &PageRecord) -> Self {
        Self {
            title: record.title.clone(),
            image: record.image.clone(),
            category: record.category,
        }
    }
}

/// One point in a collection. Upserting an existing id overwrites its vector
/// and payload; ids are the dump's page ids, so re-ingesting overlapping
/// dump ranges is safe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorPoint {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

/// External vector-store service interface.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Settings of an existing collection, or `None` when absent.
    async fn collection_info(
        &self,
        collection: &str,
    ) -> Result<Option<CollectionInfo>, IngestError>;

    async fn create_collection(
        &self,
        collection: &str,
        size: usize,
        distance: Distance,
    ) -> Result<(), IngestError>;

    /// Insert-or-overwrite-by-id write.
    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<(), IngestError>;

    async fn count(&self, collection: &str) -> Result<usize, IngestError>;

    async fn collection_exists(&self, collection: &str) -> Result<bool, IngestError> {
        Ok(self.collection_info(collection).await?.is_some())
    }
}

/// Pipeline-facing persistence stage over any [`VectorStore`] backend.
pub struct VectorSink<S: VectorStore> {
    store: S,
    collection: String,
    size: usize,
    distance: Distance,
    ready: bool,
}

impl<S: VectorStore> VectorSink<S> {
    pub fn new(store: S, collection: impl Into<String>, size: usize, distance: Distance) -> Self {
        Self {
            store,
            collection: collection.into(),
            size,
            distance,
            ready: false,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates the collection if absent. Idempotent: repeated runs against a
    /// provisioned store are no-ops. An existing collection whose settings
    /// disagree with the configured ones is a fatal configuration error, not
    /// silently reused.
    pub async fn ensure_collection(&mut self) -> Result<(), IngestError> {
        if self.ready {
            return Ok(());
        }
        match self.store.collection_info(&self.collection).await? {
            Some(info) if info.size == self.size && info.distance == self.distance => {}
            Some(info) => {
                return Err(IngestError::CollectionMismatch {
                    collection: self.collection.clone(),
                    reason: format!(
                        "expected {} x {:?}, found {} x {:?}",
                        self.size, self.distance, info.size, info.distance
                    ),
                });
            }
            None => {
                info!(collection = %self.collection, size = self.size, "creating collection");
                self.store
                    .create_collection(&self.collection, self.size, self.distance)
                    .await?;
            }
        }
        self.ready = true;
        Ok(())
    }

    /// Upserts parallel id/vector/payload lists, failing fast with
    /// `ShapeMismatch` when their lengths disagree. Returns the number of
    /// points written.
    pub async fn upsert(
        &self,
        ids: Vec<u64>,
        vectors: Vec<Vec<f32>>,
        payloads: Vec<PointPayload>,
    ) -> Result<usize, IngestError> {
        if ids.len() != vectors.len() || ids.len() != payloads.len() {
            return Err(IngestError::ShapeMismatch {
                ids: ids.len(),
                vectors: vectors.len(),
                payloads: payloads.len(),
            });
        }
        if ids.is_empty() {
            return Ok(0);
        }

        let count = ids.len();
        let points = ids
            .into_iter()
            .zip(vectors)
            .zip(payloads)
            .map(|((id, vector), payload)| VectorPoint {
                id,
                vector,
                payload,
            })
            .collect();
        self.store.upsert(&self.collection, points).await?;
        Ok(count)
    }
}
