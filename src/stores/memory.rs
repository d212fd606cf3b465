//! In-memory vector store for tests and offline runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::types::IngestError;

use super::{CollectionInfo, Distance, VectorPoint, VectorStore};

#[derive(Debug, Clone)]
struct MemoryCollection {
    info: CollectionInfo,
    points: BTreeMap<u64, VectorPoint>,
}

/// Process-local [`VectorStore`] with the same create/upsert semantics as a
/// real backend. Cloning shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryVectorStore {
    collections: Arc<Mutex<HashMap<String, MemoryCollection>>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a stored point, if present. Test helper.
    pub fn get(&self, collection: &str, id: u64) -> Option<VectorPoint> {
        self.collections
            .lock()
            .get(collection)
            .and_then(|c| c.points.get(&id).cloned())
    }

    /// All points of a collection in id order. Test helper.
    pub fn snapshot(&self, collection: &str) -> Vec<VectorPoint> {
        self.collections
            .lock()
            .get(collection)
            .map(|c| c.points.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn collection_info(
        &self,
        collection: &str,
    ) -> Result<Option<CollectionInfo>, IngestError> {
        Ok(self.collections.lock().get(collection).map(|c| c.info))
    }

    async fn create_collection(
        &self,
        collection: &str,
        size: usize,
        distance: Distance,
    ) -> Result<(), IngestError> {
        let mut collections = self.collections.lock();
        if collections.contains_key(collection) {
            return Err(IngestError::Storage(format!(
                "collection '{collection}' already exists"
            )));
        }
        collections.insert(
            collection.to_string(),
            MemoryCollection {
                info: CollectionInfo { size, distance },
                points: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<(), IngestError> {
        let mut collections = self.collections.lock();
        let entry = collections.get_mut(collection).ok_or_else(|| {
            IngestError::Storage(format!("collection '{collection}' does not exist"))
        })?;
        for point in points {
            entry.points.insert(point.id, point);
        }
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize, IngestError> {
        Ok(self
            .collections
            .lock()
            .get(collection)
            .map(|c| c.points.len())
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_info_round_trips() {
        let store = MemoryVectorStore::new();
        assert!(!store.collection_exists("c").await.unwrap());

        store.create_collection("c", 4, Distance::Cosine).await.unwrap();
        let info = store.collection_info("c").await.unwrap().unwrap();
        assert_eq!(info.size, 4);
        assert_eq!(info.distance, Distance::Cosine);
    }

    #[tokio::test]
    async fn double_create_errors() {
        let store = MemoryVectorStore::new();
        store.create_collection("c", 4, Distance::Cosine).await.unwrap();
        assert!(
            store
                .create_collection("c", 4, Distance::Cosine)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn upsert_into_missing_collection_errors() {
        let store = MemoryVectorStore::new();
        let err = store.upsert("missing", Vec::new()).await.unwrap_err();
        assert!(matches!(err, IngestError::Storage(_)));
    }
}
