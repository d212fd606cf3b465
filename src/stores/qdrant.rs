//! Qdrant REST backend.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::types::IngestError;

use super::{CollectionInfo, Distance, VectorPoint, VectorStore};

/// [`VectorStore`] implementation speaking Qdrant's collections/points REST
/// API over `reqwest`.
#[derive(Clone)]
pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
}

impl QdrantStore {
    /// Builds a client for the given base URL (e.g. `http://localhost:6333`).
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, IngestError> {
        let base_url = base_url.into();
        let parsed = Url::parse(&base_url)
            .map_err(|err| IngestError::Config(format!("invalid Qdrant URL '{base_url}': {err}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(IngestError::Config(format!(
                "Qdrant URL must be an http(s) URL, got '{base_url}'"
            )));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(api_key) = api_key {
            let mut headers = reqwest::header::HeaderMap::new();
            let value = reqwest::header::HeaderValue::from_str(api_key.trim())
                .map_err(|_| IngestError::Config("invalid Qdrant API key".to_string()))?;
            headers.insert("api-key", value);
            builder = builder.default_headers(headers);
        }
        let client = builder
            .build()
            .map_err(|err| IngestError::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Reads `QDRANT_URL` (default `http://localhost:6333`) and an optional
    /// `QDRANT_API_KEY`; honors a `.env` file when present.
    pub fn from_env() -> Result<Self, IngestError> {
        dotenvy::dotenv().ok();
        let url = std::env::var("QDRANT_URL")
            .unwrap_or_else(|_| "http://localhost:6333".to_string());
        Self::new(url, std::env::var("QDRANT_API_KEY").ok())
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/collections/{collection}", self.base_url)
    }

    async fn check(response: reqwest::Response, context: &str) -> Result<(), IngestError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<body unavailable>".to_string());
        Err(IngestError::Storage(format!(
            "{context} failed ({status}): {body}"
        )))
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn collection_info(
        &self,
        collection: &str,
    ) -> Result<Option<CollectionInfo>, IngestError> {
        let response = self
            .client
            .get(self.collection_url(collection))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(IngestError::Storage(format!(
                "collection lookup failed ({status}): {body}"
            )));
        }

        let payload: GetCollectionResponse = response
            .json()
            .await
            .map_err(|err| IngestError::Storage(format!("unparseable collection info: {err}")))?;
        let vectors = payload.result.config.params.vectors;
        Ok(Some(CollectionInfo {
            size: vectors.size,
            distance: vectors.distance,
        }))
    }

    async fn create_collection(
        &self,
        collection: &str,
        size: usize,
        distance: Distance,
    ) -> Result<(), IngestError> {
        let response = self
            .client
            .put(self.collection_url(collection))
            .json(&json!({ "vectors": { "size": size, "distance": distance } }))
            .send()
            .await?;
        Self::check(response, "collection create").await
    }

    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<(), IngestError> {
        let url = format!("{}/points?wait=true", self.collection_url(collection));
        let response = self
            .client
            .put(url)
            .json(&json!({ "points": points }))
            .send()
            .await?;
        Self::check(response, "points upsert").await
    }

    async fn count(&self, collection: &str) -> Result<usize, IngestError> {
        let url = format!("{}/points/count", self.collection_url(collection));
        let response = self
            .client
            .post(url)
            .json(&json!({ "exact": true }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(IngestError::Storage(format!(
                "points count failed ({status}): {body}"
            )));
        }
        let payload: CountResponse = response
            .json()
            .await
            .map_err(|err| IngestError::Storage(format!("unparseable count response: {err}")))?;
        Ok(payload.result.count)
    }
}

#[derive(Deserialize)]
struct GetCollectionResponse {
    result: GetCollectionResult,
}

#[derive(Deserialize)]
struct GetCollectionResult {
    config: CollectionConfig,
}

#[derive(Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Deserialize)]
struct CollectionParams {
    vectors: VectorParams,
}

#[derive(Deserialize)]
struct VectorParams {
    size: usize,
    distance: Distance,
}

#[derive(Deserialize)]
struct CountResponse {
    result: CountResult,
}

#[derive(Deserialize)]
struct CountResult {
    count: usize,
}
