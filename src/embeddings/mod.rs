//! Embedding providers behind a common seam.
//!
//! The pipeline only ever sees [`EmbeddingProvider`]; the concrete provider
//! (HTTP service, deterministic mock) is injected at construction and owned
//! by the driver rather than living in ambient global state.

pub mod batcher;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::IngestError;

pub use batcher::EmbeddingBatcher;

/// An external service turning an ordered list of texts into an
/// equal-length, positionally aligned list of fixed-dimensionality vectors.
/// Failure is all-or-nothing per call.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Dimensionality of every vector this provider returns.
    fn dimension(&self) -> usize;

    /// Maximum number of items the provider accepts per call.
    fn max_batch_size(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IngestError>;
}

/// Deterministic provider for tests and offline runs.
///
/// Vectors are derived from a content hash, so identical texts always embed
/// identically and distinct texts practically never collide.
#[derive(Debug, Clone)]
pub struct MockEmbeddingProvider {
    dimension: usize,
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self { dimension: 384 }
    }
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        // FNV-1a seeds a splitmix-style generator per text.
        let mut seed: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in text.as_bytes() {
            seed ^= u64::from(*byte);
            seed = seed.wrapping_mul(0x0000_0100_0000_01b3);
        }
        (0..self.dimension)
            .map(|_| {
                seed = seed
                    .wrapping_add(0x9e37_79b9_7f4a_7c15)
                    .wrapping_mul(0xbf58_476d_1ce4_e5b9);
                let unit = (seed >> 11) as f32 / (1u64 << 53) as f32;
                unit * 2.0 - 1.0
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_batch_size(&self) -> usize {
        256
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IngestError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

/// HTTP embedding service client.
#[derive(Clone, Debug)]
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimension: usize,
    max_batch_size: usize,
}

impl HttpEmbeddingProvider {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
    ) -> Result<Self, IngestError> {
        let endpoint = endpoint.into();
        let parsed = Url::parse(&endpoint).map_err(|err| {
            IngestError::Config(format!("invalid embedding endpoint '{endpoint}': {err}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(IngestError::Config(format!(
                "embedding endpoint must be an http(s) URL, got '{endpoint}'"
            )));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.into(),
            dimension,
            max_batch_size: 32,
        })
    }

    /// Sends requests with an `api-key` header.
    #[must_use]
    pub fn with_api_key(mut self, api_key: &str) -> Self {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Ok(value) = reqwest::header::HeaderValue::from_str(api_key.trim()) {
            headers.insert("api-key", value);
        }
        self.client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        self
    }

    #[must_use]
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IngestError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = InferenceRequest {
            model: &self.model,
            inputs: texts,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(IngestError::EmbeddingProvider(format!(
                "request failed ({status}): {body}"
            )));
        }

        let payload: InferenceResponse = response.json().await.map_err(|err| {
            IngestError::EmbeddingProvider(format!("unparseable response: {err}"))
        })?;
        payload.into_vectors(texts.len())
    }
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    model: &'a str,
    #[serde(rename = "input")]
    inputs: &'a [String],
}

/// Response body; providers differ on whether vectors arrive under `data`
/// (with indices) or as a bare `embeddings` list.
#[derive(Debug, Deserialize)]
struct InferenceResponse {
    #[serde(default)]
    data: Vec<InferenceData>,
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct InferenceData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl InferenceResponse {
    fn into_vectors(self, expected: usize) -> Result<Vec<Vec<f32>>, IngestError> {
        if !self.data.is_empty() {
            if self.data.len() != expected {
                return Err(IngestError::EmbeddingProvider(format!(
                    "returned {} vectors for {} inputs",
                    self.data.len(),
                    expected
                )));
            }
            let mut data = self.data;
            data.sort_by_key(|d| d.index.unwrap_or(0));
            return Ok(data.into_iter().map(|d| d.embedding).collect());
        }
        if self.embeddings.len() != expected {
            return Err(IngestError::EmbeddingProvider(format!(
                "returned {} vectors for {} inputs",
                self.embeddings.len(),
                expected
            )));
        }
        Ok(self.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn mock_provider_is_deterministic() {
        let provider = MockEmbeddingProvider::new().with_dimension(8);
        let inputs = vec!["hello".to_string(), "world".to_string(), "hello".to_string()];

        let first = provider.embed_batch(&inputs).await.unwrap();
        let second = provider.embed_batch(&inputs).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first[0], first[2]);
        assert_ne!(first[0], first[1]);
        assert!(first.iter().all(|v| v.len() == 8));
    }

    #[tokio::test]
    async fn http_provider_orders_indexed_data_positionally() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/embed");
                then.status(200).json_body(json!({
                    "data": [
                        {"embedding": [2.0, 2.0], "index": 1},
                        {"embedding": [1.0, 1.0], "index": 0},
                    ]
                }));
            })
            .await;

        let provider =
            HttpEmbeddingProvider::new(server.url("/embed"), "mini", 2).unwrap();
        let vectors = provider
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(vectors, vec![vec![1.0, 1.0], vec![2.0, 2.0]]);
    }

    #[tokio::test]
    async fn http_provider_accepts_bare_embeddings_shape() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embed");
                then.status(200)
                    .json_body(json!({"embeddings": [[0.5, 0.5]]}));
            })
            .await;

        let provider =
            HttpEmbeddingProvider::new(server.url("/embed"), "mini", 2).unwrap();
        let vectors = provider.embed_batch(&["a".to_string()]).await.unwrap();
        assert_eq!(vectors, vec![vec![0.5, 0.5]]);
    }

    #[tokio::test]
    async fn http_provider_rejects_count_mismatch() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embed");
                then.status(200)
                    .json_body(json!({"embeddings": [[0.5, 0.5]]}));
            })
            .await;

        let provider =
            HttpEmbeddingProvider::new(server.url("/embed"), "mini", 2).unwrap();
        let err = provider
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::EmbeddingProvider(_)));
    }

    #[tokio::test]
    async fn http_provider_surfaces_status_and_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embed");
                then.status(503).body("overloaded");
            })
            .await;

        let provider =
            HttpEmbeddingProvider::new(server.url("/embed"), "mini", 2).unwrap();
        let err = provider
            .embed_batch(&["a".to_string()])
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("503"), "missing status in {message}");
        assert!(message.contains("overloaded"), "missing body in {message}");
    }

    #[test]
    fn rejects_non_http_endpoint() {
        assert!(matches!(
            HttpEmbeddingProvider::new("ftp://example.com", "m", 2).unwrap_err(),
            IngestError::Config(_)
        ));
    }
}
