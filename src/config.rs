//! Pipeline configuration.

use crate::stores::Distance;
use crate::types::IngestError;

/// Whether records without an infobox image are kept or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImagePolicy {
    /// Keep the record with `image = None`.
    #[default]
    Keep,
    /// Drop records that carry no infobox image.
    Require,
}

/// Tunables for one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Target collection name in the vector store.
    pub collection: String,
    /// Maximum records per embedding call.
    pub batch_size: usize,
    /// Token budget applied to each record body before embedding.
    pub max_tokens: usize,
    /// Dimensionality the embedding provider produces.
    pub vector_dimension: usize,
    /// Distance metric the collection is created with.
    pub distance: Distance,
    pub image_policy: ImagePolicy,
    /// Skip blocks that fail to decompress/decode/parse instead of aborting.
    pub skip_corrupt_blocks: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            collection: "wiki_embeddings".to_string(),
            batch_size: 32,
            max_tokens: 256,
            vector_dimension: 384,
            distance: Distance::Cosine,
            image_policy: ImagePolicy::default(),
            skip_corrupt_blocks: true,
        }
    }
}

impl IngestConfig {
    /// Builds a config from the environment, falling back to defaults.
    ///
    /// Reads `WIKIREC_COLLECTION`, `WIKIREC_BATCH_SIZE`, `WIKIREC_MAX_TOKENS`,
    /// and `WIKIREC_VECTOR_DIMENSION`; a `.env` file is honored when present.
    /// Unparseable numeric values are a configuration error rather than a
    /// silent fallback.
    pub fn from_env() -> Result<Self, IngestError> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        if let Ok(collection) = std::env::var("WIKIREC_COLLECTION") {
            config.collection = collection;
        }
        config.batch_size = env_usize("WIKIREC_BATCH_SIZE", config.batch_size)?;
        config.max_tokens = env_usize("WIKIREC_MAX_TOKENS", config.max_tokens)?;
        config.vector_dimension = env_usize("WIKIREC_VECTOR_DIMENSION", config.vector_dimension)?;
        Ok(config)
    }
}

fn env_usize(key: &str, default: usize) -> Result<usize, IngestError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map_err(|_| IngestError::Config(format!("{key} must be an integer, got '{raw}'"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_provider_limits() {
        let config = IngestConfig::default();
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.max_tokens, 256);
        assert_eq!(config.vector_dimension, 384);
        assert_eq!(config.image_policy, ImagePolicy::Keep);
        assert!(config.skip_corrupt_blocks);
    }

    #[test]
    fn env_usize_rejects_garbage() {
        // SAFETY: test-local var, no concurrent readers of this key.
        unsafe { std::env::set_var("WIKIREC_TEST_BATCH", "not-a-number") };
        let err = env_usize("WIKIREC_TEST_BATCH", 1).unwrap_err();
        assert!(matches!(err, IngestError::Config(_)));
        unsafe { std::env::remove_var("WIKIREC_TEST_BATCH") };
    }
}
