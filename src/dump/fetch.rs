//! Download of dump artifacts with integrity verification.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use md5::{Digest, Md5};
use reqwest::Client;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::types::IngestError;

/// Latest-articles multistream dump artifact name.
pub const DUMP_FILE: &str = "enwiki-latest-pages-articles-multistream.xml.bz2";
/// Offset index matching [`DUMP_FILE`].
pub const INDEX_FILE: &str = "enwiki-latest-pages-articles-multistream-index.txt.bz2";
/// Published MD5 manifest covering both artifacts.
pub const CHECKSUM_FILE: &str = "enwiki-latest-md5sums.txt";

const DEFAULT_BASE_URL: &str = "https://dumps.wikimedia.org/enwiki/latest";

/// Streaming downloader for dump artifacts.
///
/// Bytes are hashed incrementally while they are written, so multi-gigabyte
/// artifacts are verified without a second pass. A digest disagreement
/// removes the partial file and fails with `ChecksumMismatch`.
#[derive(Clone, Debug)]
pub struct ArtifactFetcher {
    client: Client,
    base_url: String,
}

impl Default for ArtifactFetcher {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

impl ArtifactFetcher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Points the fetcher at a different mirror.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Fetches the published checksum manifest, keyed by artifact file name.
    pub async fn load_checksums(&self) -> Result<HashMap<String, String>, IngestError> {
        let url = format!("{}/{}", self.base_url, CHECKSUM_FILE);
        let body = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let mut checksums = HashMap::new();
        for line in body.lines() {
            let mut fields = line.split_whitespace();
            if let (Some(checksum), Some(filename)) = (fields.next(), fields.next()) {
                checksums.insert(filename.to_string(), checksum.to_string());
            }
        }
        Ok(checksums)
    }

    /// Downloads the dump artifact into `dest_dir`, verifying `checksum`.
    pub async fn download_dump(
        &self,
        dest_dir: impl AsRef<Path>,
        checksum: &str,
    ) -> Result<PathBuf, IngestError> {
        self.download(DUMP_FILE, dest_dir.as_ref(), checksum).await
    }

    /// Downloads the offset index into `dest_dir`, verifying `checksum`.
    pub async fn download_index(
        &self,
        dest_dir: impl AsRef<Path>,
        checksum: &str,
    ) -> Result<PathBuf, IngestError> {
        self.download(INDEX_FILE, dest_dir.as_ref(), checksum).await
    }

    async fn download(
        &self,
        artifact: &str,
        dest_dir: &Path,
        checksum: &str,
    ) -> Result<PathBuf, IngestError> {
        let url = format!("{}/{}", self.base_url, artifact);
        let dest = dest_dir.join(artifact);
        fs::create_dir_all(dest_dir).await?;

        info!(artifact, %url, "downloading");
        let response = self.client.get(&url).send().await?.error_for_status()?;

        let mut file = fs::File::create(&dest).await?;
        let mut hasher = Md5::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        let actual = hex::encode(hasher.finalize());
        if actual != checksum {
            warn!(artifact, expected = checksum, %actual, "checksum mismatch, discarding");
            fs::remove_file(&dest).await?;
            return Err(IngestError::ChecksumMismatch {
                artifact: artifact.to_string(),
                expected: checksum.to_string(),
                actual,
            });
        }

        Ok(dest)
    }
}
