//! Fetching model files from a HuggingFace-compatible hub.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use futures_util::StreamExt;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{status} fetching {url}")]
    Status { status: StatusCode, url: String },

    /// Connect, read or timeout failure talking to the hub.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Local disk failure while placing the file.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Places a named file from a model repository into a local directory.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Returns the local path of the fetched file.
    async fn fetch(&self, repo: &str, filename: &str, dest_dir: &Path)
    -> Result<PathBuf, FetchError>;
}

/// Downloads `{endpoint}/{repo}/resolve/main/{filename}`.
pub struct HfFetcher {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HfFetcher {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Client for hub downloads. A stalled hub fails the read instead of
    /// holding the download slot forever.
    pub fn client(
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .build()
    }

    pub fn file_url(&self, repo: &str, filename: &str) -> String {
        format!("{}/{}/resolve/main/{}", self.endpoint, repo, filename)
    }

    async fn stream_to(&self, url: &str, part: &Path) -> Result<u64, FetchError> {
        let mut req = self.client.get(url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let res = req.send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                url: url.to_string(),
            });
        }

        let mut file = fs::File::create(part).await?;
        let mut written = 0u64;
        let mut body = res.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

// sibling path the body is streamed into before the final rename
fn part_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

#[async_trait]
impl ArtifactFetcher for HfFetcher {
    async fn fetch(
        &self,
        repo: &str,
        filename: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf, FetchError> {
        let url = self.file_url(repo, filename);
        let target = dest_dir.join(filename);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let part = part_path(&target);
        debug!(%url, part = %part.display(), "fetching artifact");

        match self.stream_to(&url, &part).await {
            Ok(bytes) => {
                fs::rename(&part, &target).await?;
                info!(%url, bytes, "artifact fetched to {}", target.display());
                Ok(target)
            }
            Err(e) => {
                if let Err(rm) = fs::remove_file(&part).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        warn!("Failed to remove partial download {}: {rm}", part.display());
                    }
                }
                Err(e)
            }
        }
    }
}
