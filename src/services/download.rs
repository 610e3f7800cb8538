//! Media download.
//!
//! Files land at `<downloads_dir>/<record id><ext>`. Content streams into a
//! `.part` sibling that is renamed into place once complete, so an existing
//! target is always a finished download.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::models::Record;

/// Extension used when the media URL has none.
pub const DEFAULT_EXTENSION: &str = "mp4";

/// Longest wait for response headers or the next body chunk.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid media URL: {0}")]
    InvalidUrl(String),
    #[error("{url} stalled for {}s", after.as_secs())]
    Stalled { url: String, after: Duration },
}

/// Result of a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub path: PathBuf,
    /// False when the file was already on disk.
    pub fetched: bool,
}

/// Turns a resolved media URL into a local file.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, record: &Record, media_url: &str) -> Result<FetchOutcome, DownloadError>;
}

/// Extension (without the dot) of the last path segment of `media_url`.
fn extension_of(media_url: &url::Url) -> Option<String> {
    let segment = media_url.path_segments()?.last()?;
    let ext = Path::new(segment).extension()?.to_str()?;
    let valid = !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| ext.to_ascii_lowercase())
}

/// Deterministic download path for a record.
pub fn target_path(
    downloads_dir: &Path,
    record_id: &str,
    media_url: &str,
) -> Result<PathBuf, DownloadError> {
    let parsed =
        url::Url::parse(media_url).map_err(|_| DownloadError::InvalidUrl(media_url.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(DownloadError::InvalidUrl(media_url.to_string()));
    }
    let ext = extension_of(&parsed).unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
    Ok(downloads_dir.join(format!("{}.{}", record_id, ext)))
}

fn part_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// HTTP downloader writing under a single directory.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
    downloads_dir: PathBuf,
    stall_timeout: Duration,
}

impl Downloader {
    pub fn new(client: reqwest::Client, downloads_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            downloads_dir: downloads_dir.into(),
            stall_timeout: DEFAULT_STALL_TIMEOUT,
        }
    }

    /// Fail a download once the server goes quiet for `timeout`.
    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    /// Await one network step, bounded by the stall timeout.
    async fn bounded<T>(
        &self,
        media_url: &str,
        step: impl std::future::Future<Output = Result<T, reqwest::Error>>,
    ) -> Result<T, DownloadError> {
        match tokio::time::timeout(self.stall_timeout, step).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(DownloadError::Stalled {
                url: media_url.to_string(),
                after: self.stall_timeout,
            }),
        }
    }

    async fn stream_to(&self, media_url: &str, part: &Path) -> Result<u64, DownloadError> {
        let mut response = self
            .bounded(media_url, self.client.get(media_url).send())
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                status,
                url: media_url.to_string(),
            });
        }

        let mut file = tokio::fs::File::create(part).await?;
        let mut written = 0u64;
        while let Some(chunk) = self.bounded(media_url, response.chunk()).await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }
}

#[async_trait]
impl Fetcher for Downloader {
    async fn fetch(&self, record: &Record, media_url: &str) -> Result<FetchOutcome, DownloadError> {
        let path = target_path(&self.downloads_dir, &record.id, media_url)?;

        if tokio::fs::try_exists(&path).await? {
            debug!(record_id = %record.id, path = %path.display(), "Already downloaded");
            return Ok(FetchOutcome {
                path,
                fetched: false,
            });
        }

        tokio::fs::create_dir_all(&self.downloads_dir).await?;
        let part = part_path(&path);

        match self.stream_to(media_url, &part).await {
            Ok(bytes) => {
                tokio::fs::rename(&part, &path).await?;
                info!(
                    record_id = %record.id,
                    path = %path.display(),
                    bytes,
                    "Downloaded media"
                );
                Ok(FetchOutcome {
                    path,
                    fetched: true,
                })
            }
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(&part).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        debug!(path = %part.display(), "Failed to remove partial file: {}", rm);
                    }
                }
                Err(e)
            }
        }
    }
}
