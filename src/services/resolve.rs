//! Media resolution: record page URL to a direct, fetchable media URL.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::browser::{js_string, BrowserError, BrowserLauncher, PageDriver};
use crate::models::{Provider, Record, RecordUpdate};
use crate::repository::{RecordStore, StoreError};

/// CNN's video metadata endpoint.
pub const CNN_METADATA_URL: &str = "https://fave.api.cnn.io/v1/video";

/// Element carrying the embedded player's identifiers.
const CNN_PLAYER_MARKER: &str = "div[data-video-id]";

/// Fixed `id` the metadata endpoint expects alongside `stellarUri`.
const CNN_PLACEHOLDER_ID: &str = "111111";

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no resolver for provider {0}")]
    Unsupported(Provider),
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),
    #[error("no video identifier on {0}")]
    MissingVideoId(String),
    #[error("metadata request failed: {0}")]
    Metadata(String),
    #[error("metadata lists no media files")]
    NoFiles,
    #[error("media URL is relative: {0}")]
    RelativeUrl(String),
    #[error("record store error: {0}")]
    Store(#[from] StoreError),
}

/// Produces a direct media URL for a stored record.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve and persist the media URL.
    ///
    /// A record that already carries a media URL is returned as-is with no
    /// network or browser activity.
    async fn resolve(&self, record: &Record) -> Result<String, ResolveError>;
}

#[derive(Debug, Deserialize)]
struct VideoMetadata {
    #[serde(default)]
    files: Vec<VideoFile>,
    #[serde(default)]
    headline: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoFile {
    #[serde(rename = "fileUri", default)]
    file_uri: String,
}

/// Provider-dispatching resolver.
pub struct MediaResolver {
    launcher: Arc<dyn BrowserLauncher>,
    store: Arc<dyn RecordStore>,
    client: reqwest::Client,
    metadata_url: String,
    page_timeout: Duration,
}

impl MediaResolver {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        store: Arc<dyn RecordStore>,
        client: reqwest::Client,
        page_timeout: Duration,
    ) -> Self {
        Self {
            launcher,
            store,
            client,
            metadata_url: CNN_METADATA_URL.to_string(),
            page_timeout,
        }
    }

    /// Point CNN metadata lookups somewhere else.
    pub fn with_metadata_url(mut self, url: impl Into<String>) -> Self {
        self.metadata_url = url.into();
        self
    }

    async fn resolve_cnn(&self, record: &Record) -> Result<String, ResolveError> {
        let mut page = self.launcher.open().await?;
        let uri = read_stellar_uri(page.as_mut(), &record.url, self.page_timeout).await;
        page.close().await;
        let uri = uri?;
        debug!(record_id = %record.id, uri = %uri, "Found video identifier");

        let metadata: VideoMetadata = self
            .client
            .get(&self.metadata_url)
            .query(&[("id", CNN_PLACEHOLDER_ID), ("stellarUri", uri.as_str())])
            .timeout(self.page_timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ResolveError::Metadata(e.to_string()))?
            .json()
            .await
            .map_err(|e| ResolveError::Metadata(e.to_string()))?;

        if let Some(ref headline) = metadata.headline {
            debug!(record_id = %record.id, headline = %headline, "Metadata fetched");
        }

        let file = metadata
            .files
            .into_iter()
            .next()
            .map(|f| f.file_uri.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or(ResolveError::NoFiles)?;

        check_absolute(file)
    }
}

/// Some media entries carry site-relative URIs that do not resolve.
fn check_absolute(media_url: String) -> Result<String, ResolveError> {
    match url::Url::parse(&media_url) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => Ok(media_url),
        _ => Err(ResolveError::RelativeUrl(media_url)),
    }
}

async fn read_stellar_uri(
    page: &mut dyn PageDriver,
    url: &str,
    timeout: Duration,
) -> Result<String, ResolveError> {
    page.navigate(url).await?;
    page.wait_visible(CNN_PLAYER_MARKER, timeout).await?;

    let script = format!(
        "(() => {{ const el = document.querySelector({}); return (el && el.dataset.uri) || ''; }})()",
        js_string(CNN_PLAYER_MARKER)
    );
    let uri = page.evaluate_string(&script).await?;
    let uri = uri.trim();
    if uri.is_empty() {
        return Err(ResolveError::MissingVideoId(url.to_string()));
    }
    Ok(uri.to_string())
}

#[async_trait]
impl Resolver for MediaResolver {
    async fn resolve(&self, record: &Record) -> Result<String, ResolveError> {
        if let Some(url) = record.resolved_media_url() {
            return Ok(url.to_string());
        }

        let media_url = match record.provider {
            Provider::Cnn => self.resolve_cnn(record).await?,
            Provider::FoxNews => return Err(ResolveError::Unsupported(record.provider)),
        };

        self.store
            .update_fields(&record.id, &RecordUpdate::media_url(media_url.clone()))
            .await?;
        info!(record_id = %record.id, media_url = %media_url, "Resolved media URL");
        Ok(media_url)
    }
}
