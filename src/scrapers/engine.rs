//! Paginated discovery against a rendered search page.

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::extract::{extract_cards, CardSelectors, SelectorError};
use super::rules::{ExtractionRuleSet, PageMode};
use crate::browser::{BrowserError, BrowserLauncher, PageDriver};
use crate::config::{ConfigError, Settings};
use crate::models::{NewRecord, Record};
use crate::repository::{RecordStore, StoreError};

/// Records buffered between the crawl task and the consumer.
const CHANNEL_CAPACITY: usize = 16;

/// Errors that end a provider's discovery run.
#[derive(Debug, thiserror::Error)]
pub enum DiscoverError {
    #[error("invalid search URL: {0}")]
    InvalidSearchUrl(String),
    #[error("search results never loaded: {0}")]
    ResultsNeverLoaded(#[source] BrowserError),
    #[error("gave up after {0} pages")]
    PageLimitExceeded(usize),
    #[error(transparent)]
    Selector(#[from] SelectorError),
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),
    #[error("record store error: {0}")]
    Store(#[from] StoreError),
}

/// Per-invocation discovery options.
#[derive(Debug, Clone)]
pub struct DiscoverOptions {
    /// Replaces the rule set's search URL prefix.
    pub search_url: Option<String>,
    pub paginate: bool,
}

impl Default for DiscoverOptions {
    fn default() -> Self {
        Self {
            search_url: None,
            paginate: true,
        }
    }
}

impl DiscoverOptions {
    /// Build validated options.
    pub fn new(search_url: Option<String>, paginate: bool) -> Result<Self, ConfigError> {
        if let Some(ref prefix) = search_url {
            let parsed = url::Url::parse(prefix)
                .map_err(|_| ConfigError::InvalidSearchUrl(prefix.clone()))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidSearchUrl(prefix.clone()));
            }
        }
        Ok(Self {
            search_url,
            paginate,
        })
    }
}

/// Timing limits for a discovery run.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Ceiling for each wait on the results-loaded marker.
    pub page_timeout: Duration,
    /// Wait after a pagination click before looking again.
    pub settle: Duration,
    pub max_pages: usize,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            page_timeout: Duration::from_secs(60),
            settle: Duration::from_secs(2),
            max_pages: 500,
        }
    }
}

impl From<&Settings> for ScraperConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            page_timeout: settings.page_timeout(),
            settle: settings.settle_interval(),
            max_pages: settings.max_pages.max(1),
        }
    }
}

/// Counters for one provider run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoverSummary {
    pub pages: usize,
    pub new: usize,
    pub duplicates: usize,
    /// Cards dropped for a missing or non-video link.
    pub skipped: usize,
}

/// Lazy, finite sequence of newly inserted records.
///
/// Dropping the stream tears the crawl down; records already inserted stay
/// in the store.
pub struct DiscoveryStream {
    rx: mpsc::Receiver<Result<Record, DiscoverError>>,
    handle: Option<JoinHandle<DiscoverSummary>>,
}

impl DiscoveryStream {
    /// Stop consuming and wait for the crawl task to wind down.
    pub async fn finish(mut self) -> DiscoverSummary {
        self.rx.close();
        // Unblock a sender waiting on a full channel.
        while self.rx.recv().await.is_some() {}
        match self.handle.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => DiscoverSummary::default(),
        }
    }
}

impl Stream for DiscoveryStream {
    type Item = Result<Record, DiscoverError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for DiscoveryStream {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Drives browser sessions through search result pages.
#[derive(Clone)]
pub struct Scraper {
    launcher: Arc<dyn BrowserLauncher>,
    store: Arc<dyn RecordStore>,
    config: ScraperConfig,
}

impl Scraper {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        store: Arc<dyn RecordStore>,
        config: ScraperConfig,
    ) -> Self {
        Self {
            launcher,
            store,
            config,
        }
    }

    /// Start discovering records for `term` with `rules`.
    ///
    /// Each call opens a fresh browser session. The stream yields only
    /// records inserted by this run; a fatal error is yielded last.
    pub fn discover(
        &self,
        term: &str,
        rules: &'static ExtractionRuleSet,
        options: &DiscoverOptions,
    ) -> DiscoveryStream {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let run = Run {
            scraper: self.clone(),
            rules,
            url: rules.search_url_for(term, options.search_url.as_deref()),
            paginate: options.paginate,
            tx,
            summary: DiscoverSummary::default(),
        };
        let handle = tokio::spawn(run.execute());
        DiscoveryStream {
            rx,
            handle: Some(handle),
        }
    }
}

/// Whether the crawl should keep going after an insert.
enum Flow {
    Continue,
    Stop,
}

struct Run {
    scraper: Scraper,
    rules: &'static ExtractionRuleSet,
    url: String,
    paginate: bool,
    tx: mpsc::Sender<Result<Record, DiscoverError>>,
    summary: DiscoverSummary,
}

impl Run {
    async fn execute(mut self) -> DiscoverSummary {
        let provider = self.rules.provider;
        info!(provider = %provider, url = %self.url, "Starting discovery");

        let result = match self.scraper.launcher.open().await {
            Ok(mut page) => {
                let result = self.crawl(page.as_mut()).await;
                page.close().await;
                result
            }
            Err(e) => Err(e.into()),
        };

        if let Err(e) = result {
            tracing::error!(provider = %provider, "Discovery aborted: {}", e);
            let _ = self.tx.send(Err(e)).await;
        }

        info!(
            provider = %provider,
            pages = self.summary.pages,
            new = self.summary.new,
            duplicates = self.summary.duplicates,
            skipped = self.summary.skipped,
            "Discovery finished"
        );
        self.summary
    }

    async fn crawl(&mut self, page: &mut dyn PageDriver) -> Result<(), DiscoverError> {
        let rules = self.rules;
        let config = self.scraper.config.clone();
        let selectors = CardSelectors::compile(rules)?;

        url::Url::parse(&self.url).map_err(|_| DiscoverError::InvalidSearchUrl(self.url.clone()))?;
        page.navigate(&self.url).await?;
        page.wait_visible(rules.loaded_marker, config.page_timeout)
            .await
            .map_err(DiscoverError::ResultsNeverLoaded)?;

        let mut seen: HashSet<String> = HashSet::new();

        loop {
            self.summary.pages += 1;
            let html = page.content().await?;
            let extracted = extract_cards(&html, rules, &selectors);
            self.summary.skipped += extracted.skipped;

            if extracted.found == 0 {
                warn!(
                    provider = %rules.provider,
                    page = self.summary.pages,
                    "Results loaded but no cards matched"
                );
            }

            for card in extracted.cards {
                // Append mode re-renders earlier cards on every page.
                if !seen.insert(card.url.clone()) {
                    continue;
                }
                let new = NewRecord::new(
                    &card.url,
                    rules.provider,
                    &card.title,
                    &card.published_date,
                    &card.description,
                );
                if let Flow::Stop = self.store(new).await? {
                    return Ok(());
                }
            }

            if !self.paginate {
                break;
            }
            if !self.has_more(page).await {
                debug!(provider = %rules.provider, "No more results");
                break;
            }
            if self.summary.pages >= config.max_pages {
                return Err(DiscoverError::PageLimitExceeded(config.max_pages));
            }

            if let Err(e) = page.click(rules.advance).await {
                warn!(provider = %rules.provider, "Pagination click failed: {}", e);
                break;
            }
            tokio::time::sleep(config.settle).await;
            if let Err(e) = page.wait_visible(rules.loaded_marker, config.page_timeout).await {
                warn!(
                    provider = %rules.provider,
                    page = self.summary.pages + 1,
                    "Next page never loaded: {}",
                    e
                );
                break;
            }
            if rules.page_mode == PageMode::Replace {
                seen.clear();
            }
        }

        Ok(())
    }

    async fn has_more(&self, page: &mut dyn PageDriver) -> bool {
        match page.exists(self.rules.more_marker).await {
            Ok(present) => present,
            Err(e) => {
                warn!(provider = %self.rules.provider, "More-results check failed: {}", e);
                false
            }
        }
    }

    async fn store(&mut self, new: NewRecord) -> Result<Flow, DiscoverError> {
        match self.scraper.store.insert(&new).await {
            Ok(record) => {
                self.summary.new += 1;
                debug!(url = %record.url, record_id = %record.id, "New record");
                // Receiver gone: the consumer stopped listening.
                if self.tx.send(Ok(record)).await.is_err() {
                    return Ok(Flow::Stop);
                }
                Ok(Flow::Continue)
            }
            Err(e) if e.is_duplicate() => {
                self.summary.duplicates += 1;
                debug!(url = %new.url, "Already known, skipping");
                Ok(Flow::Continue)
            }
            Err(e) => Err(e.into()),
        }
    }
}
