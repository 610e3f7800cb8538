//! Bounded-concurrency acquisition of approved records.
//!
//! Each eligible record becomes one task: resolve, download, then record the
//! local path. Tasks never see each other's failures.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::download::Fetcher;
use super::resolve::{ResolveError, Resolver};
use crate::config::ConfigError;
use crate::models::{Record, RecordFilter, RecordUpdate};
use crate::repository::{RecordStore, StoreError};

/// Scheduler limits.
#[derive(Debug, Clone)]
pub struct AcquisitionConfig {
    concurrency: usize,
    deadline: Option<Duration>,
}

impl AcquisitionConfig {
    pub fn new(concurrency: usize, deadline: Option<Duration>) -> Result<Self, ConfigError> {
        if concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        Ok(Self {
            concurrency,
            deadline,
        })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }
}

/// Lifecycle of one acquisition task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Resolving,
    ResolutionFailed,
    Resolved,
    Downloading,
    DownloadFailed,
    Downloaded,
    /// The file is on disk but its path could not be recorded.
    UpdateFailed,
    StoreUpdated,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::ResolutionFailed
                | TaskState::DownloadFailed
                | TaskState::UpdateFailed
                | TaskState::StoreUpdated
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Pending => "pending",
            TaskState::Resolving => "resolving",
            TaskState::ResolutionFailed => "resolution_failed",
            TaskState::Resolved => "resolved",
            TaskState::Downloading => "downloading",
            TaskState::DownloadFailed => "download_failed",
            TaskState::Downloaded => "downloaded",
            TaskState::UpdateFailed => "update_failed",
            TaskState::StoreUpdated => "store_updated",
        };
        f.write_str(s)
    }
}

/// Progress events emitted while a run is in flight.
#[derive(Debug, Clone)]
pub enum AcquisitionEvent {
    /// Eligible records found.
    Queued { total: usize },
    /// A task moved to a new state.
    Transition {
        record_id: String,
        url: String,
        state: TaskState,
    },
}

/// How a task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TaskOutcome {
    state: TaskState,
    /// The file was already on disk.
    already_present: bool,
}

/// Counts for one scheduler run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionSummary {
    /// Tasks dispatched.
    pub attempted: usize,
    pub succeeded: usize,
    /// Succeeded without fetching because the file already existed.
    pub already_present: usize,
    pub resolution_failed: usize,
    pub download_failed: usize,
    pub update_failed: usize,
    /// Eligible records not finished before the run was cut short.
    pub cancelled: usize,
}

impl AcquisitionSummary {
    fn tally(&mut self, outcome: &TaskOutcome) {
        match outcome.state {
            TaskState::StoreUpdated => {
                self.succeeded += 1;
                if outcome.already_present {
                    self.already_present += 1;
                }
            }
            TaskState::ResolutionFailed => self.resolution_failed += 1,
            TaskState::DownloadFailed => self.download_failed += 1,
            TaskState::UpdateFailed => self.update_failed += 1,
            other => debug!("Task ended in non-terminal state {}", other),
        }
    }

    pub fn failed(&self) -> usize {
        self.resolution_failed + self.download_failed + self.update_failed
    }
}

type EventSender = mpsc::UnboundedSender<AcquisitionEvent>;

/// Pulls approved records and acquires their media.
pub struct AcquisitionScheduler {
    store: Arc<dyn RecordStore>,
    resolver: Arc<dyn Resolver>,
    fetcher: Arc<dyn Fetcher>,
    config: AcquisitionConfig,
}

/// Await `fut`, giving up at `deadline`.
async fn until<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(at) => tokio::time::timeout_at(at, fut).await.ok(),
        None => Some(fut.await),
    }
}

impl AcquisitionScheduler {
    pub fn new(
        store: Arc<dyn RecordStore>,
        resolver: Arc<dyn Resolver>,
        fetcher: Arc<dyn Fetcher>,
        config: AcquisitionConfig,
    ) -> Self {
        Self {
            store,
            resolver,
            fetcher,
            config,
        }
    }

    /// Acquire media for every approved record.
    ///
    /// Per-record failures are logged and counted. Failing to list eligible
    /// records, or losing the store mid-run, cancels the run and is returned
    /// as an error.
    pub async fn run(
        &self,
        events: Option<EventSender>,
    ) -> Result<AcquisitionSummary, StoreError> {
        let records = self.store.find(&RecordFilter::approved()).await?;
        let total = records.len();
        info!(
            eligible = total,
            concurrency = self.config.concurrency,
            "Starting acquisition"
        );
        if let Some(ref tx) = events {
            let _ = tx.send(AcquisitionEvent::Queued { total });
            for record in &records {
                let _ = tx.send(AcquisitionEvent::Transition {
                    record_id: record.id.clone(),
                    url: record.url.clone(),
                    state: TaskState::Pending,
                });
            }
        }

        let deadline = self.config.deadline.map(|d| Instant::now() + d);
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut tasks = JoinSet::new();
        let mut summary = AcquisitionSummary::default();
        let mut finished = 0usize;
        let mut expired = false;
        let mut fatal: Option<StoreError> = None;
        // Set by a task that lost the store, before its permit is released.
        let halted = Arc::new(AtomicBool::new(false));

        for record in records {
            // The permit moves into the task and is released when it ends.
            let permit = match until(deadline, semaphore.clone().acquire_owned()).await {
                Some(Ok(permit)) => permit,
                _ => {
                    expired = true;
                    break;
                }
            };
            if halted.load(Ordering::SeqCst) {
                break;
            }

            // Reap finished tasks as we go.
            while let Some(joined) = tasks.try_join_next() {
                finished += 1;
                if let Some(e) = record_join(&mut summary, joined) {
                    fatal.get_or_insert(e);
                }
            }

            let store = self.store.clone();
            let resolver = self.resolver.clone();
            let fetcher = self.fetcher.clone();
            let events = events.clone();
            let halted = halted.clone();
            summary.attempted += 1;

            tasks.spawn(async move {
                let _permit = permit;
                let outcome = acquire(record, store, resolver, fetcher, events).await;
                if outcome.is_err() {
                    halted.store(true, Ordering::SeqCst);
                }
                outcome
            });
        }

        while fatal.is_none() && !expired && !tasks.is_empty() {
            match until(deadline, tasks.join_next()).await {
                Some(Some(joined)) => {
                    finished += 1;
                    if let Some(e) = record_join(&mut summary, joined) {
                        fatal = Some(e);
                    }
                }
                Some(None) => break,
                None => expired = true,
            }
        }

        if expired || fatal.is_some() {
            if fatal.is_some() {
                error!("Record store unavailable, cancelling acquisition");
            } else {
                warn!("Acquisition deadline reached, cancelling in-flight tasks");
            }
            tasks.abort_all();
            while let Some(joined) = tasks.join_next().await {
                if !matches!(joined, Err(ref e) if e.is_cancelled()) {
                    finished += 1;
                    // Already cancelling; later outages add nothing.
                    let _ = record_join(&mut summary, joined);
                }
            }
            summary.cancelled = total - finished;
        }

        if let Some(e) = fatal {
            return Err(e);
        }

        info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            already_present = summary.already_present,
            failed = summary.failed(),
            cancelled = summary.cancelled,
            "Acquisition finished"
        );
        Ok(summary)
    }
}

/// Count a joined task; returns the store error if it ended the run.
fn record_join(
    summary: &mut AcquisitionSummary,
    joined: Result<Result<TaskOutcome, StoreError>, tokio::task::JoinError>,
) -> Option<StoreError> {
    match joined {
        Ok(Ok(outcome)) => {
            summary.tally(&outcome);
            None
        }
        Ok(Err(e)) => Some(e),
        Err(e) => {
            warn!("Acquisition task panicked: {}", e);
            summary.download_failed += 1;
            None
        }
    }
}

/// Run one record through resolve, download and store update.
///
/// Only an unreachable store is returned as an error.
async fn acquire(
    record: Record,
    store: Arc<dyn RecordStore>,
    resolver: Arc<dyn Resolver>,
    fetcher: Arc<dyn Fetcher>,
    events: Option<EventSender>,
) -> Result<TaskOutcome, StoreError> {
    let transition = |state: TaskState| {
        debug!(record_id = %record.id, state = %state, "Task transition");
        if let Some(ref tx) = events {
            let _ = tx.send(AcquisitionEvent::Transition {
                record_id: record.id.clone(),
                url: record.url.clone(),
                state,
            });
        }
        TaskOutcome {
            state,
            already_present: false,
        }
    };

    transition(TaskState::Resolving);
    let media_url = match resolver.resolve(&record).await {
        Ok(url) => url,
        Err(ResolveError::Store(e)) if e.is_unavailable() => {
            transition(TaskState::ResolutionFailed);
            return Err(e);
        }
        Err(e) => {
            warn!(record_id = %record.id, url = %record.url, "Resolution failed: {}", e);
            return Ok(transition(TaskState::ResolutionFailed));
        }
    };
    transition(TaskState::Resolved);

    transition(TaskState::Downloading);
    let fetched = match fetcher.fetch(&record, &media_url).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(record_id = %record.id, media_url = %media_url, "Download failed: {}", e);
            return Ok(transition(TaskState::DownloadFailed));
        }
    };
    transition(TaskState::Downloaded);

    let path = fetched.path.display().to_string();
    if record.media_path.as_deref() != Some(path.as_str()) {
        match store
            .update_fields(&record.id, &RecordUpdate::media_path(path))
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_unavailable() => {
                transition(TaskState::UpdateFailed);
                return Err(e);
            }
            Err(e) => {
                warn!(record_id = %record.id, "Failed to record media path: {}", e);
                return Ok(transition(TaskState::UpdateFailed));
            }
        }
    }

    Ok(TaskOutcome {
        already_present: !fetched.fetched,
        ..transition(TaskState::StoreUpdated)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewRecord, Provider};
    use crate::repository::memory::MemoryStore;
    use crate::services::download::{DownloadError, FetchOutcome};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;

    /// Counts records currently resolving or downloading.
    #[derive(Default)]
    struct Gauge {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl Gauge {
        async fn hold(&self, duration: Duration) {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(duration).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        fn max(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    struct SlowResolver {
        gauge: Arc<Gauge>,
        calls: AtomicUsize,
        fail_title: Option<&'static str>,
        hang_title: Option<&'static str>,
        /// Store knocked offline by the first call.
        outage: Option<Arc<MemoryStore>>,
    }

    #[async_trait]
    impl Resolver for SlowResolver {
        async fn resolve(&self, record: &Record) -> Result<String, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(ref store) = self.outage {
                store.down.store(true, Ordering::SeqCst);
            }
            if Some(record.title.as_str()) == self.hang_title {
                self.gauge.hold(Duration::from_secs(3600)).await;
            }
            self.gauge.hold(Duration::from_millis(20)).await;

            if Some(record.title.as_str()) == self.fail_title {
                return Err(ResolveError::Browser(crate::browser::BrowserError::Timeout {
                    what: "div[data-video-id]".into(),
                    after: Duration::from_secs(60),
                }));
            }
            Ok(format!("https://media.example.com/{}.mp4", record.title))
        }
    }

    #[derive(Default)]
    struct FakeFetcher {
        gauge: Arc<Gauge>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        async fn fetch(
            &self,
            record: &Record,
            media_url: &str,
        ) -> Result<FetchOutcome, DownloadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gauge.hold(Duration::from_millis(20)).await;
            if media_url.contains("broken") {
                return Err(DownloadError::InvalidUrl(media_url.to_string()));
            }
            Ok(FetchOutcome {
                path: PathBuf::from(format!("/dl/{}.mp4", record.id)),
                fetched: record.media_path.is_none(),
            })
        }
    }

    async fn approved_store(titles: &[&str]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for title in titles {
            let record = store
                .insert(&NewRecord::new(
                    &format!("https://www.cnn.com/video/{}", title),
                    Provider::Cnn,
                    title,
                    "",
                    "",
                ))
                .await
                .unwrap();
            store
                .update_fields(&record.id, &RecordUpdate::classification(true))
                .await
                .unwrap();
        }
        store
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        assert!(matches!(
            AcquisitionConfig::new(0, None),
            Err(ConfigError::InvalidConcurrency)
        ));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let titles: Vec<String> = (0..12).map(|i| format!("clip{}", i)).collect();
        let refs: Vec<&str> = titles.iter().map(String::as_str).collect();
        let store = approved_store(&refs).await;
        let gauge = Arc::new(Gauge::default());
        let resolver = Arc::new(SlowResolver {
            gauge: gauge.clone(),
            ..Default::default()
        });
        let fetcher = Arc::new(FakeFetcher {
            gauge: gauge.clone(),
            ..Default::default()
        });

        let scheduler = AcquisitionScheduler::new(
            store.clone(),
            resolver,
            fetcher,
            AcquisitionConfig::new(3, None).unwrap(),
        );
        let summary = scheduler.run(None).await.unwrap();

        assert_eq!(summary.attempted, 12);
        assert_eq!(summary.succeeded, 12);
        // Resolving and downloading together never exceed the limit.
        assert!(gauge.max() <= 3, "max in flight was {}", gauge.max());
        assert!(gauge.max() > 1);
        assert!(store.all().iter().all(|r| r.media_path.is_some()));
    }

    #[tokio::test]
    async fn test_store_outage_mid_run_is_fatal() {
        let store = approved_store(&["a", "b", "c", "d"]).await;
        let resolver = Arc::new(SlowResolver {
            outage: Some(store.clone()),
            ..Default::default()
        });
        let fetcher = Arc::new(FakeFetcher::default());
        let scheduler = AcquisitionScheduler::new(
            store.clone(),
            resolver.clone(),
            fetcher,
            AcquisitionConfig::new(1, None).unwrap(),
        );

        let result = scheduler.run(None).await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let store = approved_store(&["good", "bad", "broken"]).await;
        let resolver = Arc::new(SlowResolver {
            fail_title: Some("bad"),
            ..Default::default()
        });
        let fetcher = Arc::new(FakeFetcher::default());
        let scheduler = AcquisitionScheduler::new(
            store.clone(),
            resolver,
            fetcher.clone(),
            AcquisitionConfig::new(2, None).unwrap(),
        );

        let summary = scheduler.run(None).await.unwrap();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.resolution_failed, 1);
        assert_eq!(summary.download_failed, 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);

        let bad = store
            .all()
            .into_iter()
            .find(|r| r.title == "bad")
            .unwrap();
        assert!(bad.media_url.is_none());
        assert!(bad.media_path.is_none());
    }

    #[tokio::test]
    async fn test_only_approved_records_are_acquired() {
        let store = approved_store(&["yes"]).await;
        store
            .insert(&NewRecord::new(
                "https://www.cnn.com/video/no",
                Provider::Cnn,
                "no",
                "",
                "",
            ))
            .await
            .unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        let scheduler = AcquisitionScheduler::new(
            store,
            Arc::new(SlowResolver::default()),
            fetcher.clone(),
            AcquisitionConfig::new(5, None).unwrap(),
        );

        let summary = scheduler.run(None).await.unwrap();
        assert_eq!(summary.attempted, 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deadline_cancels_stuck_tasks() {
        let store = approved_store(&["quick", "stuck"]).await;
        let resolver = Arc::new(SlowResolver {
            hang_title: Some("stuck"),
            ..Default::default()
        });
        let scheduler = AcquisitionScheduler::new(
            store,
            resolver,
            Arc::new(FakeFetcher::default()),
            AcquisitionConfig::new(2, Some(Duration::from_millis(300))).unwrap(),
        );

        let summary = scheduler.run(None).await.unwrap();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.cancelled, 1);
    }

    #[tokio::test]
    async fn test_events_follow_the_state_machine() {
        let store = approved_store(&["one"]).await;
        let scheduler = AcquisitionScheduler::new(
            store,
            Arc::new(SlowResolver::default()),
            Arc::new(FakeFetcher::default()),
            AcquisitionConfig::new(1, None).unwrap(),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();

        scheduler.run(Some(tx)).await.unwrap();

        let mut states = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                AcquisitionEvent::Queued { total } => assert_eq!(total, 1),
                AcquisitionEvent::Transition { state, .. } => states.push(state),
            }
        }
        assert_eq!(
            states,
            vec![
                TaskState::Pending,
                TaskState::Resolving,
                TaskState::Resolved,
                TaskState::Downloading,
                TaskState::Downloaded,
                TaskState::StoreUpdated,
            ]
        );
        assert!(states.last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn test_store_unavailable_is_fatal() {
        let store = Arc::new(MemoryStore::new());
        store.down.store(true, Ordering::SeqCst);
        let scheduler = AcquisitionScheduler::new(
            store,
            Arc::new(SlowResolver::default()),
            Arc::new(FakeFetcher::default()),
            AcquisitionConfig::new(1, None).unwrap(),
        );

        assert!(matches!(
            scheduler.run(None).await,
            Err(StoreError::Unavailable(_))
        ));
    }
}
