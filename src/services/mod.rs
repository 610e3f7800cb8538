//! Pipeline services.
//!
//! Each stage works through the record store and can be driven by the CLI
//! or by tests with in-memory collaborators.

pub mod acquisition;
pub mod classify;
pub mod download;
pub mod resolve;

pub use acquisition::{
    AcquisitionConfig, AcquisitionEvent, AcquisitionScheduler, AcquisitionSummary, TaskState,
};
pub use classify::{Classifier, ClassifyError, ClassifySummary};
pub use download::{DownloadError, Downloader, FetchOutcome, Fetcher};
pub use resolve::{MediaResolver, ResolveError, Resolver};
