//! Relevance classification of discovered records.
//!
//! Each unclassified record is shown to the language model, which answers
//! with a bare `true` or `false`. Anything else leaves the record
//! unclassified so a later run retries it.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::llm::{Infer, LlmError};
use crate::models::{Record, RecordFilter, RecordUpdate};
use crate::repository::{RecordStore, StoreError};

/// Instructions sent with every record.
pub const DOWNLOAD_DECISION_PROMPT: &str = "We are building a dataset on crime cases where bodies were found. \
I will provide you with a video title and description and you will decide if the video should be \
downloaded for further processing. A video would be useful if it may contain information about \
- A case where a body may eventually be found \
- A missing person report \
- A solved case about a missing person. \
Respond with \"true\" or \"false\" depending on if the video should be downloaded (true) or not (false).";

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("model answered {0:?}, expected true or false")]
    InvalidResponse(String),

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The record fields the model sees.
#[derive(Serialize)]
struct ClassifyInput<'a> {
    title: &'a str,
    url: &'a str,
    date: &'a str,
    description: &'a str,
    provider: &'a str,
}

impl<'a> From<&'a Record> for ClassifyInput<'a> {
    fn from(record: &'a Record) -> Self {
        Self {
            title: &record.title,
            url: &record.url,
            date: &record.published_date,
            description: &record.description,
            provider: record.provider.as_str(),
        }
    }
}

/// Parse the model's answer. Surrounding whitespace and case are ignored;
/// anything other than a lone boolean is rejected.
pub fn parse_decision(response: &str) -> Result<bool, ClassifyError> {
    match response.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ClassifyError::InvalidResponse(response.to_string())),
    }
}

/// Counts for one classifier run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifySummary {
    pub approved: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl ClassifySummary {
    pub fn classified(&self) -> usize {
        self.approved + self.rejected
    }
}

pub struct Classifier {
    store: Arc<dyn RecordStore>,
    llm: Arc<dyn Infer>,
}

impl Classifier {
    pub fn new(store: Arc<dyn RecordStore>, llm: Arc<dyn Infer>) -> Self {
        Self { store, llm }
    }

    /// Classify a single record and persist the decision.
    pub async fn classify(&self, record: &Record) -> Result<bool, ClassifyError> {
        let input = serde_json::to_string(&ClassifyInput::from(record))?;
        let response = self.llm.infer(DOWNLOAD_DECISION_PROMPT, &input).await?;
        let approved = parse_decision(&response)?;
        self.store
            .update_fields(&record.id, &RecordUpdate::classification(approved))
            .await?;
        Ok(approved)
    }

    /// Classify up to `limit` unclassified records (all of them when 0).
    ///
    /// Records are processed one at a time. Model failures are counted and
    /// skipped; a disabled model or an unreachable store stops the run.
    pub async fn run(&self, limit: usize) -> Result<ClassifySummary, ClassifyError> {
        let mut pending = self.store.find(&RecordFilter::unclassified()).await?;
        if limit > 0 {
            pending.truncate(limit);
        }
        info!(pending = pending.len(), "Starting classification");

        let mut summary = ClassifySummary::default();
        for record in &pending {
            match self.classify(record).await {
                Ok(true) => {
                    debug!(record_id = %record.id, "Approved: {}", record.title);
                    summary.approved += 1;
                }
                Ok(false) => {
                    debug!(record_id = %record.id, "Rejected: {}", record.title);
                    summary.rejected += 1;
                }
                Err(e @ ClassifyError::Llm(LlmError::Disabled))
                | Err(e @ ClassifyError::Store(_)) => return Err(e),
                Err(e) => {
                    warn!(record_id = %record.id, "Classification failed: {}", e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            approved = summary.approved,
            rejected = summary.rejected,
            failed = summary.failed,
            "Classification finished"
        );
        Ok(summary)
    }
}
