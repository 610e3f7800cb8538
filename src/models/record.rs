//! Discovered news video records.
//!
//! A record is keyed by its source URL (the natural key). Extraction fields
//! are written once by the scraper; `media_url`/`media_path` belong to the
//! acquisition pipeline; the classification flags belong to the classifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Provider;

/// A persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Store-assigned identity, stable once created.
    pub id: String,
    /// Source URL; unique across the store.
    pub url: String,
    pub provider: Provider,
    pub title: String,
    /// Publication date exactly as the site displays it.
    pub published_date: String,
    pub description: String,
    pub classification_done: bool,
    pub classification_approved: bool,
    /// Direct, fetchable media URL once resolved.
    pub media_url: Option<String>,
    /// Local path of the downloaded media file.
    pub media_path: Option<String>,
    /// Enrichment data owned by external collaborators (victim names,
    /// location, case grouping, timestamps). Passed through untouched.
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    /// The resolved media URL, if one is set and non-empty.
    pub fn resolved_media_url(&self) -> Option<&str> {
        self.media_url.as_deref().filter(|u| !u.is_empty())
    }
}

/// Extraction fields for a record that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub url: String,
    pub provider: Provider,
    pub title: String,
    pub published_date: String,
    pub description: String,
}

impl NewRecord {
    /// Build a new record, trimming surrounding whitespace from every field.
    pub fn new(
        url: &str,
        provider: Provider,
        title: &str,
        published_date: &str,
        description: &str,
    ) -> Self {
        Self {
            url: url.trim().to_string(),
            provider,
            title: title.trim().to_string(),
            published_date: published_date.trim().to_string(),
            description: description.trim().to_string(),
        }
    }
}

/// Partial update applied by [`crate::repository::RecordStore::update_fields`].
///
/// `None` leaves a column untouched. The natural key and provider never
/// change after creation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordUpdate {
    pub media_url: Option<String>,
    pub media_path: Option<String>,
    pub classification_done: Option<bool>,
    pub classification_approved: Option<bool>,
    pub metadata: Option<serde_json::Value>,
}

impl RecordUpdate {
    pub fn media_url(url: impl Into<String>) -> Self {
        Self {
            media_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn media_path(path: impl Into<String>) -> Self {
        Self {
            media_path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn classification(approved: bool) -> Self {
        Self {
            classification_done: Some(true),
            classification_approved: Some(approved),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Query predicate for [`crate::repository::RecordStore::find`].
///
/// All set fields must match; an empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub url: Option<String>,
    pub provider: Option<Provider>,
    pub classification_done: Option<bool>,
    pub classification_approved: Option<bool>,
}

impl RecordFilter {
    /// Records the classifier approved for acquisition.
    pub fn approved() -> Self {
        Self {
            classification_approved: Some(true),
            ..Default::default()
        }
    }

    /// Records the classifier has not looked at yet.
    pub fn unclassified() -> Self {
        Self {
            classification_done: Some(false),
            ..Default::default()
        }
    }

    pub fn by_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }
}
