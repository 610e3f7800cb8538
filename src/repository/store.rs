//! The record store contract shared by the scraper, resolver and scheduler.

use async_trait::async_trait;

use crate::models::{NewRecord, Record, RecordFilter, RecordUpdate};

/// Errors from record store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record with this natural key (URL) already exists.
    #[error("record already exists: {0}")]
    DuplicateKey(String),
    #[error("record not found: {0}")]
    NotFound(String),
    /// The store could not be reached; continuing a run is pointless.
    #[error("record store unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::DuplicateKey(_))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Persistence for discovered records.
///
/// Implementations must enforce uniqueness of [`Record::url`] atomically:
/// two racing inserts of the same URL yield exactly one success and one
/// [`StoreError::DuplicateKey`]. Records are never deleted.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new record, assigning its identity.
    async fn insert(&self, record: &NewRecord) -> Result<Record, StoreError>;

    /// All records matching `filter`, oldest first.
    async fn find(&self, filter: &RecordFilter) -> Result<Vec<Record>, StoreError>;

    /// Fetch a record by identity.
    async fn get(&self, id: &str) -> Result<Option<Record>, StoreError>;

    /// Apply a partial update to the record with identity `id`.
    async fn update_fields(&self, id: &str, update: &RecordUpdate) -> Result<(), StoreError>;
}
