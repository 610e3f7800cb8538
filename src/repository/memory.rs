//! In-memory record store for unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::{RecordStore, StoreError};
use crate::models::{NewRecord, Record, RecordFilter, RecordUpdate};

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<Record>>,
    /// When set, every call fails with `Unavailable`.
    pub down: std::sync::atomic::AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.down.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is down".into()));
        }
        Ok(())
    }
}

fn matches(record: &Record, filter: &RecordFilter) -> bool {
    filter.url.as_ref().map_or(true, |u| &record.url == u)
        && filter.provider.map_or(true, |p| record.provider == p)
        && filter
            .classification_done
            .map_or(true, |d| record.classification_done == d)
        && filter
            .classification_approved
            .map_or(true, |a| record.classification_approved == a)
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, new: &NewRecord) -> Result<Record, StoreError> {
        self.check()?;
        let mut records = self.records.lock().unwrap();
        if records.iter().any(|r| r.url == new.url) {
            return Err(StoreError::DuplicateKey(new.url.clone()));
        }
        let now = Utc::now();
        let record = Record {
            id: uuid::Uuid::new_v4().to_string(),
            url: new.url.clone(),
            provider: new.provider,
            title: new.title.clone(),
            published_date: new.published_date.clone(),
            description: new.description.clone(),
            classification_done: false,
            classification_approved: false,
            media_url: None,
            media_path: None,
            metadata: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn find(&self, filter: &RecordFilter) -> Result<Vec<Record>, StoreError> {
        self.check()?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| matches(r, filter))
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Record>, StoreError> {
        self.check()?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn update_fields(&self, id: &str, update: &RecordUpdate) -> Result<(), StoreError> {
        self.check()?;
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if let Some(ref url) = update.media_url {
            record.media_url = Some(url.clone());
        }
        if let Some(ref path) = update.media_path {
            record.media_path = Some(path.clone());
        }
        if let Some(done) = update.classification_done {
            record.classification_done = done;
        }
        if let Some(approved) = update.classification_approved {
            record.classification_approved = approved;
        }
        if let Some(ref metadata) = update.metadata {
            record.metadata = metadata.clone();
        }
        record.updated_at = Utc::now();
        Ok(())
    }
}
