//! Diesel-based record repository for SQLite.
//!
//! Uses diesel-async's SyncConnectionWrapper to provide an async interface
//! while maintaining Diesel's compile-time query checking.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::Sqlite;
use diesel_async::RunQueryDsl;

use super::diesel_models::{NewRecordRow, RecordChangeset, RecordRow};
use super::pool::{SqliteConn, SqlitePool};
use super::util::is_unique_violation;
use super::{format_datetime, parse_datetime, RecordStore, StoreError};
use crate::models::{NewRecord, Record, RecordFilter, RecordUpdate};
use crate::schema::records;

impl TryFrom<RecordRow> for Record {
    type Error = StoreError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let provider = row
            .provider
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("record {}: {}", row.id, e)))?;

        Ok(Record {
            provider,
            metadata: serde_json::from_str(&row.metadata).unwrap_or_default(),
            created_at: parse_datetime(&row.created_at),
            updated_at: parse_datetime(&row.updated_at),
            id: row.id,
            url: row.url,
            title: row.title,
            published_date: row.published_date,
            description: row.description,
            classification_done: row.classification_done,
            classification_approved: row.classification_approved,
            media_url: row.media_url,
            media_path: row.media_path,
        })
    }
}

/// Diesel-based record repository with compile-time query checking.
#[derive(Clone)]
pub struct DieselRecordRepository {
    pool: SqlitePool,
}

impl DieselRecordRepository {
    /// Create a new record repository with an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<SqliteConn, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    /// Count all records.
    pub async fn count(&self) -> Result<i64, StoreError> {
        let mut conn = self.conn().await?;
        Ok(records::table.count().get_result(&mut conn).await?)
    }
}

#[async_trait]
impl RecordStore for DieselRecordRepository {
    async fn insert(&self, record: &NewRecord) -> Result<Record, StoreError> {
        let mut conn = self.conn().await?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = format_datetime(Utc::now());

        let row = NewRecordRow {
            id: &id,
            url: &record.url,
            provider: record.provider.as_str(),
            title: &record.title,
            published_date: &record.published_date,
            description: &record.description,
            classification_done: false,
            classification_approved: false,
            media_url: None,
            media_path: None,
            metadata: "{}",
            created_at: &now,
            updated_at: &now,
        };

        match diesel::insert_into(records::table)
            .values(&row)
            .execute(&mut conn)
            .await
        {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::DuplicateKey(record.url.clone()))
            }
            Err(e) => return Err(e.into()),
        }

        records::table
            .find(id.as_str())
            .first::<RecordRow>(&mut conn)
            .await?
            .try_into()
    }

    async fn find(&self, filter: &RecordFilter) -> Result<Vec<Record>, StoreError> {
        let mut conn = self.conn().await?;

        let mut query: records::BoxedQuery<'_, Sqlite> = records::table.into_boxed();
        if let Some(url) = &filter.url {
            query = query.filter(records::url.eq(url.as_str()));
        }
        if let Some(provider) = filter.provider {
            query = query.filter(records::provider.eq(provider.as_str()));
        }
        if let Some(done) = filter.classification_done {
            query = query.filter(records::classification_done.eq(done));
        }
        if let Some(approved) = filter.classification_approved {
            query = query.filter(records::classification_approved.eq(approved));
        }

        query
            .order((records::created_at.asc(), records::id.asc()))
            .load::<RecordRow>(&mut conn)
            .await?
            .into_iter()
            .map(Record::try_from)
            .collect()
    }

    async fn get(&self, id: &str) -> Result<Option<Record>, StoreError> {
        let mut conn = self.conn().await?;

        records::table
            .find(id)
            .first::<RecordRow>(&mut conn)
            .await
            .optional()?
            .map(Record::try_from)
            .transpose()
    }

    async fn update_fields(&self, id: &str, update: &RecordUpdate) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;

        let metadata = match &update.metadata {
            Some(value) => Some(
                serde_json::to_string(value).map_err(|e| StoreError::Corrupt(e.to_string()))?,
            ),
            None => None,
        };
        let changeset = RecordChangeset {
            media_url: update.media_url.clone(),
            media_path: update.media_path.clone(),
            classification_done: update.classification_done,
            classification_approved: update.classification_approved,
            metadata,
            updated_at: Some(format_datetime(Utc::now())),
        };

        let rows = diesel::update(records::table.find(id))
            .set(&changeset)
            .execute(&mut conn)
            .await?;

        if rows == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provider;
    use crate::repository::run_migrations;
    use std::sync::Arc;
    use tempfile::tempdir;

    async fn setup_test_db() -> (DieselRecordRepository, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_url = dir.path().join("test.db").display().to_string();
        run_migrations(&db_url).await.unwrap();
        (DieselRecordRepository::new(SqlitePool::new(&db_url)), dir)
    }

    fn sample(url: &str) -> NewRecord {
        NewRecord::new(url, Provider::Cnn, " A title ", "Feb 26, 2025", "desc")
    }

    #[tokio::test]
    async fn test_insert_assigns_identity_and_defaults() {
        let (repo, _dir) = setup_test_db().await;

        let record = repo
            .insert(&sample("https://www.cnn.com/video/a"))
            .await
            .unwrap();
        assert!(!record.id.is_empty());
        assert_eq!(record.title, "A title");
        assert_eq!(record.provider, Provider::Cnn);
        assert!(!record.classification_done);
        assert!(!record.classification_approved);
        assert!(record.media_url.is_none());
        assert!(record.media_path.is_none());

        let fetched = repo.get(&record.id).await.unwrap().unwrap();
        assert_eq!(fetched, record);
        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_url_rejected() {
        let (repo, _dir) = setup_test_db().await;

        repo.insert(&sample("https://www.cnn.com/video/a"))
            .await
            .unwrap();
        let err = repo
            .insert(&sample("https://www.cnn.com/video/a"))
            .await
            .unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_racing_inserts_yield_one_success() {
        let (repo, _dir) = setup_test_db().await;
        let repo = Arc::new(repo);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.insert(&sample("https://www.cnn.com/video/race")).await
            }));
        }

        let mut ok = 0;
        let mut dup = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(e) if e.is_duplicate() => dup += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(dup, 3);
    }

    #[tokio::test]
    async fn test_find_filters_and_orders() {
        let (repo, _dir) = setup_test_db().await;

        let a = repo.insert(&sample("https://www.cnn.com/video/a")).await.unwrap();
        let b = repo.insert(&sample("https://www.cnn.com/video/b")).await.unwrap();
        repo.insert(&NewRecord::new(
            "https://www.foxnews.com/video/c",
            Provider::FoxNews,
            "c",
            "",
            "",
        ))
        .await
        .unwrap();

        repo.update_fields(&b.id, &RecordUpdate::classification(true))
            .await
            .unwrap();

        let all = repo.find(&RecordFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, a.id);

        let approved = repo.find(&RecordFilter::approved()).await.unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].id, b.id);

        let unclassified = repo.find(&RecordFilter::unclassified()).await.unwrap();
        assert_eq!(unclassified.len(), 2);

        let fox = repo
            .find(&RecordFilter {
                provider: Some(Provider::FoxNews),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(fox.len(), 1);

        let by_url = repo
            .find(&RecordFilter::by_url("https://www.cnn.com/video/a"))
            .await
            .unwrap();
        assert_eq!(by_url.len(), 1);
        assert_eq!(by_url[0].id, a.id);
    }

    #[tokio::test]
    async fn test_update_fields_is_partial() {
        let (repo, _dir) = setup_test_db().await;
        let record = repo.insert(&sample("https://www.cnn.com/video/a")).await.unwrap();

        repo.update_fields(&record.id, &RecordUpdate::media_url("https://media/x.mp4"))
            .await
            .unwrap();
        repo.update_fields(&record.id, &RecordUpdate::media_path("/tmp/x.mp4"))
            .await
            .unwrap();

        let updated = repo.get(&record.id).await.unwrap().unwrap();
        assert_eq!(updated.media_url.as_deref(), Some("https://media/x.mp4"));
        assert_eq!(updated.media_path.as_deref(), Some("/tmp/x.mp4"));
        assert_eq!(updated.title, record.title);
        assert_eq!(updated.url, record.url);
        assert!(!updated.classification_done);
    }

    #[tokio::test]
    async fn test_update_metadata_round_trips() {
        let (repo, _dir) = setup_test_db().await;
        let record = repo.insert(&sample("https://www.cnn.com/video/a")).await.unwrap();

        let update = RecordUpdate {
            metadata: Some(serde_json::json!({"location": "Doha"})),
            ..Default::default()
        };
        repo.update_fields(&record.id, &update).await.unwrap();

        let updated = repo.get(&record.id).await.unwrap().unwrap();
        assert_eq!(updated.metadata["location"], "Doha");
    }

    #[tokio::test]
    async fn test_update_missing_record_is_not_found() {
        let (repo, _dir) = setup_test_db().await;
        let err = repo
            .update_fields("nope", &RecordUpdate::media_url("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
