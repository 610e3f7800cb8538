use cetane::prelude::*;

pub fn migration() -> Migration {
    Migration::new("0001_initial_schema")
        // records - url is the natural key, uniqueness enforced by the engine
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE IF NOT EXISTS records (
    id TEXT PRIMARY KEY NOT NULL,
    url TEXT NOT NULL UNIQUE,
    provider TEXT NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    published_date TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    classification_done INTEGER NOT NULL DEFAULT 0,
    classification_approved INTEGER NOT NULL DEFAULT 0,
    media_url TEXT,
    media_path TEXT,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)"#,
        ))
        .operation(AddIndex::new(
            "records",
            Index::new("idx_records_classification_approved").column("classification_approved"),
        ))
        .operation(AddIndex::new(
            "records",
            Index::new("idx_records_classification_done").column("classification_done"),
        ))
        .operation(AddIndex::new(
            "records",
            Index::new("idx_records_provider").column("provider"),
        ))
}
