//! Schema tests
//!
//! Verifies that the cetane migrations produce the tables and indexes the
//! Diesel schema and record store rely on.

use std::collections::{BTreeMap, BTreeSet};

use rusqlite::{Connection, Result as SqliteResult};
use sleuth::repository::run_migrations;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnInfo {
    col_type: String,
    not_null: bool,
    primary_key: bool,
}

/// Columns of `table`, keyed by name.
fn extract_columns(conn: &Connection, table: &str) -> SqliteResult<BTreeMap<String, ColumnInfo>> {
    let mut pragma = conn.prepare(&format!("PRAGMA table_info(\"{}\")", table))?;
    let rows = pragma.query_map([], |row| {
        Ok((
            row.get::<_, String>(1)?,
            ColumnInfo {
                col_type: row.get::<_, String>(2)?.to_uppercase(),
                not_null: row.get(3)?,
                primary_key: row.get::<_, i32>(5)? > 0,
            },
        ))
    })?;
    rows.collect()
}

/// Indexes on `table` as (name, unique, columns).
fn extract_indexes(
    conn: &Connection,
    table: &str,
) -> SqliteResult<Vec<(String, bool, Vec<String>)>> {
    let mut list = conn.prepare(&format!("PRAGMA index_list(\"{}\")", table))?;
    let indexes: Vec<(String, bool)> = list
        .query_map([], |row| Ok((row.get(1)?, row.get(2)?)))?
        .collect::<SqliteResult<_>>()?;

    let mut out = Vec::new();
    for (name, unique) in indexes {
        let mut info = conn.prepare(&format!("PRAGMA index_info(\"{}\")", name))?;
        let columns: Vec<String> = info
            .query_map([], |row| {
                // Column name can be NULL for expression indexes
                row.get::<_, Option<String>>(2)
                    .map(|opt| opt.unwrap_or_else(|| "<expr>".to_string()))
            })?
            .collect::<SqliteResult<_>>()?;
        out.push((name, unique, columns));
    }
    Ok(out)
}

async fn migrated() -> (tempfile::TempDir, Connection) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sleuth.db");
    run_migrations(&format!("sqlite:{}", path.display()))
        .await
        .unwrap();
    let conn = Connection::open(&path).unwrap();
    (dir, conn)
}

#[tokio::test]
async fn records_table_matches_diesel_schema() {
    let (_dir, conn) = migrated().await;
    let columns = extract_columns(&conn, "records").unwrap();

    let names: BTreeSet<&str> = columns.keys().map(String::as_str).collect();
    let expected: BTreeSet<&str> = [
        "id",
        "url",
        "provider",
        "title",
        "published_date",
        "description",
        "classification_done",
        "classification_approved",
        "media_url",
        "media_path",
        "metadata",
        "created_at",
        "updated_at",
    ]
    .into_iter()
    .collect();
    assert_eq!(names, expected);

    assert!(columns["id"].primary_key);
    assert!(columns["url"].not_null);
    assert_eq!(columns["classification_done"].col_type, "INTEGER");
    assert!(!columns["media_url"].not_null);
    assert!(!columns["media_path"].not_null);
}

#[tokio::test]
async fn url_is_unique() {
    let (_dir, conn) = migrated().await;
    let indexes = extract_indexes(&conn, "records").unwrap();

    assert!(indexes
        .iter()
        .any(|(_, unique, cols)| *unique && cols == &vec!["url".to_string()]));
    for name in [
        "idx_records_classification_approved",
        "idx_records_classification_done",
        "idx_records_provider",
    ] {
        assert!(
            indexes.iter().any(|(n, _, _)| n == name),
            "missing index {}",
            name
        );
    }
}

#[tokio::test]
async fn migrations_apply_once() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("sleuth.db").display());
    run_migrations(&url).await.unwrap();
    run_migrations(&url).await.unwrap();

    let conn = Connection::open(dir.path().join("sleuth.db")).unwrap();
    let applied: i64 = conn
        .query_row("SELECT COUNT(*) FROM __cetane_migrations", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(applied, 1);
}
