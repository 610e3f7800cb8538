//! Repository layer for record persistence.
//!
//! All database access uses Diesel ORM with compile-time query checking
//! against an SQLite backend.

pub mod diesel_models;
pub mod diesel_record;
#[cfg(test)]
pub(crate) mod memory;
pub mod migrations;
pub mod pool;
mod store;
pub mod util;

pub use diesel_record::DieselRecordRepository;
pub use migrations::run_migrations;
pub use pool::{DbError, SqlitePool};
pub use store::{RecordStore, StoreError};

use chrono::{DateTime, SecondsFormat, Utc};

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Format a timestamp for storage.
///
/// Fixed-width microsecond precision keeps lexical and chronological order
/// identical, which `find` relies on for insertion ordering.
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}
