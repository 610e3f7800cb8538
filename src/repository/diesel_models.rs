//! Diesel ORM models for the records table.

use diesel::prelude::*;

use crate::schema;

/// Record row from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::records)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RecordRow {
    pub id: String,
    pub url: String,
    pub provider: String,
    pub title: String,
    pub published_date: String,
    pub description: String,
    pub classification_done: bool,
    pub classification_approved: bool,
    pub media_url: Option<String>,
    pub media_path: Option<String>,
    pub metadata: String,
    pub created_at: String,
    pub updated_at: String,
}

/// New record row for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::records)]
pub struct NewRecordRow<'a> {
    pub id: &'a str,
    pub url: &'a str,
    pub provider: &'a str,
    pub title: &'a str,
    pub published_date: &'a str,
    pub description: &'a str,
    pub classification_done: bool,
    pub classification_approved: bool,
    pub media_url: Option<&'a str>,
    pub media_path: Option<&'a str>,
    pub metadata: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Partial update; `None` fields are skipped by diesel.
#[derive(AsChangeset, Debug, Default)]
#[diesel(table_name = schema::records)]
pub struct RecordChangeset {
    pub media_url: Option<String>,
    pub media_path: Option<String>,
    pub classification_done: Option<bool>,
    pub classification_approved: Option<bool>,
    pub metadata: Option<String>,
    pub updated_at: Option<String>,
}
