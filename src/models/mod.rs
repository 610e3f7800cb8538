//! Data models for sleuth.

mod provider;
mod record;

pub use provider::{Provider, UnknownProvider};
pub use record::{NewRecord, Record, RecordFilter, RecordUpdate};
