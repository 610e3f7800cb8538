//! sleuth - news video discovery and media acquisition.
//!
//! Searches news sites for videos matching a term, records each one once,
//! asks a language model which are relevant, then resolves and downloads
//! the approved videos.

pub mod browser;
pub mod cli;
pub mod config;
pub mod llm;
pub mod migrations;
pub mod models;
pub mod repository;
pub mod schema;
pub mod scrapers;
pub mod services;
