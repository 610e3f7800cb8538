//! Shared wiring for CLI commands.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::browser::{BrowserLauncher, ChromiumLauncher};
use crate::config::Settings;
use crate::repository::{run_migrations, DieselRecordRepository, SqlitePool};

/// Migrate the database and open the record store.
pub async fn open_store(settings: &Settings) -> anyhow::Result<Arc<DieselRecordRepository>> {
    settings.ensure_directories()?;
    let database_url = settings.database_url();
    run_migrations(&database_url)
        .await
        .with_context(|| format!("Failed to migrate database at {}", database_url))?;
    Ok(Arc::new(DieselRecordRepository::new(SqlitePool::new(
        &database_url,
    ))))
}

/// Browser launcher configured from settings.
pub fn launcher(settings: &Settings) -> Arc<dyn BrowserLauncher> {
    Arc::new(ChromiumLauncher::new(
        settings.browser.clone(),
        settings.user_agent.clone(),
    ))
}

/// HTTP client for metadata lookups and media downloads.
///
/// Connect and each read are bounded by `request_timeout`; whole bodies are not.
pub fn http_client(settings: &Settings) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(&settings.user_agent)
        .connect_timeout(Duration::from_secs(settings.request_timeout))
        .read_timeout(Duration::from_secs(settings.request_timeout))
        .build()
        .context("Failed to build HTTP client")
}
