//! Video acquisition command.

use std::sync::Arc;
use std::time::Duration;

use console::style;
use tokio::sync::mpsc;

use crate::cli::helpers::{http_client, launcher, open_store};
use crate::cli::progress::AcquisitionProgress;
use crate::config::Settings;
use crate::services::{AcquisitionConfig, AcquisitionScheduler, Downloader, MediaResolver};

/// Resolve and download every approved record.
pub async fn cmd_download_videos(
    settings: &Settings,
    workers: Option<usize>,
    timeout: Option<u64>,
) -> anyhow::Result<()> {
    let config = AcquisitionConfig::new(
        workers.unwrap_or(settings.concurrency),
        timeout.map(Duration::from_secs),
    )?;

    let store = open_store(settings).await?;
    let client = http_client(settings)?;
    let resolver = MediaResolver::new(
        launcher(settings),
        store.clone(),
        client.clone(),
        settings.page_timeout(),
    );
    let downloader = Downloader::new(client, settings.downloads_dir.clone())
        .with_stall_timeout(Duration::from_secs(settings.request_timeout));

    println!(
        "{} Acquiring approved videos into {} ({} workers)",
        style("→").cyan(),
        settings.downloads_dir.display(),
        config.concurrency()
    );

    let scheduler =
        AcquisitionScheduler::new(store, Arc::new(resolver), Arc::new(downloader), config);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let progress = AcquisitionProgress::new();
    let display = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            progress.handle(&event);
        }
        progress.finish();
    });

    let result = scheduler.run(Some(event_tx)).await;
    let _ = display.await;
    let summary = result?;

    if summary.attempted == 0 {
        println!("{} No approved videos to download", style("!").yellow());
        println!("  {} Run 'sleuth aicheck' first", style("→").dim());
        return Ok(());
    }

    println!(
        "{} {} downloaded ({} already present), {} failed, {} cancelled",
        style("✓").green(),
        summary.succeeded,
        summary.already_present,
        summary.failed(),
        summary.cancelled
    );
    Ok(())
}
