//! Initialize command.

use console::style;

use crate::cli::helpers::open_store;
use crate::config::Settings;

/// Create the data directory and bring the database schema up to date.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    let store = open_store(settings).await?;
    let records = store.count().await?;

    println!(
        "{} Initialized sleuth in {}",
        style("✓").green(),
        settings.data_dir.display()
    );
    println!("  Database:  {}", settings.database_url());
    println!("  Downloads: {}", settings.downloads_dir.display());
    println!("  Records:   {}", records);

    Ok(())
}
