//! Search command.

use console::style;
use futures::StreamExt;

use crate::cli::helpers::{launcher, open_store};
use crate::config::Settings;
use crate::models::Provider;
use crate::scrapers::{DiscoverOptions, Scraper, ScraperConfig};

/// Search each provider for `query` and store every new video found.
///
/// A provider that fails is reported and the remaining providers still run.
pub async fn cmd_search(
    settings: &Settings,
    query: &str,
    providers: &[Provider],
    paginate: bool,
    search_url: Option<String>,
) -> anyhow::Result<()> {
    let options = DiscoverOptions::new(search_url, paginate)?;
    let providers: Vec<Provider> = if providers.is_empty() {
        Provider::ALL.to_vec()
    } else {
        providers.to_vec()
    };

    let store = open_store(settings).await?;
    let scraper = Scraper::new(launcher(settings), store, ScraperConfig::from(settings));

    let mut failures = 0usize;
    for provider in providers {
        println!(
            "{} Searching {} for {}",
            style("→").cyan(),
            style(provider).bold(),
            style(query).yellow()
        );

        let mut stream = scraper.discover(query, provider.rule_set(), &options);
        let mut failed = false;
        while let Some(item) = stream.next().await {
            match item {
                Ok(record) => {
                    println!("  {} {}", style("+").green(), record.title);
                    println!("    {}", style(&record.url).dim());
                }
                Err(e) => {
                    println!("  {} {}: {}", style("✗").red(), provider, e);
                    failed = true;
                }
            }
        }
        let summary = stream.finish().await;
        if failed {
            failures += 1;
        }

        println!(
            "{} {}: {} new, {} already known, {} skipped ({} pages)",
            if failed {
                style("!").yellow()
            } else {
                style("✓").green()
            },
            provider,
            summary.new,
            summary.duplicates,
            summary.skipped,
            summary.pages
        );
    }

    if failures > 0 {
        anyhow::bail!("{} provider(s) failed", failures);
    }
    Ok(())
}
