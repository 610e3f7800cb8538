//! Classification command.

use std::sync::Arc;

use console::style;

use crate::cli::helpers::open_store;
use crate::config::Settings;
use crate::llm::LlmClient;
use crate::services::Classifier;

/// Classify unreviewed records with the configured language model.
pub async fn cmd_aicheck(settings: &Settings, limit: usize) -> anyhow::Result<()> {
    let llm = LlmClient::new(settings.llm.clone())?;
    if !llm.is_available().await {
        println!(
            "{} Language model not reachable at {}",
            style("✗").red(),
            llm.config().endpoint
        );
        println!("  Set LLM_ENDPOINT or the llm section of the config file");
        return Ok(());
    }

    let store = open_store(settings).await?;
    println!(
        "{} Classifying with {}",
        style("→").cyan(),
        llm.config().model
    );

    let summary = Classifier::new(store, Arc::new(llm)).run(limit).await?;

    println!(
        "{} {} approved, {} rejected, {} failed",
        style("✓").green(),
        summary.approved,
        summary.rejected,
        summary.failed
    );
    Ok(())
}
