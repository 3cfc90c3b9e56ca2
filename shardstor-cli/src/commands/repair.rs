//! Repair Command
//!
//! Restores the missing fragments of an object.

use super::{close_client, open_client};
use crate::symbols;
use anyhow::{Context, Result};
use console::style;
use std::path::PathBuf;

/// Repair configuration
pub struct RepairConfig {
    pub config: PathBuf,
    pub key: String,
}

/// Run repair command
pub async fn run(config: RepairConfig) -> Result<()> {
    let client = open_client(&config.config)?;
    let result = client
        .repair(&config.key)
        .await
        .with_context(|| format!("Failed to repair {}", config.key));
    close_client(&client).await;
    let metadata = result?;

    println!(
        "{} {} {}",
        symbols::ok(),
        style("Repaired").green().bold(),
        style(&config.key).cyan()
    );
    println!("  Chunks: {}", metadata.chunks.len());

    Ok(())
}
