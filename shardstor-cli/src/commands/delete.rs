//! Delete Command
//!
//! Removes an object's metadata. Fragments stay on the shards.

use super::{close_client, format_bytes, open_client};
use crate::symbols;
use anyhow::{Context, Result};
use console::style;
use shardstor_client::ShardStorError;
use std::path::PathBuf;

/// Delete configuration
pub struct DeleteConfig {
    pub config: PathBuf,
    pub key: String,
    pub force: bool,
}

/// Run delete command
pub async fn run(config: DeleteConfig) -> Result<()> {
    let client = open_client(&config.config)?;
    let result = delete(&client, &config).await;
    close_client(&client).await;
    result
}

async fn delete(client: &shardstor_client::Client, config: &DeleteConfig) -> Result<()> {
    // Check if object exists first
    match client.stat(&config.key).await {
        Ok(metadata) => {
            if !config.force {
                println!(
                    "{} About to delete: {}",
                    style("Warning:").yellow(),
                    config.key
                );
                println!("  Size: {}", format_bytes(metadata.original_size));
                println!("\nUse --force to delete without confirmation.");
                return Ok(());
            }
        }
        Err(ShardStorError::NotFound(_)) => {
            println!(
                "{} Object not found: {}",
                style("Error:").red(),
                config.key
            );
            return Ok(());
        }
        Err(e) => {
            return Err(e).context("Failed to check object");
        }
    }

    client
        .delete(&config.key)
        .await
        .context("Failed to delete object")?;

    println!(
        "{} Deleted: {}",
        symbols::ok(),
        config.key
    );

    Ok(())
}
