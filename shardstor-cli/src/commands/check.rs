//! Check Command
//!
//! Reports whether every fragment of an object is in place.

use super::{close_client, open_client};
use crate::symbols;
use anyhow::{Context, Result};
use console::style;
use shardstor_client::CheckStatus;
use std::path::PathBuf;

/// Check configuration
pub struct CheckConfig {
    pub config: PathBuf,
    pub key: String,
    pub fast: bool,
}

/// Run check command
pub async fn run(config: CheckConfig) -> Result<()> {
    let client = open_client(&config.config)?;
    let result = client
        .check(&config.key, config.fast)
        .await
        .with_context(|| format!("Failed to check {}", config.key));
    close_client(&client).await;
    let status = result?;

    println!(
        "{}: {} {}",
        style(&config.key).cyan(),
        symbols::health(status),
        status
    );

    match status {
        CheckStatus::Optimal => {}
        CheckStatus::Valid => println!(
            "  {} Some fragments are missing. Run '{}' to restore them.",
            symbols::warn(),
            style(format!("shardstor repair {}", config.key)).green()
        ),
        CheckStatus::Invalid => println!(
            "  {} Too many fragments are missing to read this object back.",
            symbols::fail()
        ),
    }

    Ok(())
}
