//! CLI Commands

pub mod check;
pub mod delete;
pub mod download;
pub mod repair;
pub mod stat;
pub mod upload;

use anyhow::{Context, Result};
use shardstor_client::{Client, Config};
use std::path::Path;

/// Load the config file and build a client over it
pub fn open_client(path: &Path) -> Result<Client> {
    let config = Config::load(path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;
    Client::new(config).context("Failed to create client")
}

/// Close the client, reporting failures without failing the command
pub async fn close_client(client: &Client) {
    if let Err(e) = client.close().await {
        tracing::warn!(error = %e, "failed to close shard clients");
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
