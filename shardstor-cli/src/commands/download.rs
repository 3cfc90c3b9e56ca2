//! Download Command
//!
//! Fetches an object, or a byte range of it, into a local file.

use super::{close_client, format_bytes, open_client};
use crate::symbols;
use anyhow::{Context, Result};
use console::style;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;

/// Download configuration
pub struct DownloadConfig {
    pub config: PathBuf,
    pub key: String,
    pub output: PathBuf,
    /// Offset and optional length of a partial download
    pub range: Option<(u64, Option<u64>)>,
}

/// Run download command
pub async fn run(config: DownloadConfig) -> Result<()> {
    let client = open_client(&config.config)?;

    let file = File::create(&config.output)
        .with_context(|| format!("Failed to create {}", config.output.display()))?;
    let mut writer = BufWriter::new(file);

    let result = match config.range {
        None => client
            .read_f(&config.key, &mut writer)
            .await
            .map(|metadata| metadata.original_size),
        Some((offset, length)) => {
            let length = match length {
                Some(length) => Ok(length),
                None => client
                    .stat(&config.key)
                    .await
                    .map(|metadata| metadata.original_size.saturating_sub(offset)),
            };
            match length {
                Ok(length) => {
                    client
                        .read_range(&config.key, offset, length, &mut writer)
                        .await
                }
                Err(e) => Err(e),
            }
        }
    };
    close_client(&client).await;
    drop(writer);

    let written = match result {
        Ok(written) => written,
        Err(e) => {
            // leave no truncated output behind
            let _ = fs::remove_file(&config.output);
            return Err(e).with_context(|| format!("Failed to read {}", config.key));
        }
    };

    println!(
        "{} {} {} {} {}",
        symbols::ok(),
        style("Downloaded").green().bold(),
        style(&config.key).cyan(),
        style("->").dim(),
        config.output.display()
    );
    println!("  Size: {}", format_bytes(written));

    Ok(())
}
