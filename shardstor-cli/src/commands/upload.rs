//! Upload Command
//!
//! Streams a local file into shardstor.

use super::{close_client, format_bytes, open_client};
use crate::symbols;
use anyhow::{Context, Result};
use console::style;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

/// Upload configuration
pub struct UploadConfig {
    pub config: PathBuf,
    pub file: PathBuf,
    pub key: Option<String>,
    pub user_defined: BTreeMap<String, String>,
}

/// Run upload command
pub async fn run(config: UploadConfig) -> Result<()> {
    let client = open_client(&config.config)?;

    let key = match config.key {
        Some(key) => key,
        None => config
            .file
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .with_context(|| format!("Cannot derive a key from {}", config.file.display()))?,
    };

    let file = File::open(&config.file)
        .with_context(|| format!("Failed to open {}", config.file.display()))?;

    let result = client
        .write_f_with_user_meta(&key, BufReader::new(file), config.user_defined)
        .await
        .with_context(|| format!("Failed to store {}", key));
    close_client(&client).await;
    let metadata = result?;

    println!(
        "{} {} {}",
        symbols::ok(),
        style("Uploaded").green().bold(),
        style(&key).cyan()
    );
    println!("  Size:    {}", format_bytes(metadata.original_size));
    println!("  Stored:  {}", format_bytes(metadata.storage_size));
    println!("  Chunks:  {}", metadata.chunks.len());
    println!("  Codec:   {}", metadata.codec.kind);

    Ok(())
}
