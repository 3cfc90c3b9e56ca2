//! Stat Command
//!
//! Shows an object's metadata record.

use super::{close_client, format_bytes, open_client};
use crate::symbols;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use console::style;
use shardstor_client::Metadata;
use std::path::PathBuf;

/// Stat configuration
pub struct StatConfig {
    pub config: PathBuf,
    pub key: String,
    pub json: bool,
}

/// Run stat command
pub async fn run(config: StatConfig) -> Result<()> {
    let client = open_client(&config.config)?;
    let result = client
        .stat(&config.key)
        .await
        .with_context(|| format!("Failed to stat {}", config.key));
    close_client(&client).await;
    let metadata = result?;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
    } else {
        print_metadata(&metadata);
    }
    Ok(())
}

fn format_time(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}

fn print_metadata(metadata: &Metadata) {
    println!("{}", style(&metadata.key).bold());
    println!("{}", symbols::rule(&metadata.key));
    println!("  Namespace:   {}", metadata.namespace);
    println!("  Size:        {}", style(format_bytes(metadata.original_size)).cyan());
    println!("  Stored:      {}", format_bytes(metadata.storage_size));
    println!("  Chunk size:  {}", format_bytes(metadata.chunk_size));
    println!(
        "  Codec:       {} (k={}, m={})",
        metadata.codec.kind, metadata.codec.k, metadata.codec.m
    );
    println!("  Hasher:      {} ({})", metadata.hasher, hash_point(metadata));
    println!("  Created:     {}", format_time(metadata.created_at));
    println!("  Last write:  {}", format_time(metadata.last_write_at));
    if let Some(previous) = &metadata.previous_key {
        println!("  Previous:    {}", previous);
    }
    if let Some(next) = &metadata.next_key {
        println!("  Next:        {}", next);
    }

    if !metadata.stages.is_empty() {
        println!();
        println!("  {}", style("Pipeline:").bold());
        for stage in &metadata.stages {
            print!("    {} {}", stage.stage_type, stage.algorithm);
            if let Some(level) = &stage.level {
                print!(" level={}", level);
            }
            if let Some(key_id) = &stage.key_id {
                print!(" key={}", key_id);
            }
            println!();
        }
    }

    if !metadata.user_defined.is_empty() {
        println!();
        println!("  {}", style("User metadata:").bold());
        for (k, v) in &metadata.user_defined {
            println!("    {} = {}", k, v);
        }
    }

    println!();
    println!("  {}", style(format!("Chunks ({}):", metadata.chunks.len())).bold());
    for (i, chunk) in metadata.chunks.iter().enumerate() {
        println!(
            "    {:>4}  {}  {}  {}",
            i,
            style(chunk.key.to_hex()).dim(),
            format_bytes(chunk.size),
            chunk.shards.join(", ")
        );
    }
}

fn hash_point(metadata: &Metadata) -> &'static str {
    match metadata.hash_point {
        shardstor_core::metadata::HashPoint::Plaintext => "plaintext",
        shardstor_core::metadata::HashPoint::Processed => "processed",
    }
}
