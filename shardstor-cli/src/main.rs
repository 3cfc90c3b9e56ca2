//! shardstor CLI
//!
//! Command-line front end for the shardstor client.
//!
//! # Commands
//! - `upload` - Store a local file
//! - `download` - Fetch an object into a local file
//! - `check` - Report an object's redundancy
//! - `repair` - Rewrite an object's missing fragments
//! - `delete` - Remove an object's metadata
//! - `stat` - Show an object's metadata
//!
//! # Exit codes
//! `0` success, `1` invalid arguments or configuration, `2` local I/O or
//! other failures, `3` unrecoverable shard failures.

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use shardstor_client::{ErrorKind, ShardStorError};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod symbols;

use commands::{check, delete, download, repair, stat, upload};

#[derive(Parser)]
#[command(name = "shardstor")]
#[command(about = "Chunked, encrypted, erasure-coded object storage")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a local file
    Upload {
        /// Path to the TOML config file
        config: PathBuf,

        /// File to store
        file: PathBuf,

        /// Object key (defaults to the file name)
        #[arg(short, long)]
        key: Option<String>,

        /// Extra metadata entry, as key=value (repeatable)
        #[arg(short, long = "meta", value_parser = parse_meta)]
        meta: Vec<(String, String)>,
    },

    /// Fetch an object into a local file
    Download {
        /// Path to the TOML config file
        config: PathBuf,

        /// Object key
        key: String,

        /// Output file
        output: PathBuf,

        /// Start of a byte range to fetch
        #[arg(long)]
        offset: Option<u64>,

        /// Length of the byte range (defaults to the rest of the object)
        #[arg(long, requires = "offset")]
        length: Option<u64>,
    },

    /// Report whether an object is optimal, valid or invalid
    Check {
        /// Object key
        key: String,

        /// Only ask shards whether they hold their fragment
        #[arg(long)]
        fast: bool,

        /// Path to the TOML config file
        #[arg(short, long, env = "SHARDSTOR_CONFIG")]
        config: PathBuf,
    },

    /// Rewrite the missing fragments of an object
    Repair {
        /// Object key
        key: String,

        /// Path to the TOML config file
        #[arg(short, long, env = "SHARDSTOR_CONFIG")]
        config: PathBuf,
    },

    /// Remove an object's metadata
    Delete {
        /// Object key
        key: String,

        /// Delete without confirmation
        #[arg(short, long)]
        force: bool,

        /// Path to the TOML config file
        #[arg(short, long, env = "SHARDSTOR_CONFIG")]
        config: PathBuf,
    },

    /// Show an object's metadata
    Stat {
        /// Object key
        key: String,

        /// Print the record as JSON
        #[arg(long)]
        json: bool,

        /// Path to the TOML config file
        #[arg(short, long, env = "SHARDSTOR_CONFIG")]
        config: PathBuf,
    },
}

fn parse_meta(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {} {:#}", symbols::fail(), style("Error:").red().bold(), e);
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Upload {
            config,
            file,
            key,
            meta,
        } => {
            let config = upload::UploadConfig {
                config,
                file,
                key,
                user_defined: meta.into_iter().collect(),
            };
            upload::run(config).await
        }

        Commands::Download {
            config,
            key,
            output,
            offset,
            length,
        } => {
            let range = offset.map(|offset| (offset, length));
            let config = download::DownloadConfig {
                config,
                key,
                output,
                range,
            };
            download::run(config).await
        }

        Commands::Check { key, fast, config } => check::run(check::CheckConfig { config, key, fast }).await,

        Commands::Repair { key, config } => repair::run(repair::RepairConfig { config, key }).await,

        Commands::Delete { key, force, config } => {
            delete::run(delete::DeleteConfig { config, key, force }).await
        }

        Commands::Stat { key, json, config } => stat::run(stat::StatConfig { config, key, json }).await,
    }
}

/// Map a failure to the process exit code
fn exit_code(err: &anyhow::Error) -> u8 {
    let cause = err
        .chain()
        .find_map(|c| c.downcast_ref::<ShardStorError>());

    match cause {
        None => 2,
        Some(e) => match e.kind() {
            ErrorKind::InvalidConfig => 1,
            ErrorKind::Unrecoverable
            | ErrorKind::Timeout
            | ErrorKind::ShardIo
            | ErrorKind::InvalidShardAddress
            | ErrorKind::UnknownShardError
            | ErrorKind::CorruptData => 3,
            ErrorKind::NotFound | ErrorKind::Cancelled | ErrorKind::LocalIo => 2,
        },
    }
}
