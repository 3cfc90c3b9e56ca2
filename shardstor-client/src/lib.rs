//! shardstor Client
//!
//! Ties the core pipeline and the shard layer together:
//! - `Config`: the TOML configuration document
//! - `MetaStore`: metadata records on the metadata shards
//! - `Client`: store, read, check and repair objects
//! - `Traversal`: walk chains of linked objects

pub mod client;
pub mod config;
pub mod linked;
pub mod metastor;

pub use client::{CheckStatus, ChunkState, Client};
pub use config::{CodecConfig, Config};
pub use linked::{Traversal, TraverseOrder};
pub use metastor::MetaStore;

pub use shardstor_core::error::{ErrorKind, Result, ShardStorError};
pub use shardstor_core::metadata::Metadata;
