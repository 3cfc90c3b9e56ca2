//! shardstor Storage Layer
//!
//! Provides the shard side of the pipeline:
//! - `ShardClient` trait for pluggable shard transports
//! - `MemoryShard` for testing, `SledShard` for persistent local shards
//! - `ShardCluster` for address resolution and placement
//! - `ShardFanout` and `Replicator` for parallel, failure-accounted I/O

pub mod backend;
pub mod cluster;
pub mod fanout;
pub mod memory;
pub mod replicator;
pub mod sled_backend;

pub use backend::{AsyncWrapper, ShardClient, ShardClientSync, ShardFuture, StorageStats};
pub use cluster::{parse_address, LocalConnector, ShardCluster, ShardConnector};
pub use fanout::{FanoutOptions, FanoutOutcome, FanoutRead, ShardFanout, ShardTarget};
pub use memory::MemoryShard;
pub use replicator::{ReplicationMode, ReplicationReport, Replicator};
pub use sled_backend::SledShard;
