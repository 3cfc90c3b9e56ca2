//! shardstor Core Library
//!
//! Pure-CPU building blocks of the shardstor storage pipeline.
//! This crate provides:
//! - Fixed-size chunking over slices and streaming readers
//! - Content hashing (BLAKE2b, SHA-256, MD5) and AES-GCM encryption
//! - Snappy / gzip block compression
//! - Reed-Solomon erasure coding with loss-tolerant reconstruction
//! - The transform pipeline and the versioned metadata record
//! - Error types and per-shard error accounting

pub mod chunk;
pub mod compress;
pub mod crypto;
pub mod erasure;
pub mod error;
pub mod metadata;
pub mod pipeline;
pub mod shard_error;

pub use chunk::{chunk_count, Chunker};
pub use compress::{CompressionAlgorithm, CompressionLevel, Compressor};
pub use crypto::{ContentKey, EncryptionKey, Encrypter, HashAlgorithm, Hasher};
pub use erasure::{ErasureCodec, ErasureConfig, ErasureEngine, Fragment, FRAGMENT_ALIGNMENT};
pub use error::{ErrorKind, Result, ShardStorError};
pub use metadata::{
    slot_key, ChunkRecord, CodecKind, CodecParams, HashPoint, Metadata, StageDescriptor,
    SCHEMA_VERSION,
};
pub use pipeline::{Pipeline, ProcessedChunk, Stage, StageAction, StageConfig, StageType};
pub use shard_error::{ShardError, ShardErrorSet, SHARD_KIND_METADATA, SHARD_KIND_OBJECT};

/// Chunk size used when a configuration does not set one
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024; // 4 MB
