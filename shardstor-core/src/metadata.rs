//! Object metadata record
//!
//! A [`Metadata`] record pins everything needed to rebuild an object: the
//! chunking, the transform stack (by description, never by key material),
//! the codec and the placement of every chunk.
//!
//! Wire format: `b"SSMD" || u32-LE schema_version || bincode(body)`. Readers
//! accept every schema version up to their own and reject newer ones.

use crate::chunk::chunk_count;
use crate::crypto::{ContentKey, HashAlgorithm};
use crate::error::{Result, ShardStorError};
use crate::pipeline::{StageAction, StageType};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Leading bytes of an encoded metadata record
pub const METADATA_MAGIC: &[u8; 4] = b"SSMD";

/// Current schema version written by this crate
pub const SCHEMA_VERSION: u32 = 1;

const HEADER_LEN: usize = METADATA_MAGIC.len() + 4;

/// Redundancy scheme applied to each chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    /// Single copy on one shard
    #[default]
    None,
    /// Identical copies on `k` shards
    Replication,
    /// Reed-Solomon over `k + m` shards
    Erasure,
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CodecKind::None => "none",
            CodecKind::Replication => "replication",
            CodecKind::Erasure => "erasure",
        };
        f.write_str(s)
    }
}

/// Codec parameters as recorded in metadata
///
/// For replication `k` is the replica count and `m` is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CodecParams {
    pub kind: CodecKind,
    pub k: usize,
    pub m: usize,
}

impl CodecParams {
    pub fn none() -> Self {
        Self {
            kind: CodecKind::None,
            k: 1,
            m: 0,
        }
    }

    pub fn replication(replicas: usize) -> Self {
        Self {
            kind: CodecKind::Replication,
            k: replicas,
            m: 0,
        }
    }

    pub fn erasure(k: usize, m: usize) -> Self {
        Self {
            kind: CodecKind::Erasure,
            k,
            m,
        }
    }

    /// Number of shard slots per chunk
    pub fn slots(&self) -> usize {
        match self.kind {
            CodecKind::None => 1,
            CodecKind::Replication => self.k,
            CodecKind::Erasure => self.k + self.m,
        }
    }

    /// Slots that can be lost while the chunk stays readable
    pub fn recoverable_losses(&self) -> usize {
        match self.kind {
            CodecKind::None => 0,
            CodecKind::Replication => self.k.saturating_sub(1),
            CodecKind::Erasure => self.m,
        }
    }
}

/// Where in the write pipeline the content key is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashPoint {
    /// Digest of the raw chunk
    Plaintext,
    /// Digest of the chunk after every write stage
    #[default]
    Processed,
}

impl FromStr for HashPoint {
    type Err = ShardStorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "plaintext" => Ok(HashPoint::Plaintext),
            "processed" => Ok(HashPoint::Processed),
            other => Err(ShardStorError::InvalidConfig(format!(
                "unknown hash point: {}",
                other
            ))),
        }
    }
}

/// Description of one pipeline stage. Holds a key identifier, never a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDescriptor {
    pub stage_type: StageType,
    pub name: String,
    pub action: StageAction,
    pub algorithm: String,
    pub level: Option<String>,
    pub key_id: Option<String>,
    pub nonce_policy: Option<String>,
}

/// Placement of one chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Content key taken at the object's hash point
    pub key: ContentKey,
    /// Digest of the processed payload. Every slot of the chunk is stored
    /// under a key derived from it, so two writes of the same plaintext that
    /// produce different payloads never share slots. Equal to `key` when the
    /// hash point is `Processed`.
    pub payload_key: ContentKey,
    /// Raw chunk length
    pub size: u64,
    /// Length of the processed payload handed to the codec
    pub stored_size: u64,
    /// Shard address per slot. For erasure, slot `i` holds fragment `i`.
    pub shards: Vec<String>,
    /// Hash-stage digests in write order
    pub digests: Vec<ContentKey>,
}

/// Key used on a shard for one slot of a chunk, given its payload key
///
/// Erasure fragments differ per slot, so the slot index is part of the key.
/// Replicas are identical and share the bare payload key.
pub fn slot_key(key: &ContentKey, codec: CodecKind, slot: usize) -> Vec<u8> {
    match codec {
        CodecKind::Erasure => format!("{}.{}", key.to_hex(), slot).into_bytes(),
        CodecKind::Replication | CodecKind::None => key.to_hex().into_bytes(),
    }
}

/// Metadata record of a stored object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Logical key supplied by the caller
    pub key: String,
    pub namespace: String,
    pub chunk_size: u64,
    /// Sum of raw chunk sizes
    pub original_size: u64,
    /// Sum of processed chunk sizes
    pub storage_size: u64,
    pub codec: CodecParams,
    pub stages: Vec<StageDescriptor>,
    pub hasher: HashAlgorithm,
    pub hash_point: HashPoint,
    pub chunks: Vec<ChunkRecord>,
    /// Unix seconds
    pub created_at: i64,
    /// Unix seconds
    pub last_write_at: i64,
    pub user_defined: BTreeMap<String, String>,
    /// Object this one was linked after, see `Client::write_linked`
    pub previous_key: Option<String>,
    /// Object linked after this one
    pub next_key: Option<String>,
}

impl Metadata {
    /// Empty record stamped with the current time
    pub fn new(
        key: impl Into<String>,
        namespace: impl Into<String>,
        chunk_size: u64,
        codec: CodecParams,
        hasher: HashAlgorithm,
        hash_point: HashPoint,
        stages: Vec<StageDescriptor>,
    ) -> Self {
        let now = Utc::now().timestamp();
        Self {
            key: key.into(),
            namespace: namespace.into(),
            chunk_size,
            original_size: 0,
            storage_size: 0,
            codec,
            stages,
            hasher,
            hash_point,
            chunks: Vec::new(),
            created_at: now,
            last_write_at: now,
            user_defined: BTreeMap::new(),
            previous_key: None,
            next_key: None,
        }
    }

    /// Append a placed chunk and update the size totals
    pub fn push_chunk(&mut self, chunk: ChunkRecord) {
        self.original_size += chunk.size;
        self.storage_size += chunk.stored_size;
        self.chunks.push(chunk);
    }

    /// Bump `last_write_at`
    pub fn touch(&mut self) {
        self.last_write_at = Utc::now().timestamp();
    }

    /// Check the structural invariants of the record
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ShardStorError::CorruptData(
                "metadata chunk_size is zero".to_string(),
            ));
        }
        let expected = chunk_count(self.original_size, self.chunk_size);
        if self.chunks.len() as u64 != expected {
            return Err(ShardStorError::CorruptData(format!(
                "metadata lists {} chunks, expected {} for {} bytes",
                self.chunks.len(),
                expected,
                self.original_size
            )));
        }
        let total: u64 = self.chunks.iter().map(|c| c.size).sum();
        if total != self.original_size {
            return Err(ShardStorError::CorruptData(format!(
                "chunk sizes sum to {}, expected {}",
                total, self.original_size
            )));
        }

        let slots = self.codec.slots();
        if slots == 0 || (self.codec.kind == CodecKind::Erasure && self.codec.k == 0) {
            return Err(ShardStorError::CorruptData(format!(
                "codec {} with k={} m={} has no data slots",
                self.codec.kind, self.codec.k, self.codec.m
            )));
        }

        let last = self.chunks.len().saturating_sub(1);
        for (i, chunk) in self.chunks.iter().enumerate() {
            let size_ok = if i < last {
                chunk.size == self.chunk_size
            } else {
                chunk.size > 0 && chunk.size <= self.chunk_size
            };
            if !size_ok {
                return Err(ShardStorError::CorruptData(format!(
                    "chunk {} holds {} bytes with chunk size {}",
                    i, chunk.size, self.chunk_size
                )));
            }
            if chunk.payload_key.as_bytes().is_empty() {
                return Err(ShardStorError::CorruptData(format!(
                    "chunk {} has no payload key",
                    i
                )));
            }
            if chunk.shards.len() != slots {
                return Err(ShardStorError::CorruptData(format!(
                    "chunk {} has {} shards, codec {} needs {}",
                    i,
                    chunk.shards.len(),
                    self.codec.kind,
                    slots
                )));
            }
            if chunk.shards.iter().any(|s| s.is_empty()) {
                return Err(ShardStorError::CorruptData(format!(
                    "chunk {} has an empty shard address",
                    i
                )));
            }
        }

        for link in self.previous_key.iter().chain(self.next_key.iter()) {
            if link.is_empty() || *link == self.key {
                return Err(ShardStorError::CorruptData(format!(
                    "metadata {} links to {:?}",
                    self.key, link
                )));
            }
        }
        Ok(())
    }

    /// Encode with the versioned header
    pub fn encode(&self) -> Result<Vec<u8>> {
        let body = bincode::serialize(self)?;
        let mut out = Vec::with_capacity(HEADER_LEN + body.len());
        out.extend_from_slice(METADATA_MAGIC);
        out.extend_from_slice(&SCHEMA_VERSION.to_le_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Decode any supported schema version
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN || &data[..METADATA_MAGIC.len()] != METADATA_MAGIC {
            return Err(ShardStorError::CorruptData(
                "not a metadata record".to_string(),
            ));
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&data[METADATA_MAGIC.len()..HEADER_LEN]);
        let version = u32::from_le_bytes(version);

        match version {
            1 => {
                let metadata: Metadata = bincode::deserialize(&data[HEADER_LEN..])?;
                Ok(metadata)
            }
            v => Err(ShardStorError::CorruptData(format!(
                "unsupported metadata schema version {} (max {})",
                v, SCHEMA_VERSION
            ))),
        }
    }
}
