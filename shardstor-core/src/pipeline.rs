//! Per-chunk transform pipeline
//!
//! A pipeline is an ordered list of invertible stages. Writing applies the
//! stages front to back; reading applies the inverses back to front, so
//! `read(write(x)) == x` for every symmetric configuration.
//!
//! | stage    | write                  | read                     |
//! |----------|------------------------|--------------------------|
//! | compress | compress               | decompress               |
//! | encrypt  | encrypt (fresh nonce)  | decrypt                  |
//! | hash     | record digest          | verify recorded digest   |

use crate::compress::{CompressionAlgorithm, CompressionLevel, Compressor};
use crate::crypto::{ContentKey, EncryptionKey, Encrypter, HashAlgorithm, Hasher, KEY_SIZE};
use crate::error::{Result, ShardStorError};
use crate::metadata::StageDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

const NONCE_POLICY: &str = "random-prepended";

/// Kind of a pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageType {
    Compress,
    Encrypt,
    Hash,
}

impl fmt::Display for StageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageType::Compress => "compress",
            StageType::Encrypt => "encrypt",
            StageType::Hash => "hash",
        };
        f.write_str(s)
    }
}

/// Direction(s) a stage takes part in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageAction {
    Write,
    Read,
    #[default]
    Both,
}

impl StageAction {
    pub fn on_write(self) -> bool {
        matches!(self, StageAction::Write | StageAction::Both)
    }

    pub fn on_read(self) -> bool {
        matches!(self, StageAction::Read | StageAction::Both)
    }
}

/// Declarative stage configuration
///
/// `privkey` is either 32 raw bytes or 64 hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub stage_type: StageType,
    #[serde(default)]
    pub action: StageAction,
    #[serde(default)]
    pub algorithm: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub privkey: Option<String>,
    #[serde(default)]
    pub key_id: Option<String>,
}

impl StageConfig {
    pub fn new(stage_type: StageType) -> Self {
        Self {
            name: None,
            stage_type,
            action: StageAction::Both,
            algorithm: None,
            level: None,
            privkey: None,
            key_id: None,
        }
    }

    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = Some(algorithm.into());
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    pub fn with_privkey(mut self, privkey: impl Into<String>) -> Self {
        self.privkey = Some(privkey.into());
        self
    }

    pub fn with_action(mut self, action: StageAction) -> Self {
        self.action = action;
        self
    }
}

/// A single transform
#[derive(Debug)]
pub enum Stage {
    Compress(Compressor),
    Encrypt(Encrypter),
    Hash(Hasher),
}

impl Stage {
    pub fn stage_type(&self) -> StageType {
        match self {
            Stage::Compress(_) => StageType::Compress,
            Stage::Encrypt(_) => StageType::Encrypt,
            Stage::Hash(_) => StageType::Hash,
        }
    }

    fn from_config(config: &StageConfig) -> Result<Self> {
        match config.stage_type {
            StageType::Compress => {
                let algorithm = match &config.algorithm {
                    Some(a) => a.parse::<CompressionAlgorithm>()?,
                    None => CompressionAlgorithm::default(),
                };
                let level = match &config.level {
                    Some(l) => l.parse::<CompressionLevel>()?,
                    None => CompressionLevel::default(),
                };
                Ok(Stage::Compress(Compressor::new(algorithm, level)))
            }
            StageType::Encrypt => {
                let algorithm = config.algorithm.as_deref().unwrap_or("aes-gcm");
                if !algorithm.eq_ignore_ascii_case("aes-gcm") {
                    return Err(ShardStorError::InvalidConfig(format!(
                        "unknown encryption algorithm: {}",
                        algorithm
                    )));
                }
                let privkey = config.privkey.as_deref().ok_or_else(|| {
                    ShardStorError::InvalidConfig("encrypt stage requires privkey".to_string())
                })?;
                let key = parse_privkey(privkey)?;
                let encrypter = Encrypter::new(&key);
                Ok(Stage::Encrypt(match &config.key_id {
                    Some(id) => encrypter.with_key_id(id.clone()),
                    None => encrypter,
                }))
            }
            StageType::Hash => {
                if config.action == StageAction::Read {
                    return Err(ShardStorError::InvalidConfig(
                        "hash stage cannot be read-only: nothing records its digest".to_string(),
                    ));
                }
                let algorithm = match &config.algorithm {
                    Some(a) => a.parse::<HashAlgorithm>()?,
                    None => HashAlgorithm::default(),
                };
                Ok(Stage::Hash(Hasher::new(algorithm)))
            }
        }
    }

    fn descriptor(&self, name: &str, action: StageAction) -> StageDescriptor {
        let (algorithm, level, key_id, nonce_policy) = match self {
            Stage::Compress(c) => (
                c.algorithm().to_string(),
                (c.algorithm() == CompressionAlgorithm::Gzip)
                    .then(|| c.level().as_str().to_string()),
                None,
                None,
            ),
            Stage::Encrypt(e) => (
                "aes-gcm".to_string(),
                None,
                Some(e.key_id().to_string()),
                Some(NONCE_POLICY.to_string()),
            ),
            Stage::Hash(h) => (h.algorithm().to_string(), None, None, None),
        };
        StageDescriptor {
            stage_type: self.stage_type(),
            name: name.to_string(),
            action,
            algorithm,
            level,
            key_id,
            nonce_policy,
        }
    }
}

fn parse_privkey(privkey: &str) -> Result<EncryptionKey> {
    if privkey.len() == KEY_SIZE {
        return EncryptionKey::from_slice(privkey.as_bytes());
    }
    if privkey.len() == KEY_SIZE * 2 {
        if let Ok(bytes) = hex::decode(privkey) {
            return EncryptionKey::from_slice(&bytes);
        }
    }
    Err(ShardStorError::InvalidConfig(format!(
        "privkey must be {} bytes or {} hex characters, got {} characters",
        KEY_SIZE,
        KEY_SIZE * 2,
        privkey.len()
    )))
}

#[derive(Debug)]
struct PipelineStage {
    name: String,
    action: StageAction,
    stage: Stage,
    /// Position of this stage's digest in `ProcessedChunk::digests`
    digest_slot: Option<usize>,
}

/// Output of the write direction for one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedChunk {
    pub data: Vec<u8>,
    /// Digests recorded by hash stages, in write order
    pub digests: Vec<ContentKey>,
}

/// Ordered stack of stages. Single-threaded by contract.
#[derive(Debug, Default)]
pub struct Pipeline {
    stages: Vec<PipelineStage>,
    digest_count: usize,
}

impl Pipeline {
    /// Pipeline with no stages: both directions are the identity
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from declarative stage configs
    pub fn from_config(configs: &[StageConfig]) -> Result<Self> {
        let mut pipeline = Self::new();
        for config in configs {
            let stage = Stage::from_config(config)?;
            let name = config
                .name
                .clone()
                .unwrap_or_else(|| config.stage_type.to_string());
            pipeline.push(name, config.action, stage);
        }
        Ok(pipeline)
    }

    /// Append a stage
    pub fn push(&mut self, name: impl Into<String>, action: StageAction, stage: Stage) {
        let digest_slot = match (&stage, action.on_write()) {
            (Stage::Hash(_), true) => {
                self.digest_count += 1;
                Some(self.digest_count - 1)
            }
            _ => None,
        };
        self.stages.push(PipelineStage {
            name: name.into(),
            action,
            stage,
            digest_slot,
        });
    }

    /// Builder form of [`Pipeline::push`] for a stage active in both directions
    pub fn with_stage(mut self, name: impl Into<String>, stage: Stage) -> Self {
        self.push(name, StageAction::Both, stage);
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Number of digests a write records
    pub fn digest_count(&self) -> usize {
        self.digest_count
    }

    /// Stage descriptions for metadata, in write order
    pub fn descriptors(&self) -> Vec<StageDescriptor> {
        self.stages
            .iter()
            .map(|s| s.stage.descriptor(&s.name, s.action))
            .collect()
    }

    /// Apply the write direction
    pub fn write(&self, data: &[u8]) -> Result<ProcessedChunk> {
        let mut current = data.to_vec();
        let mut digests = Vec::with_capacity(self.digest_count);

        for ps in self.stages.iter().filter(|s| s.action.on_write()) {
            current = match &ps.stage {
                Stage::Compress(c) => c.compress(&current)?,
                Stage::Encrypt(e) => e.encrypt(&current)?,
                Stage::Hash(h) => {
                    digests.push(h.hash(&current));
                    current
                }
            };
            trace!(stage = %ps.name, len = current.len(), "write stage applied");
        }

        Ok(ProcessedChunk {
            data: current,
            digests,
        })
    }

    /// Apply the read direction, verifying hash stages against `digests`
    pub fn read(&self, data: &[u8], digests: &[ContentKey]) -> Result<Vec<u8>> {
        let mut current = data.to_vec();

        for ps in self.stages.iter().rev().filter(|s| s.action.on_read()) {
            current = match &ps.stage {
                Stage::Compress(c) => c.decompress(&current)?,
                Stage::Encrypt(e) => e.decrypt(&current)?,
                Stage::Hash(h) => {
                    let expected = ps
                        .digest_slot
                        .and_then(|slot| digests.get(slot))
                        .ok_or_else(|| {
                            ShardStorError::CorruptData(format!(
                                "no recorded digest for hash stage {}",
                                ps.name
                            ))
                        })?;
                    if !h.verify(&current, expected) {
                        return Err(ShardStorError::CorruptData(format!(
                            "digest mismatch at hash stage {}",
                            ps.name
                        )));
                    }
                    current
                }
            };
            trace!(stage = %ps.name, len = current.len(), "read stage applied");
        }

        Ok(current)
    }
}
