//! Client configuration
//!
//! Config file format (TOML):
//! ```toml
//! organization = "acme"
//! namespace = "photos"
//! shards = ["sled:///var/lib/shardstor/s0", "sled:///var/lib/shardstor/s1", "sled:///var/lib/shardstor/s2"]
//! metadata_shards = ["sled:///var/lib/shardstor/meta"]
//! chunk_size = 4194304
//! hasher = "blake2b"
//! hash_point = "processed"
//! shard_timeout_ms = 5000
//!
//! [codec]
//! kind = "erasure"
//! k = 2
//! m = 1
//!
//! [[pipeline]]
//! type = "compress"
//! algorithm = "snappy"
//!
//! [[pipeline]]
//! type = "encrypt"
//! algorithm = "aes-gcm"
//! privkey = "11111111111111111111111111111111"
//!
//! [[metadata_pipeline]]
//! type = "compress"
//! algorithm = "snappy"
//! ```

use serde::{Deserialize, Serialize};
use shardstor_core::crypto::HashAlgorithm;
use shardstor_core::erasure::ErasureConfig;
use shardstor_core::error::{Result, ShardStorError};
use shardstor_core::metadata::{CodecParams, HashPoint};
use shardstor_core::pipeline::{Pipeline, StageConfig, StageType};
use shardstor_core::DEFAULT_CHUNK_SIZE;
use shardstor_storage::replicator::ReplicationMode;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Redundancy configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CodecConfig {
    /// One copy per chunk
    #[default]
    None,
    /// `replicas` identical copies
    Replication {
        replicas: usize,
        #[serde(default)]
        mode: ReplicationMode,
        /// Failed replicas a write may leave behind
        #[serde(default)]
        tolerance: usize,
    },
    /// Reed-Solomon with `k` data and `m` parity fragments
    Erasure { k: usize, m: usize },
}

impl CodecConfig {
    /// Parameters recorded in metadata
    pub fn params(&self) -> CodecParams {
        match *self {
            CodecConfig::None => CodecParams::none(),
            CodecConfig::Replication { replicas, .. } => CodecParams::replication(replicas),
            CodecConfig::Erasure { k, m } => CodecParams::erasure(k, m),
        }
    }

    /// Failed slots a write may leave behind
    pub fn write_tolerance(&self) -> usize {
        match *self {
            CodecConfig::None => 0,
            CodecConfig::Replication { tolerance, .. } => tolerance,
            CodecConfig::Erasure { m, .. } => m,
        }
    }
}

/// Client configuration document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_organization")]
    pub organization: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Object shards, in placement order
    #[serde(default)]
    pub shards: Vec<String>,

    /// Metadata shards
    #[serde(default)]
    pub metadata_shards: Vec<String>,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default)]
    pub pipeline: Vec<StageConfig>,

    /// Stages applied to encoded metadata records. Hash stages are rejected
    /// since a record has nowhere to keep their digests.
    #[serde(default)]
    pub metadata_pipeline: Vec<StageConfig>,

    #[serde(default)]
    pub codec: CodecConfig,

    #[serde(default)]
    pub hasher: HashAlgorithm,

    #[serde(default)]
    pub hash_point: HashPoint,

    /// Per-operation deadline for shard I/O
    #[serde(default)]
    pub shard_timeout_ms: Option<u64>,
}

fn default_organization() -> String {
    "default".to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Config {
    /// Minimal configuration over the given shard lists
    pub fn new(shards: Vec<String>, metadata_shards: Vec<String>) -> Self {
        Self {
            organization: default_organization(),
            namespace: default_namespace(),
            shards,
            metadata_shards,
            chunk_size: default_chunk_size(),
            pipeline: Vec::new(),
            metadata_pipeline: Vec::new(),
            codec: CodecConfig::None,
            hasher: HashAlgorithm::default(),
            hash_point: HashPoint::default(),
            shard_timeout_ms: None,
        }
    }

    pub fn with_codec(mut self, codec: CodecConfig) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_pipeline(mut self, pipeline: Vec<StageConfig>) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_metadata_pipeline(mut self, pipeline: Vec<StageConfig>) -> Self {
        self.metadata_pipeline = pipeline;
        self
    }

    pub fn with_hash_point(mut self, hash_point: HashPoint) -> Self {
        self.hash_point = hash_point;
        self
    }

    pub fn with_shard_timeout(mut self, timeout: Duration) -> Self {
        self.shard_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Parse a TOML document and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| ShardStorError::InvalidConfig(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ShardStorError::Serialization(format!("failed to serialize config: {}", e)))
    }

    pub fn shard_timeout(&self) -> Option<Duration> {
        self.shard_timeout_ms.map(Duration::from_millis)
    }

    /// Check every construction-time constraint
    pub fn validate(&self) -> Result<()> {
        if self.organization.is_empty() || self.namespace.is_empty() {
            return Err(invalid("organization and namespace must not be empty"));
        }
        check_addresses("shards", &self.shards)?;
        check_addresses("metadata_shards", &self.metadata_shards)?;

        if self.chunk_size == 0 {
            return Err(invalid("chunk_size must be > 0"));
        }

        match self.codec {
            CodecConfig::None => {}
            CodecConfig::Replication {
                replicas,
                tolerance,
                ..
            } => {
                if replicas == 0 {
                    return Err(invalid("replication needs at least one replica"));
                }
                if replicas > self.shards.len() {
                    return Err(invalid(format!(
                        "{} replicas need {} shards, only {} configured",
                        replicas,
                        replicas,
                        self.shards.len()
                    )));
                }
                if tolerance >= replicas {
                    return Err(invalid(format!(
                        "replication tolerance {} must be below the replica count {}",
                        tolerance, replicas
                    )));
                }
            }
            CodecConfig::Erasure { k, m } => {
                ErasureConfig::new(k, m)?;
                if self.shards.len() < k + m {
                    return Err(invalid(format!(
                        "erasure {}+{} needs {} shards, only {} configured",
                        k,
                        m,
                        k + m,
                        self.shards.len()
                    )));
                }
            }
        }

        Pipeline::from_config(&self.pipeline)?;
        if self
            .metadata_pipeline
            .iter()
            .any(|stage| stage.stage_type == StageType::Hash)
        {
            return Err(invalid("metadata_pipeline cannot contain hash stages"));
        }
        Pipeline::from_config(&self.metadata_pipeline)?;
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> ShardStorError {
    ShardStorError::InvalidConfig(msg.into())
}

fn check_addresses(field: &str, addresses: &[String]) -> Result<()> {
    if addresses.is_empty() {
        return Err(invalid(format!("{} must not be empty", field)));
    }
    let mut seen = HashSet::new();
    for address in addresses {
        if address.is_empty() {
            return Err(invalid(format!("{} contains an empty address", field)));
        }
        if !seen.insert(address) {
            return Err(invalid(format!("{} lists {} twice", field, address)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardstor_core::metadata::CodecKind;

    const FULL: &str = r#"
        organization = "acme"
        namespace = "photos"
        shards = ["memory://s0", "memory://s1", "memory://s2", "memory://s3"]
        metadata_shards = ["memory://meta"]
        chunk_size = 1024
        hasher = "sha256"
        hash_point = "plaintext"
        shard_timeout_ms = 250

        [codec]
        kind = "erasure"
        k = 2
        m = 1

        [[pipeline]]
        type = "compress"
        algorithm = "gzip"
        level = "best-speed"

        [[pipeline]]
        type = "encrypt"
        privkey = "11111111111111111111111111111111"

        [[metadata_pipeline]]
        type = "compress"
        algorithm = "snappy"
    "#;

    fn shards(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("memory://s{}", i)).collect()
    }

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_toml_str(FULL).unwrap();
        assert_eq!(config.organization, "acme");
        assert_eq!(config.codec, CodecConfig::Erasure { k: 2, m: 1 });
        assert_eq!(config.codec.params().kind, CodecKind::Erasure);
        assert_eq!(config.hasher, HashAlgorithm::Sha256);
        assert_eq!(config.hash_point, HashPoint::Plaintext);
        assert_eq!(config.shard_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.pipeline.len(), 2);
        assert_eq!(config.metadata_pipeline[0].stage_type, StageType::Compress);
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_toml_str(
            r#"
            shards = ["memory://a"]
            metadata_shards = ["memory://m"]
            "#,
        )
        .unwrap();
        assert_eq!(config.namespace, "default");
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.codec, CodecConfig::None);
        assert_eq!(config.hasher, HashAlgorithm::Blake2b);
        assert_eq!(config.hash_point, HashPoint::Processed);
        assert_eq!(config.shard_timeout(), None);
    }

    #[test]
    fn test_replication_section() {
        let config = Config::from_toml_str(
            r#"
            shards = ["memory://a", "memory://b", "memory://c"]
            metadata_shards = ["memory://m"]

            [codec]
            kind = "replication"
            replicas = 3
            mode = "sync"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.codec,
            CodecConfig::Replication {
                replicas: 3,
                mode: ReplicationMode::Sync,
                tolerance: 0
            }
        );
        assert_eq!(config.codec.params().slots(), 3);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config::from_toml_str(FULL).unwrap();
        let again = Config::from_toml_str(&config.to_toml().unwrap()).unwrap();
        assert_eq!(again, config);
    }

    #[test]
    fn test_validation_failures() {
        let base = Config::new(shards(4), vec!["memory://m".to_string()]);
        let bad = vec![
            Config::new(vec![], vec!["memory://m".to_string()]),
            Config::new(shards(2), vec![]),
            Config::new(vec!["memory://a".to_string(), "memory://a".to_string()], vec!["memory://m".to_string()]),
            base.clone().with_chunk_size(0),
            base.clone().with_codec(CodecConfig::Erasure { k: 0, m: 1 }),
            base.clone().with_codec(CodecConfig::Erasure { k: 3, m: 2 }),
            base.clone().with_codec(CodecConfig::Erasure { k: 200, m: 100 }),
            base.clone().with_codec(CodecConfig::Replication {
                replicas: 0,
                mode: ReplicationMode::Async,
                tolerance: 0,
            }),
            base.clone().with_codec(CodecConfig::Replication {
                replicas: 5,
                mode: ReplicationMode::Async,
                tolerance: 0,
            }),
            base.clone().with_codec(CodecConfig::Replication {
                replicas: 2,
                mode: ReplicationMode::Async,
                tolerance: 2,
            }),
            base.clone().with_pipeline(vec![StageConfig::new(StageType::Encrypt)]),
            base.clone().with_metadata_pipeline(vec![StageConfig::new(StageType::Hash)]),
            base.clone().with_metadata_pipeline(vec![StageConfig::new(StageType::Encrypt)]),
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(ShardStorError::InvalidConfig(_))),
                "accepted {:?}",
                config
            );
        }
        base.validate().unwrap();
    }

    #[test]
    fn test_unknown_values_rejected() {
        for doc in [
            "shards = [\"memory://a\"]\nmetadata_shards = [\"memory://m\"]\nhasher = \"sha1\"",
            "shards = [\"memory://a\"]\nmetadata_shards = [\"memory://m\"]\n[codec]\nkind = \"raid\"",
            "shards = [\"memory://a\"]\nmetadata_shards = [\"memory://m\"]\nchunk_size = -1",
        ] {
            assert!(matches!(
                Config::from_toml_str(doc),
                Err(ShardStorError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_load_missing_file_is_io() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ShardStorError::Io(_)));
    }
}
