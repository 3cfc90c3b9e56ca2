//! Reed-Solomon Erasure Coding
//!
//! Implements (k, m) erasure coding where:
//! - k data fragments (minimum required to reconstruct)
//! - m parity fragments (redundancy)
//! - any k of the k + m fragments reconstruct the input
//!
//! Padding is the codec's job: input is zero-padded so every fragment has
//! the same length, a multiple of [`FRAGMENT_ALIGNMENT`]. The math sits
//! behind [`ErasureEngine`] so the Reed-Solomon backend can be swapped.

use crate::error::{Result, ShardStorError};
use bytes::Bytes;
use reed_solomon_erasure::galois_8::ReedSolomon;
use serde::{Deserialize, Serialize};

/// Every fragment length is a multiple of this many bytes
pub const FRAGMENT_ALIGNMENT: usize = 64;

/// GF(256) limits the total number of fragments
pub const MAX_TOTAL_SHARDS: usize = 255;

/// Erasure coding configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErasureConfig {
    /// Number of data shards (k)
    pub data_shards: usize,
    /// Number of parity shards (m)
    pub parity_shards: usize,
}

impl ErasureConfig {
    /// Create a new erasure config
    pub fn new(data_shards: usize, parity_shards: usize) -> Result<Self> {
        if data_shards == 0 {
            return Err(ShardStorError::InvalidConfig(
                "data_shards must be > 0".to_string(),
            ));
        }
        if data_shards + parity_shards > MAX_TOTAL_SHARDS {
            return Err(ShardStorError::InvalidConfig(format!(
                "data_shards + parity_shards must be <= {}, got {}",
                MAX_TOTAL_SHARDS,
                data_shards + parity_shards
            )));
        }
        Ok(Self {
            data_shards,
            parity_shards,
        })
    }

    /// Total number of shards
    pub fn total_shards(&self) -> usize {
        self.data_shards + self.parity_shards
    }

    /// Storage overhead ratio (parity/data)
    pub fn overhead_ratio(&self) -> f64 {
        self.parity_shards as f64 / self.data_shards as f64
    }

    /// Maximum number of failures that can be tolerated
    pub fn max_failures(&self) -> usize {
        self.parity_shards
    }

    /// Fragment length for an input of `data_len` bytes
    pub fn fragment_size(&self, data_len: usize) -> usize {
        data_len
            .div_ceil(self.data_shards * FRAGMENT_ALIGNMENT)
            * FRAGMENT_ALIGNMENT
    }
}

/// A single fragment of erasure-coded data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Fragment index (0 to total_shards-1)
    pub index: u8,
    /// Fragment data
    pub data: Bytes,
    /// Whether this is a parity fragment
    pub is_parity: bool,
}

impl Fragment {
    pub fn new(index: u8, data: Bytes, is_parity: bool) -> Self {
        Self {
            index,
            data,
            is_parity,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Mathematical core of an erasure code
///
/// Shards passed in are equal-length and non-empty.
pub trait ErasureEngine: Send + Sync {
    /// Fill the parity shards (the trailing `m` entries) from the data shards
    fn encode(&self, shards: &mut [Vec<u8>]) -> Result<()>;

    /// Rebuild every `None` entry from the present ones
    fn reconstruct(&self, shards: &mut [Option<Vec<u8>>]) -> Result<()>;

    /// Check that parity matches data
    fn verify(&self, shards: &[Vec<u8>]) -> Result<bool>;
}

/// Reed-Solomon over GF(256)
pub struct ReedSolomonEngine {
    inner: ReedSolomon,
}

impl ReedSolomonEngine {
    pub fn new(data_shards: usize, parity_shards: usize) -> Result<Self> {
        let inner = ReedSolomon::new(data_shards, parity_shards)
            .map_err(|e| ShardStorError::InvalidConfig(format!("reed-solomon: {}", e)))?;
        Ok(Self { inner })
    }
}

impl ErasureEngine for ReedSolomonEngine {
    fn encode(&self, shards: &mut [Vec<u8>]) -> Result<()> {
        self.inner
            .encode(shards)
            .map_err(|e| ShardStorError::CorruptData(format!("reed-solomon encode: {}", e)))
    }

    fn reconstruct(&self, shards: &mut [Option<Vec<u8>>]) -> Result<()> {
        self.inner.reconstruct(shards).map_err(|e| match e {
            reed_solomon_erasure::Error::TooFewShardsPresent => {
                ShardStorError::unrecoverable(shards.iter().filter(|s| s.is_none()).count(), 0)
            }
            other => ShardStorError::CorruptData(format!("reed-solomon reconstruct: {}", other)),
        })
    }

    fn verify(&self, shards: &[Vec<u8>]) -> Result<bool> {
        self.inner
            .verify(shards)
            .map_err(|e| ShardStorError::CorruptData(format!("reed-solomon verify: {}", e)))
    }
}

/// Plain striping for `m == 0`: no parity, no recovery
pub struct StripingEngine;

impl ErasureEngine for StripingEngine {
    fn encode(&self, _shards: &mut [Vec<u8>]) -> Result<()> {
        Ok(())
    }

    fn reconstruct(&self, shards: &mut [Option<Vec<u8>>]) -> Result<()> {
        let missing = shards.iter().filter(|s| s.is_none()).count();
        if missing > 0 {
            return Err(ShardStorError::unrecoverable(missing, 0));
        }
        Ok(())
    }

    fn verify(&self, _shards: &[Vec<u8>]) -> Result<bool> {
        Ok(true)
    }
}

/// Erasure encoder/decoder with padding and loss accounting
pub struct ErasureCodec {
    config: ErasureConfig,
    engine: Box<dyn ErasureEngine>,
}

impl ErasureCodec {
    /// Create a codec, picking Reed-Solomon or striping from `m`
    pub fn with_config(config: ErasureConfig) -> Result<Self> {
        let engine: Box<dyn ErasureEngine> = if config.parity_shards == 0 {
            Box::new(StripingEngine)
        } else {
            Box::new(ReedSolomonEngine::new(
                config.data_shards,
                config.parity_shards,
            )?)
        };
        Ok(Self { config, engine })
    }

    /// Shorthand for `with_config(ErasureConfig::new(k, m)?)`
    pub fn new(data_shards: usize, parity_shards: usize) -> Result<Self> {
        Self::with_config(ErasureConfig::new(data_shards, parity_shards)?)
    }

    /// Get the erasure configuration
    pub fn config(&self) -> &ErasureConfig {
        &self.config
    }

    /// Encode data into `k + m` fragments, data first then parity
    pub fn encode(&self, data: &[u8]) -> Result<Vec<Fragment>> {
        let fragment_size = self.config.fragment_size(data.len());
        let total = self.config.total_shards();

        if fragment_size == 0 {
            return Ok((0..total)
                .map(|i| Fragment::new(i as u8, Bytes::new(), i >= self.config.data_shards))
                .collect());
        }

        // Pad data so it splits into k equal fragments
        let padded_size = fragment_size * self.config.data_shards;
        let mut padded_data = data.to_vec();
        padded_data.resize(padded_size, 0);

        let mut shards: Vec<Vec<u8>> = padded_data
            .chunks(fragment_size)
            .map(|c| c.to_vec())
            .collect();

        for _ in 0..self.config.parity_shards {
            shards.push(vec![0u8; fragment_size]);
        }

        self.engine.encode(&mut shards)?;

        Ok(shards
            .into_iter()
            .enumerate()
            .map(|(i, shard)| {
                let is_parity = i >= self.config.data_shards;
                Fragment::new(i as u8, Bytes::from(shard), is_parity)
            })
            .collect())
    }

    /// Decode fragments back into the original data
    ///
    /// `fragments` holds one slot per index; missing slots may be empty.
    /// Slots listed in `lost`, and any slot whose length is wrong, are
    /// rebuilt from the rest. Fails with `Unrecoverable` when more than `m`
    /// slots are lost.
    pub fn decode(&self, fragments: &[Bytes], lost: &[usize], original_size: usize) -> Result<Bytes> {
        let total = self.config.total_shards();
        if fragments.len() != total {
            return Err(ShardStorError::InvalidConfig(format!(
                "expected {} fragment slots, got {}",
                total,
                fragments.len()
            )));
        }

        let lost_set = self.loss_set(fragments, lost, original_size)?;
        if lost_set.len() > self.config.parity_shards {
            return Err(ShardStorError::unrecoverable(
                lost_set.len(),
                self.config.parity_shards,
            ));
        }

        if original_size == 0 {
            return Ok(Bytes::new());
        }

        let mut slots: Vec<Option<Vec<u8>>> = fragments
            .iter()
            .enumerate()
            .map(|(i, f)| (!lost_set.contains(&i)).then(|| f.to_vec()))
            .collect();

        if !lost_set.is_empty() {
            self.engine.reconstruct(&mut slots).map_err(|e| match e {
                ShardStorError::Unrecoverable { .. } => ShardStorError::unrecoverable(
                    lost_set.len(),
                    self.config.parity_shards,
                ),
                other => other,
            })?;
        }

        let fragment_size = self.config.fragment_size(original_size);
        let mut result = Vec::with_capacity(fragment_size * self.config.data_shards);
        for slot in slots.iter().take(self.config.data_shards) {
            match slot {
                Some(shard) => result.extend_from_slice(shard),
                None => {
                    return Err(ShardStorError::CorruptData(
                        "reconstruction left a data fragment empty".to_string(),
                    ))
                }
            }
        }

        result.truncate(original_size);
        Ok(Bytes::from(result))
    }

    /// Explicit losses plus every slot with the wrong length, sorted and deduplicated
    pub fn loss_set(&self, fragments: &[Bytes], lost: &[usize], original_size: usize) -> Result<Vec<usize>> {
        let total = self.config.total_shards();
        let expected = self.config.fragment_size(original_size);

        let mut lost_set: Vec<usize> = Vec::with_capacity(total);
        for &index in lost {
            if index >= total {
                return Err(ShardStorError::InvalidConfig(format!(
                    "lost index {} out of range (total {})",
                    index, total
                )));
            }
            lost_set.push(index);
        }
        for (i, fragment) in fragments.iter().enumerate() {
            if fragment.len() != expected {
                lost_set.push(i);
            }
        }
        lost_set.sort_unstable();
        lost_set.dedup();
        Ok(lost_set)
    }

    /// Verify that fragments are consistent (for health checking)
    pub fn verify(&self, fragments: &[Fragment]) -> Result<bool> {
        if fragments.len() != self.config.total_shards() {
            return Ok(false);
        }

        let expected_size = fragments.first().map(|f| f.size()).unwrap_or(0);
        if !fragments.iter().all(|f| f.size() == expected_size) {
            return Ok(false);
        }
        if expected_size == 0 {
            return Ok(true);
        }

        let shards: Vec<Vec<u8>> = fragments.iter().map(|f| f.data.to_vec()).collect();
        self.engine.verify(&shards)
    }
}
