//! Block compression
//!
//! Each call is self-contained; there is no framing across calls.
//! - Snappy: raw block format
//! - Gzip: deflate with a selectable level

use crate::error::{Result, ShardStorError};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

/// Supported compression algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    #[default]
    Snappy,
    Gzip,
}

impl CompressionAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            CompressionAlgorithm::Snappy => "snappy",
            CompressionAlgorithm::Gzip => "gzip",
        }
    }
}

impl FromStr for CompressionAlgorithm {
    type Err = ShardStorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "snappy" => Ok(CompressionAlgorithm::Snappy),
            "gzip" => Ok(CompressionAlgorithm::Gzip),
            other => Err(ShardStorError::InvalidConfig(format!(
                "unknown compression algorithm: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compression level hint. Only gzip honours it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompressionLevel {
    #[default]
    Default,
    BestSpeed,
    BestCompression,
    HuffmanOnly,
}

impl CompressionLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            CompressionLevel::Default => "default",
            CompressionLevel::BestSpeed => "best-speed",
            CompressionLevel::BestCompression => "best-compression",
            CompressionLevel::HuffmanOnly => "huffman-only",
        }
    }

    fn to_flate2(self) -> Compression {
        match self {
            CompressionLevel::Default => Compression::default(),
            CompressionLevel::BestSpeed => Compression::fast(),
            CompressionLevel::BestCompression => Compression::best(),
            // flate2 exposes no deflate strategy; the fastest level is the closest match
            CompressionLevel::HuffmanOnly => Compression::fast(),
        }
    }
}

impl FromStr for CompressionLevel {
    type Err = ShardStorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "default" | "" => Ok(CompressionLevel::Default),
            "best-speed" => Ok(CompressionLevel::BestSpeed),
            "best-compression" => Ok(CompressionLevel::BestCompression),
            "huffman-only" => Ok(CompressionLevel::HuffmanOnly),
            other => Err(ShardStorError::InvalidConfig(format!(
                "unknown compression level: {}",
                other
            ))),
        }
    }
}

/// Block compressor/decompressor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compressor {
    algorithm: CompressionAlgorithm,
    level: CompressionLevel,
}

impl Compressor {
    pub fn new(algorithm: CompressionAlgorithm, level: CompressionLevel) -> Self {
        Self { algorithm, level }
    }

    pub fn snappy() -> Self {
        Self::new(CompressionAlgorithm::Snappy, CompressionLevel::Default)
    }

    pub fn gzip(level: CompressionLevel) -> Self {
        Self::new(CompressionAlgorithm::Gzip, level)
    }

    pub fn algorithm(&self) -> CompressionAlgorithm {
        self.algorithm
    }

    pub fn level(&self) -> CompressionLevel {
        self.level
    }

    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        match self.algorithm {
            CompressionAlgorithm::Snappy => snap::raw::Encoder::new()
                .compress_vec(input)
                .map_err(|e| ShardStorError::CorruptData(format!("snappy compression: {}", e))),
            CompressionAlgorithm::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), self.level.to_flate2());
                encoder.write_all(input)?;
                Ok(encoder.finish()?)
            }
        }
    }

    pub fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        match self.algorithm {
            CompressionAlgorithm::Snappy => snap::raw::Decoder::new()
                .decompress_vec(input)
                .map_err(|e| ShardStorError::CorruptData(format!("snappy decompression: {}", e))),
            CompressionAlgorithm::Gzip => {
                let mut output = Vec::new();
                GzDecoder::new(input)
                    .read_to_end(&mut output)
                    .map_err(|e| ShardStorError::CorruptData(format!("gzip decompression: {}", e)))?;
                Ok(output)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn all_compressors() -> Vec<Compressor> {
        vec![
            Compressor::snappy(),
            Compressor::gzip(CompressionLevel::Default),
            Compressor::gzip(CompressionLevel::BestSpeed),
            Compressor::gzip(CompressionLevel::BestCompression),
            Compressor::gzip(CompressionLevel::HuffmanOnly),
        ]
    }

    #[test]
    fn test_roundtrip() {
        let data = b"hello world hello world hello world";
        for compressor in all_compressors() {
            let compressed = compressor.compress(data).unwrap();
            let decompressed = compressor.decompress(&compressed).unwrap();
            assert_eq!(data.as_slice(), decompressed.as_slice());
        }
    }

    #[test]
    fn test_compresses_repetitive_data() {
        let data = vec![b'a'; 64 * 1024];
        for compressor in all_compressors() {
            assert!(compressor.compress(&data).unwrap().len() < data.len() / 4);
        }
    }

    #[test]
    fn test_malformed_input() {
        let garbage = [0xFFu8, 0xFF, 0xFF, 0xFF, 0x0F, 1, 2, 3];
        for compressor in all_compressors() {
            assert!(matches!(
                compressor.decompress(&garbage),
                Err(ShardStorError::CorruptData(_))
            ));
        }
    }

    #[test]
    fn test_parsing() {
        assert_eq!("GZIP".parse::<CompressionAlgorithm>().unwrap(), CompressionAlgorithm::Gzip);
        assert_eq!(
            "best_compression".parse::<CompressionLevel>().unwrap(),
            CompressionLevel::BestCompression
        );
        assert!(matches!(
            "lzma".parse::<CompressionAlgorithm>(),
            Err(ShardStorError::InvalidConfig(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_compress_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..8192)) {
            for compressor in all_compressors() {
                let compressed = compressor.compress(&data).unwrap();
                prop_assert_eq!(compressor.decompress(&compressed).unwrap(), data.clone());
            }
        }
    }
}
