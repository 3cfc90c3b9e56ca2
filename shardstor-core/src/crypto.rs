//! Cryptographic primitives for shardstor
//!
//! Provides:
//! - Content hashing with a selectable algorithm (BLAKE2b-256, SHA-256, MD5)
//! - AES-256-GCM encryption (authenticated encryption, nonce prepended)

use crate::error::{Result, ShardStorError};
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use blake2::digest::consts::U32;
use blake2::Blake2b;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// AES-256-GCM key size (32 bytes)
pub const KEY_SIZE: usize = 32;

/// AES-GCM nonce size (12 bytes / 96 bits)
pub const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

type Blake2b256 = Blake2b<U32>;

/// Supported hashing algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Blake2b,
    Sha256,
    Md5,
}

impl HashAlgorithm {
    /// Digest length in bytes
    pub fn output_len(self) -> usize {
        match self {
            HashAlgorithm::Blake2b | HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Md5 => 16,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HashAlgorithm::Blake2b => "blake2b",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Md5 => "md5",
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = ShardStorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "blake2b" | "blake2b-256" | "blake2b_256" => Ok(HashAlgorithm::Blake2b),
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            "md5" => Ok(HashAlgorithm::Md5),
            other => Err(ShardStorError::InvalidConfig(format!(
                "unknown hash algorithm: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content-addressed key: the digest of a payload
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentKey(Vec<u8>);

impl ContentKey {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Parse from hex string
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| ShardStorError::InvalidConfig(format!("invalid content key: {}", e)))?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "ContentKey({})", &hex[..hex.len().min(16)])
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for ContentKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Deterministic hasher for content keys and integrity digests
///
/// Stateless; no salt, so identical input always yields an identical digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hasher {
    algorithm: HashAlgorithm,
}

impl Hasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Build a hasher from an algorithm name
    pub fn from_name(name: &str) -> Result<Self> {
        Ok(Self::new(name.parse()?))
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Digest `data`
    pub fn hash(&self, data: &[u8]) -> ContentKey {
        let digest = match self.algorithm {
            HashAlgorithm::Blake2b => Blake2b256::digest(data).to_vec(),
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Md5 => md5::Md5::digest(data).to_vec(),
        };
        ContentKey(digest)
    }

    /// Verify that data matches an expected digest
    pub fn verify(&self, data: &[u8], expected: &ContentKey) -> bool {
        &self.hash(data) == expected
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new(HashAlgorithm::default())
    }
}

/// AES-256-GCM encryption key
#[derive(Clone)]
pub struct EncryptionKey([u8; KEY_SIZE]);

impl EncryptionKey {
    /// Generate a new random encryption key
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut key = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice (validates length)
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != KEY_SIZE {
            return Err(ShardStorError::InvalidConfig(format!(
                "encryption key must be {} bytes, got {}",
                KEY_SIZE,
                slice.len()
            )));
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(slice);
        Ok(Self(key))
    }

    /// Get the raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Short identifier safe to persist in metadata (never the key itself)
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0);
        hex::encode(&digest[..8])
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptionKey([REDACTED])")
    }
}

impl Drop for EncryptionKey {
    fn drop(&mut self) {
        // Zeroize key on drop
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

/// Encrypted data container
#[derive(Debug, Clone)]
pub struct EncryptedData {
    /// Nonce used for encryption (unique per encryption)
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext with authentication tag appended
    pub ciphertext: Vec<u8>,
}

impl EncryptedData {
    /// Total overhead per encryption (nonce + tag)
    pub const OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

    /// Serialize to bytes (nonce prepended to ciphertext)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(NONCE_SIZE + self.ciphertext.len());
        result.extend_from_slice(&self.nonce);
        result.extend_from_slice(&self.ciphertext);
        result
    }

    /// Deserialize from bytes (nonce prepended to ciphertext)
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::OVERHEAD {
            return Err(ShardStorError::CorruptData(
                "data too short for encrypted content".to_string(),
            ));
        }

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&data[..NONCE_SIZE]);

        Ok(Self {
            nonce,
            ciphertext: data[NONCE_SIZE..].to_vec(),
        })
    }
}

/// AES-256-GCM encrypter holding its key for its whole lifetime
pub struct Encrypter {
    cipher: Aes256Gcm,
    key_id: String,
}

impl Encrypter {
    pub fn new(key: &EncryptionKey) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes())),
            key_id: key.fingerprint(),
        }
    }

    /// Build from raw key material, failing on a wrong key length
    pub fn from_slice(key: &[u8]) -> Result<Self> {
        Ok(Self::new(&EncryptionKey::from_slice(key)?))
    }

    /// Replace the derived key identifier with a caller-chosen one
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = key_id.into();
        self
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Encrypt with a fresh random nonce; output is `nonce || sealed`
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        use rand::RngCore;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| ShardStorError::CorruptData(format!("encryption failed: {}", e)))?;

        Ok(EncryptedData {
            nonce: nonce_bytes,
            ciphertext,
        }
        .to_bytes())
    }

    /// Split off the nonce, then verify and decrypt
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        let encrypted = EncryptedData::from_bytes(data)?;
        let nonce = Nonce::from_slice(&encrypted.nonce);

        self.cipher
            .decrypt(nonce, encrypted.ciphertext.as_slice())
            .map_err(|_| ShardStorError::CorruptData("authentication failed".to_string()))
    }
}

impl fmt::Debug for Encrypter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encrypter")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}
