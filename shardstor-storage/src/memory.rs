//! In-memory shard
//!
//! Used for testing and development. Not persistent. A shard can be switched
//! offline to simulate a failing server.

use crate::backend::{ShardClientSync, StorageStats};
use bytes::Bytes;
use parking_lot::RwLock;
use shardstor_core::error::{Result, ShardStorError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// In-memory shard
pub struct MemoryShard {
    address: String,

    /// Object storage
    objects: RwLock<HashMap<Vec<u8>, Bytes>>,

    /// Current bytes used
    bytes_used: AtomicU64,

    /// When set, every operation fails with `ShardIo`
    offline: AtomicBool,

    /// Operation counters
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl MemoryShard {
    /// Create a new, empty shard
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            objects: RwLock::new(HashMap::new()),
            bytes_used: AtomicU64::new(0),
            offline: AtomicBool::new(false),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        }
    }

    /// Simulate an unreachable server
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Clear all stored objects
    pub fn clear(&self) {
        let mut objects = self.objects.write();
        objects.clear();
        self.bytes_used.store(0, Ordering::SeqCst);
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    fn check_online(&self) -> Result<()> {
        if self.is_offline() {
            return Err(ShardStorError::ShardIo(format!(
                "shard {} is offline",
                self.address
            )));
        }
        Ok(())
    }
}

impl ShardClientSync for MemoryShard {
    fn address(&self) -> &str {
        &self.address
    }

    fn store(&self, key: &[u8], value: Bytes) -> Result<()> {
        self.check_online()?;
        let value_len = value.len() as u64;

        let mut objects = self.objects.write();

        // If replacing, subtract old size
        if let Some(old) = objects.insert(key.to_vec(), value) {
            self.bytes_used.fetch_sub(old.len() as u64, Ordering::SeqCst);
        }

        self.bytes_used.fetch_add(value_len, Ordering::SeqCst);
        self.writes.fetch_add(1, Ordering::Relaxed);

        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        self.check_online()?;
        self.reads.fetch_add(1, Ordering::Relaxed);
        let objects = self.objects.read();
        Ok(objects.get(key).cloned())
    }

    fn exists(&self, key: &[u8]) -> Result<bool> {
        self.check_online()?;
        let objects = self.objects.read();
        Ok(objects.contains_key(key))
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        self.check_online()?;
        let mut objects = self.objects.write();

        if let Some(old) = objects.remove(key) {
            self.bytes_used.fetch_sub(old.len() as u64, Ordering::SeqCst);
            self.deletes.fetch_add(1, Ordering::Relaxed);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn stats(&self) -> Result<StorageStats> {
        let objects = self.objects.read();
        Ok(StorageStats {
            key_count: objects.len() as u64,
            bytes_used: self.bytes_used.load(Ordering::SeqCst),
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        })
    }

    fn flush(&self) -> Result<()> {
        // No-op for in-memory storage
        Ok(())
    }
}
