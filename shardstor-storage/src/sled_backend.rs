//! Sled-backed shard
//!
//! Persistent local shard. Sled provides ACID writes and is pure Rust.

use crate::backend::{ShardClientSync, StorageStats};
use bytes::Bytes;
use shardstor_core::error::{Result, ShardStorError};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

const OBJECTS_TREE: &str = "objects";

fn shard_io(e: sled::Error) -> ShardStorError {
    ShardStorError::ShardIo(e.to_string())
}

/// Sled-based shard
pub struct SledShard {
    address: String,
    db: sled::Db,
    objects: sled::Tree,
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl SledShard {
    /// Open or create a shard database
    pub fn open<P: AsRef<Path>>(address: impl Into<String>, path: P) -> Result<Self> {
        info!(path = ?path.as_ref(), "Opening sled shard");

        let db = sled::open(path.as_ref())
            .map_err(|e| ShardStorError::ShardIo(format!("Failed to open sled: {}", e)))?;
        Self::from_db(address.into(), db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_temporary(address: impl Into<String>) -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| ShardStorError::ShardIo(format!("Failed to open sled: {}", e)))?;
        Self::from_db(address.into(), db)
    }

    fn from_db(address: String, db: sled::Db) -> Result<Self> {
        let objects = db.open_tree(OBJECTS_TREE).map_err(shard_io)?;
        Ok(Self {
            address,
            db,
            objects,
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        })
    }

    /// Get database size estimate
    pub fn size_on_disk(&self) -> u64 {
        self.db.size_on_disk().unwrap_or(0)
    }
}

impl ShardClientSync for SledShard {
    fn address(&self) -> &str {
        &self.address
    }

    fn store(&self, key: &[u8], value: Bytes) -> Result<()> {
        self.objects.insert(key, value.as_ref()).map_err(shard_io)?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .objects
            .get(key)
            .map_err(shard_io)?
            .map(|v| Bytes::copy_from_slice(&v)))
    }

    fn exists(&self, key: &[u8]) -> Result<bool> {
        self.objects.contains_key(key).map_err(shard_io)
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        let removed = self.objects.remove(key).map_err(shard_io)?.is_some();
        if removed {
            self.deletes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(removed)
    }

    fn stats(&self) -> Result<StorageStats> {
        let mut bytes_used = 0u64;
        for item in self.objects.iter() {
            let (_, value) = item.map_err(shard_io)?;
            bytes_used += value.len() as u64;
        }
        Ok(StorageStats {
            key_count: self.objects.len() as u64,
            bytes_used,
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        })
    }

    fn flush(&self) -> Result<()> {
        self.db.flush().map_err(shard_io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_get_delete() {
        let shard = SledShard::open_temporary("sled://tmp").unwrap();

        shard.store(b"key", Bytes::from_static(b"value")).unwrap();
        assert_eq!(shard.get(b"key").unwrap(), Some(Bytes::from_static(b"value")));
        assert!(shard.exists(b"key").unwrap());

        assert!(shard.delete(b"key").unwrap());
        assert!(!shard.delete(b"key").unwrap());
        assert_eq!(shard.get(b"key").unwrap(), None);

        let stats = shard.stats().unwrap();
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.deletes, 1);
    }

    #[test]
    fn test_on_disk_stats() {
        let dir = tempfile::tempdir().unwrap();
        let shard = SledShard::open("sled://a", dir.path().join("shard")).unwrap();

        shard.store(b"k1", Bytes::from(vec![1u8; 64])).unwrap();
        shard.store(b"k2", Bytes::from(vec![2u8; 36])).unwrap();
        shard.flush().unwrap();

        assert_eq!(shard.get(b"k1").unwrap(), Some(Bytes::from(vec![1u8; 64])));
        let stats = shard.stats().unwrap();
        assert_eq!(stats.key_count, 2);
        assert_eq!(stats.bytes_used, 100);
        assert_eq!(stats.reads, 1);
    }
}
