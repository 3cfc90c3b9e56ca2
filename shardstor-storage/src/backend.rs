//! Shard client trait
//!
//! Defines the interface every shard transport must follow.

use bytes::Bytes;
use shardstor_core::error::{Result, ShardStorError};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by [`ShardClient`] methods
pub type ShardFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Shard statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of stored keys
    pub key_count: u64,

    /// Total bytes used by values
    pub bytes_used: u64,

    /// Number of read operations
    pub reads: u64,

    /// Number of write operations
    pub writes: u64,

    /// Number of delete operations
    pub deletes: u64,
}

/// Async shard client
///
/// Implementations must be internally thread-safe: the fan-out calls one
/// client from many tasks at once.
pub trait ShardClient: Send + Sync {
    /// Address this client was resolved from
    fn address(&self) -> &str;

    /// Store a value, replacing any previous one
    fn store<'a>(&'a self, key: &'a [u8], value: Bytes) -> ShardFuture<'a, ()>;

    /// Retrieve a value. A missing key fails with `NotFound`.
    fn get<'a>(&'a self, key: &'a [u8]) -> ShardFuture<'a, Bytes>;

    /// Check if a key exists
    fn exists<'a>(&'a self, key: &'a [u8]) -> ShardFuture<'a, bool>;

    /// Delete a key. Returns whether it existed.
    fn delete<'a>(&'a self, key: &'a [u8]) -> ShardFuture<'a, bool>;

    /// Release resources held by the client
    fn close<'a>(&'a self) -> ShardFuture<'a, ()>;
}

/// Synchronous shard client (for simpler implementations)
pub trait ShardClientSync: Send + Sync {
    fn address(&self) -> &str;

    fn store(&self, key: &[u8], value: Bytes) -> Result<()>;

    fn get(&self, key: &[u8]) -> Result<Option<Bytes>>;

    fn exists(&self, key: &[u8]) -> Result<bool>;

    fn delete(&self, key: &[u8]) -> Result<bool>;

    fn stats(&self) -> Result<StorageStats>;

    fn flush(&self) -> Result<()>;
}

impl<T: ShardClientSync + ?Sized> ShardClientSync for Arc<T> {
    fn address(&self) -> &str {
        (**self).address()
    }

    fn store(&self, key: &[u8], value: Bytes) -> Result<()> {
        (**self).store(key, value)
    }

    fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        (**self).get(key)
    }

    fn exists(&self, key: &[u8]) -> Result<bool> {
        (**self).exists(key)
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        (**self).delete(key)
    }

    fn stats(&self) -> Result<StorageStats> {
        (**self).stats()
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }
}

/// Wrapper to convert a sync client to async
pub struct AsyncWrapper<T: ShardClientSync>(pub T);

impl<T: ShardClientSync + 'static> ShardClient for AsyncWrapper<T> {
    fn address(&self) -> &str {
        self.0.address()
    }

    fn store<'a>(&'a self, key: &'a [u8], value: Bytes) -> ShardFuture<'a, ()> {
        Box::pin(async move { self.0.store(key, value) })
    }

    fn get<'a>(&'a self, key: &'a [u8]) -> ShardFuture<'a, Bytes> {
        Box::pin(async move {
            self.0.get(key)?.ok_or_else(|| {
                ShardStorError::NotFound(format!(
                    "{} on {}",
                    String::from_utf8_lossy(key),
                    self.0.address()
                ))
            })
        })
    }

    fn exists<'a>(&'a self, key: &'a [u8]) -> ShardFuture<'a, bool> {
        Box::pin(async move { self.0.exists(key) })
    }

    fn delete<'a>(&'a self, key: &'a [u8]) -> ShardFuture<'a, bool> {
        Box::pin(async move { self.0.delete(key) })
    }

    fn close<'a>(&'a self) -> ShardFuture<'a, ()> {
        Box::pin(async move { self.0.flush() })
    }
}
