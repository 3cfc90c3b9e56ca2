//! Shard addressing and client cache
//!
//! Addresses are URIs. [`LocalConnector`] understands `memory://<name>` and
//! `sled://<path>`; other transports plug in through [`ShardConnector`].

use crate::backend::{AsyncWrapper, ShardClient};
use crate::fanout::{FanoutOptions, ShardTarget};
use crate::memory::MemoryShard;
use crate::sled_backend::SledShard;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use shardstor_core::error::{Result, ShardStorError};
use shardstor_core::shard_error::ShardErrorSet;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Resolves shard addresses to clients
pub trait ShardConnector: Send + Sync {
    /// Open a client for `address`. Unknown schemes fail with `InvalidShardAddress`.
    fn connect(&self, address: &str) -> Result<Arc<dyn ShardClient>>;
}

/// Connector for process-local shards
///
/// Memory shards are shared by name and sled databases by path for the
/// lifetime of the connector.
#[derive(Default)]
pub struct LocalConnector {
    memory: Mutex<HashMap<String, Arc<MemoryShard>>>,
    sled: Mutex<HashMap<String, Arc<SledShard>>>,
}

impl LocalConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Memory shard registered under `address`, created on first use
    pub fn memory_shard(&self, address: &str) -> Arc<MemoryShard> {
        let mut memory = self.memory.lock();
        Arc::clone(
            memory
                .entry(address.to_string())
                .or_insert_with(|| Arc::new(MemoryShard::new(address))),
        )
    }

    fn sled_shard(&self, address: &str, path: &str) -> Result<Arc<SledShard>> {
        let mut sled = self.sled.lock();
        if let Some(shard) = sled.get(path) {
            return Ok(Arc::clone(shard));
        }
        let shard = Arc::new(SledShard::open(address, path)?);
        sled.insert(path.to_string(), Arc::clone(&shard));
        Ok(shard)
    }
}

/// Split `scheme://rest`, rejecting an empty scheme or remainder
pub fn parse_address(address: &str) -> Result<(&str, &str)> {
    match address.split_once("://") {
        Some((scheme, rest)) if !scheme.is_empty() && !rest.is_empty() => Ok((scheme, rest)),
        _ => Err(ShardStorError::InvalidShardAddress(address.to_string())),
    }
}

impl ShardConnector for LocalConnector {
    fn connect(&self, address: &str) -> Result<Arc<dyn ShardClient>> {
        let (scheme, rest) = parse_address(address)?;
        match scheme {
            "memory" => Ok(Arc::new(AsyncWrapper(self.memory_shard(address)))),
            "sled" => Ok(Arc::new(AsyncWrapper(self.sled_shard(address, rest)?))),
            _ => Err(ShardStorError::InvalidShardAddress(address.to_string())),
        }
    }
}

/// Ordered set of configured shards with lazily resolved clients
pub struct ShardCluster {
    addresses: Vec<String>,
    connector: Arc<dyn ShardConnector>,
    clients: RwLock<HashMap<String, Arc<dyn ShardClient>>>,
}

impl ShardCluster {
    /// Create a cluster over `addresses`. Rejects an empty list and duplicates.
    pub fn new(addresses: Vec<String>, connector: Arc<dyn ShardConnector>) -> Result<Self> {
        if addresses.is_empty() {
            return Err(ShardStorError::InvalidConfig(
                "at least one shard address is required".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for address in &addresses {
            if address.is_empty() {
                return Err(ShardStorError::InvalidConfig(
                    "empty shard address".to_string(),
                ));
            }
            if !seen.insert(address.as_str()) {
                return Err(ShardStorError::InvalidConfig(format!(
                    "duplicate shard address: {}",
                    address
                )));
            }
        }
        Ok(Self {
            addresses,
            connector,
            clients: RwLock::new(HashMap::new()),
        })
    }

    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Client for `address`, resolving and caching it on first use
    ///
    /// Addresses outside the configured list resolve too: metadata written
    /// under an older configuration still names them.
    pub fn client(&self, address: &str) -> Result<Arc<dyn ShardClient>> {
        if let Some(client) = self.clients.read().get(address) {
            return Ok(Arc::clone(client));
        }
        let client = self.connector.connect(address)?;
        debug!(address, "resolved shard client");
        let mut clients = self.clients.write();
        let entry = clients
            .entry(address.to_string())
            .or_insert_with(|| Arc::clone(&client));
        Ok(Arc::clone(entry))
    }

    /// Fan-out target for `address`; resolution failures become failing slots
    pub fn target(&self, address: &str) -> ShardTarget {
        match self.client(address) {
            Ok(client) => ShardTarget::new(client),
            Err(e) => ShardTarget::unresolved(address, e.to_string()),
        }
    }

    pub fn targets(&self, addresses: &[String]) -> Vec<ShardTarget> {
        addresses.iter().map(|a| self.target(a)).collect()
    }

    /// Addresses for the `n` slots of chunk `chunk_index`
    ///
    /// Consecutive configured shards starting at `chunk_index mod len`,
    /// wrapping around, so the slots of one chunk are always distinct.
    pub fn placement(&self, chunk_index: usize, n: usize) -> Result<Vec<String>> {
        let len = self.addresses.len();
        if n > len {
            return Err(ShardStorError::InvalidConfig(format!(
                "{} slots need {} shards, only {} configured",
                n, n, len
            )));
        }
        let start = chunk_index % len;
        Ok((0..n)
            .map(|i| self.addresses[(start + i) % len].clone())
            .collect())
    }

    /// Configured shards not in `used`, in configuration order
    pub fn spares<'a>(&'a self, used: &'a [String]) -> impl Iterator<Item = &'a String> + 'a {
        self.addresses.iter().filter(move |a| !used.contains(a))
    }

    /// Close every resolved client, collecting failures
    pub async fn close(&self, options: &FanoutOptions, kind: &str) -> Result<()> {
        let clients: Vec<Arc<dyn ShardClient>> = self.clients.write().drain().map(|(_, c)| c).collect();
        let results = join_all(clients.iter().map(|c| options.run(c.close()))).await;

        let errors = ShardErrorSet::new();
        for (client, result) in clients.iter().zip(results) {
            if let Err(e) = result {
                errors.add_error(client.address(), kind, &e);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ShardStorError::ShardFailures(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use shardstor_core::shard_error::SHARD_KIND_OBJECT;

    fn addresses(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("memory://node{}", i)).collect()
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("memory://a").unwrap(), ("memory", "a"));
        assert_eq!(parse_address("sled:///var/lib/x").unwrap(), ("sled", "/var/lib/x"));
        for bad in ["", "memory", "://a", "memory://", "localhost:2379"] {
            assert!(matches!(
                parse_address(bad),
                Err(ShardStorError::InvalidShardAddress(_))
            ));
        }
    }

    #[test]
    fn test_rejects_bad_lists() {
        let connector: Arc<dyn ShardConnector> = Arc::new(LocalConnector::new());
        assert!(ShardCluster::new(vec![], Arc::clone(&connector)).is_err());
        assert!(ShardCluster::new(
            vec!["memory://a".to_string(), "memory://a".to_string()],
            Arc::clone(&connector)
        )
        .is_err());
    }

    #[tokio::test]
    async fn test_memory_shards_shared_by_name() {
        let connector = Arc::new(LocalConnector::new());
        let a = ShardCluster::new(addresses(2), connector.clone()).unwrap();
        let b = ShardCluster::new(addresses(2), connector.clone()).unwrap();

        a.client("memory://node0")
            .unwrap()
            .store(b"k", Bytes::from_static(b"v"))
            .await
            .unwrap();
        let got = b.client("memory://node0").unwrap().get(b"k").await.unwrap();
        assert_eq!(got, Bytes::from_static(b"v"));
        assert_eq!(connector.memory_shard("memory://node0").len(), 1);
    }

    #[test]
    fn test_client_is_cached() {
        let cluster = ShardCluster::new(addresses(1), Arc::new(LocalConnector::new())).unwrap();
        let first = cluster.client("memory://node0").unwrap();
        let second = cluster.client("memory://node0").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_unknown_scheme_target_fails() {
        let cluster = ShardCluster::new(addresses(1), Arc::new(LocalConnector::new())).unwrap();
        let target = cluster.target("tcp://10.0.0.1:8080");
        assert!(matches!(
            target.client(),
            Err(ShardStorError::InvalidShardAddress(_))
        ));
    }

    #[test]
    fn test_placement_wraps() {
        let cluster = ShardCluster::new(addresses(5), Arc::new(LocalConnector::new())).unwrap();
        assert_eq!(
            cluster.placement(3, 4).unwrap(),
            vec!["memory://node3", "memory://node4", "memory://node0", "memory://node1"]
        );
        assert_eq!(cluster.placement(5, 2).unwrap(), cluster.placement(0, 2).unwrap());
        assert!(cluster.placement(0, 6).is_err());

        let used = cluster.placement(0, 3).unwrap();
        let spares: Vec<&String> = cluster.spares(&used).collect();
        assert_eq!(spares, vec!["memory://node3", "memory://node4"]);
    }

    #[tokio::test]
    async fn test_sled_address() {
        let dir = tempfile::tempdir().unwrap();
        let address = format!("sled://{}", dir.path().join("s0").display());
        let cluster = ShardCluster::new(vec![address.clone()], Arc::new(LocalConnector::new())).unwrap();

        let client = cluster.client(&address).unwrap();
        client.store(b"k", Bytes::from_static(b"persisted")).await.unwrap();
        assert_eq!(client.get(b"k").await.unwrap(), Bytes::from_static(b"persisted"));
        cluster.close(&FanoutOptions::default(), SHARD_KIND_OBJECT).await.unwrap();
    }
}
