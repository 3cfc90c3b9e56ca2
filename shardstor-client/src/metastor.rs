//! Metadata persistence
//!
//! Records live under `"{organization}/{namespace}/" + key` on one of the
//! metadata shards, picked by the SHA-256 digest of that storage key. Any
//! failure here is fatal to the calling operation.
//!
//! An optional stage pipeline (compression, encryption) runs over the
//! encoded record before it leaves the client.

use shardstor_core::crypto::{HashAlgorithm, Hasher};
use shardstor_core::error::{Result, ShardStorError};
use shardstor_core::metadata::Metadata;
use shardstor_core::pipeline::Pipeline;
use shardstor_core::shard_error::{ShardErrorSet, SHARD_KIND_METADATA};
use shardstor_storage::cluster::{ShardCluster, ShardConnector};
use shardstor_storage::fanout::FanoutOptions;
use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

/// Reads and writes metadata records on the metadata shards
pub struct MetaStore {
    cluster: ShardCluster,
    prefix: String,
    options: FanoutOptions,
    pipeline: Pipeline,
}

impl MetaStore {
    pub fn new(
        addresses: Vec<String>,
        connector: Arc<dyn ShardConnector>,
        organization: &str,
        namespace: &str,
        options: FanoutOptions,
    ) -> Result<Self> {
        Ok(Self {
            cluster: ShardCluster::new(addresses, connector)?,
            prefix: format!("{}/{}/", organization, namespace),
            options,
            pipeline: Pipeline::new(),
        })
    }

    /// Run encoded records through `pipeline`; it must not carry hash stages
    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Key a record is stored under
    pub fn storage_key(&self, key: &str) -> Vec<u8> {
        format!("{}{}", self.prefix, key).into_bytes()
    }

    /// Metadata shard responsible for `storage_key`
    pub fn shard_for(&self, storage_key: &[u8]) -> &str {
        let digest = Hasher::new(HashAlgorithm::Sha256).hash(storage_key);
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        let index = u64::from_be_bytes(head) % self.cluster.len() as u64;
        &self.cluster.addresses()[index as usize]
    }

    /// Persist `metadata`, replacing any previous record
    pub async fn set(&self, metadata: &Metadata) -> Result<()> {
        let encoded = Bytes::from(self.pipeline.write(&metadata.encode()?)?.data);
        let storage_key = self.storage_key(&metadata.key);
        let address = self.shard_for(&storage_key);

        let result = match self.cluster.client(address) {
            Ok(client) => self.options.run(client.store(&storage_key, encoded)).await,
            Err(e) => Err(e),
        };
        result.map_err(|e| self.wrap(address, e))?;
        debug!(key = %metadata.key, address, "metadata stored");
        Ok(())
    }

    /// Load and validate the record for `key`
    pub async fn get(&self, key: &str) -> Result<Metadata> {
        let storage_key = self.storage_key(key);
        let address = self.shard_for(&storage_key);

        let result = match self.cluster.client(address) {
            Ok(client) => self.options.run(client.get(&storage_key)).await,
            Err(e) => Err(e),
        };
        let data = match result {
            Ok(data) => data,
            Err(ShardStorError::NotFound(_)) => return Err(ShardStorError::NotFound(key.to_string())),
            Err(e) => return Err(self.wrap(address, e)),
        };

        let metadata = Metadata::decode(&self.pipeline.read(&data, &[])?)?;
        metadata.validate()?;
        if metadata.key != key {
            return Err(ShardStorError::CorruptData(format!(
                "metadata stored for {} names {}",
                key, metadata.key
            )));
        }
        Ok(metadata)
    }

    /// Remove the record for `key`
    pub async fn delete(&self, key: &str) -> Result<()> {
        let storage_key = self.storage_key(key);
        let address = self.shard_for(&storage_key);

        let result = match self.cluster.client(address) {
            Ok(client) => self.options.run(client.delete(&storage_key)).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(true) => {
                debug!(key, address, "metadata deleted");
                Ok(())
            }
            Ok(false) => Err(ShardStorError::NotFound(key.to_string())),
            Err(e) => Err(self.wrap(address, e)),
        }
    }

    pub async fn close(&self) -> Result<()> {
        self.cluster.close(&self.options, SHARD_KIND_METADATA).await
    }

    fn wrap(&self, address: &str, error: ShardStorError) -> ShardStorError {
        if matches!(error, ShardStorError::Cancelled) {
            return error;
        }
        let errors = ShardErrorSet::new();
        errors.add_error(address, SHARD_KIND_METADATA, &error);
        ShardStorError::ShardFailures(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardstor_core::error::ErrorKind;
    use shardstor_core::metadata::{CodecParams, HashPoint};
    use shardstor_core::pipeline::{StageConfig, StageType};
    use shardstor_storage::backend::ShardClientSync;
    use shardstor_storage::cluster::LocalConnector;

    const PRIVKEY: &str = "11111111111111111111111111111111";

    fn sealed() -> Pipeline {
        Pipeline::from_config(&[
            StageConfig::new(StageType::Compress).with_algorithm("gzip"),
            StageConfig::new(StageType::Encrypt).with_privkey(PRIVKEY),
        ])
        .unwrap()
    }

    fn store(n: usize, connector: Arc<LocalConnector>) -> MetaStore {
        let addresses = (0..n).map(|i| format!("memory://meta{}", i)).collect();
        MetaStore::new(addresses, connector, "acme", "photos", FanoutOptions::default()).unwrap()
    }

    fn record(key: &str) -> Metadata {
        Metadata::new(
            key,
            "photos",
            1024,
            CodecParams::none(),
            HashAlgorithm::Blake2b,
            HashPoint::Processed,
            Vec::new(),
        )
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let metastor = store(3, Arc::new(LocalConnector::new()));
        let mut md = record("cat.jpg");
        md.user_defined.insert("owner".to_string(), "alice".to_string());

        metastor.set(&md).await.unwrap();
        assert_eq!(metastor.get("cat.jpg").await.unwrap(), md);

        metastor.delete("cat.jpg").await.unwrap();
        assert!(matches!(
            metastor.get("cat.jpg").await,
            Err(ShardStorError::NotFound(_))
        ));
        assert!(matches!(
            metastor.delete("cat.jpg").await,
            Err(ShardStorError::NotFound(_))
        ));
    }

    #[test]
    fn test_storage_key_and_stable_shard() {
        let metastor = store(4, Arc::new(LocalConnector::new()));
        assert_eq!(metastor.storage_key("a/b"), b"acme/photos/a/b".to_vec());

        let key = metastor.storage_key("cat.jpg");
        let first = metastor.shard_for(&key).to_string();
        assert_eq!(metastor.shard_for(&key), first);
    }

    #[tokio::test]
    async fn test_record_lands_on_chosen_shard() {
        let connector = Arc::new(LocalConnector::new());
        let metastor = store(4, connector.clone());
        metastor.set(&record("dog.png")).await.unwrap();

        let address = metastor.shard_for(&metastor.storage_key("dog.png")).to_string();
        assert_eq!(connector.memory_shard(&address).len(), 1);
    }

    #[tokio::test]
    async fn test_offline_shard_is_fatal() {
        let connector = Arc::new(LocalConnector::new());
        let metastor = store(1, connector.clone());
        connector.memory_shard("memory://meta0").set_offline(true);

        let err = metastor.set(&record("k")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShardIo);
        let items = err.shard_errors().unwrap().items();
        assert_eq!(items[0].kind, SHARD_KIND_METADATA);
    }

    #[tokio::test]
    async fn test_garbage_record_is_corrupt() {
        let connector = Arc::new(LocalConnector::new());
        let metastor = store(1, connector.clone());
        let key = metastor.storage_key("k");
        connector
            .memory_shard("memory://meta0")
            .store(&key, Bytes::from_static(b"not metadata"))
            .unwrap();

        assert_eq!(metastor.get("k").await.unwrap_err().kind(), ErrorKind::CorruptData);
    }

    #[tokio::test]
    async fn test_sealed_records() {
        let connector = Arc::new(LocalConnector::new());
        let metastor = store(1, connector.clone()).with_pipeline(sealed());
        let mut md = record("secret-plans.txt");
        md.user_defined.insert("owner".to_string(), "mallory".to_string());
        metastor.set(&md).await.unwrap();
        assert_eq!(metastor.get("secret-plans.txt").await.unwrap(), md);

        let raw = connector
            .memory_shard("memory://meta0")
            .get(&metastor.storage_key("secret-plans.txt"))
            .unwrap()
            .unwrap();
        assert!(!raw.starts_with(b"SSMD"));
        assert!(!raw.windows(7).any(|w| w == b"mallory"));

        // a reader without the key sees garbage, never a record
        let plain = store(1, connector);
        assert_eq!(
            plain.get("secret-plans.txt").await.unwrap_err().kind(),
            ErrorKind::CorruptData
        );
    }
}
