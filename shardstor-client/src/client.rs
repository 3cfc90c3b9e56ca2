//! Object client
//!
//! The only component that knows every piece of the pipeline. A write splits
//! the value into chunks, runs each chunk through the pipeline, derives its
//! content key, spreads it over the object shards with the configured codec
//! and finally records the placement in the object's metadata. A read walks
//! the same steps backwards, chunk by chunk.

use crate::config::{CodecConfig, Config};
use crate::linked::{Traversal, TraverseOrder};
use crate::metastor::MetaStore;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use shardstor_core::chunk::Chunker;
use shardstor_core::crypto::{ContentKey, Hasher};
use shardstor_core::erasure::{ErasureCodec, ErasureConfig};
use shardstor_core::error::{Result, ShardStorError};
use shardstor_core::metadata::{slot_key, ChunkRecord, CodecKind, CodecParams, HashPoint, Metadata};
use shardstor_core::pipeline::{Pipeline, StageType};
use shardstor_core::shard_error::{ShardErrorSet, SHARD_KIND_OBJECT};
use shardstor_storage::cluster::{LocalConnector, ShardCluster, ShardConnector};
use shardstor_storage::fanout::{FanoutOptions, FanoutRead, ShardFanout};
use shardstor_storage::replicator::{ReplicationMode, Replicator};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Progress of one chunk through the write path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    New,
    Compressed,
    Sealed,
    Keyed,
    Fragmented,
    Placed,
    Done,
}

impl ChunkState {
    /// State reached once every write stage of `pipeline` has run
    fn after_pipeline(pipeline: &Pipeline) -> Self {
        let active = |t: StageType| {
            pipeline
                .descriptors()
                .iter()
                .any(|d| d.stage_type == t && d.action.on_write())
        };
        if active(StageType::Encrypt) {
            ChunkState::Sealed
        } else if active(StageType::Compress) {
            ChunkState::Compressed
        } else {
            ChunkState::New
        }
    }
}

impl fmt::Display for ChunkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChunkState::New => "new",
            ChunkState::Compressed => "compressed",
            ChunkState::Sealed => "sealed",
            ChunkState::Keyed => "keyed",
            ChunkState::Fragmented => "fragmented",
            ChunkState::Placed => "placed",
            ChunkState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Health of a stored object, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// Every slot of every chunk holds its data
    Optimal,
    /// Some slots are missing but every chunk is still recoverable
    Valid,
    /// At least one chunk cannot be read back
    Invalid,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Optimal => f.write_str("optimal"),
            CheckStatus::Valid => f.write_str("valid"),
            CheckStatus::Invalid => f.write_str("invalid"),
        }
    }
}

/// Storage client over a set of object shards and metadata shards
pub struct Client {
    config: Config,
    pipeline: Pipeline,
    shards: ShardCluster,
    metastor: MetaStore,
    erasure: Option<ErasureCodec>,
    hasher: Hasher,
    options: FanoutOptions,
}

impl Client {
    /// Client over process-local shards (`memory://`, `sled://`)
    pub fn new(config: Config) -> Result<Self> {
        Self::with_connector(config, Arc::new(LocalConnector::new()))
    }

    /// Client resolving shard addresses through `connector`
    pub fn with_connector(config: Config, connector: Arc<dyn ShardConnector>) -> Result<Self> {
        config.validate()?;

        let options = FanoutOptions::new(config.shard_timeout(), CancellationToken::new());
        let pipeline = Pipeline::from_config(&config.pipeline)?;
        let erasure = match config.codec {
            CodecConfig::Erasure { k, m } => Some(ErasureCodec::new(k, m)?),
            _ => None,
        };
        let shards = ShardCluster::new(config.shards.clone(), Arc::clone(&connector))?;
        let metastor = MetaStore::new(
            config.metadata_shards.clone(),
            connector,
            &config.organization,
            &config.namespace,
            options.clone(),
        )?
        .with_pipeline(Pipeline::from_config(&config.metadata_pipeline)?);

        debug!(
            shards = config.shards.len(),
            codec = %config.codec.params().kind,
            stages = pipeline.len(),
            "client ready"
        );

        Ok(Self {
            hasher: Hasher::new(config.hasher),
            config,
            pipeline,
            shards,
            metastor,
            erasure,
            options,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Token aborting every outstanding and future shard operation with `Cancelled`
    pub fn cancellation_token(&self) -> CancellationToken {
        self.options.cancel.clone()
    }

    // ===== Write path =====

    /// Store `value` under `key`, replacing any previous metadata
    pub async fn store(&self, key: &str, value: &[u8]) -> Result<Metadata> {
        self.store_with_user_meta(key, value, BTreeMap::new()).await
    }

    /// [`Client::store`] with caller-defined metadata entries
    pub async fn store_with_user_meta(
        &self,
        key: &str,
        value: &[u8],
        user_defined: BTreeMap<String, String>,
    ) -> Result<Metadata> {
        let chunker = Chunker::from_slice(value, self.config.chunk_size)?;
        self.write_chunks(key, chunker, user_defined, None).await
    }

    /// Store everything `reader` yields, holding one chunk in memory at a time
    pub async fn write_f<R: Read>(&self, key: &str, reader: R) -> Result<Metadata> {
        self.write_f_with_user_meta(key, reader, BTreeMap::new()).await
    }

    pub async fn write_f_with_user_meta<R: Read>(
        &self,
        key: &str,
        reader: R,
        user_defined: BTreeMap<String, String>,
    ) -> Result<Metadata> {
        let chunker = Chunker::from_reader(reader, self.config.chunk_size)?;
        self.write_chunks(key, chunker, user_defined, None).await
    }

    /// Store `value` under `key` and link it after the existing object `prev_key`
    ///
    /// The new record points back at `prev_key` and the record of `prev_key`
    /// is updated to point forward at `key`, replacing any earlier successor.
    /// Returns the new record and the updated predecessor.
    pub async fn write_linked(&self, key: &str, prev_key: &str, value: &[u8]) -> Result<(Metadata, Metadata)> {
        validate_key(key)?;
        validate_key(prev_key)?;
        if key == prev_key {
            return Err(ShardStorError::InvalidConfig(format!(
                "object {} cannot be linked after itself",
                key
            )));
        }
        let mut previous = self.metastor.get(prev_key).await?;

        let chunker = Chunker::from_slice(value, self.config.chunk_size)?;
        let metadata = self
            .write_chunks(key, chunker, BTreeMap::new(), Some(prev_key.to_string()))
            .await?;

        previous.next_key = Some(key.to_string());
        self.metastor.set(&previous).await?;
        debug!(key, prev_key, "object linked");
        Ok((metadata, previous))
    }

    /// Walk linked objects forward from `start`, see [`Traversal`]
    ///
    /// Only records created within `from..=to` (Unix seconds, either bound
    /// optional) are yielded; the walk ends at the first record created
    /// after `to`.
    pub fn traverse(&self, start: &str, from: Option<i64>, to: Option<i64>) -> Result<Traversal<'_>> {
        validate_key(start)?;
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(ShardStorError::InvalidConfig(format!(
                    "epoch range {}..={} is empty",
                    from, to
                )));
            }
        }
        Ok(Traversal::new(self, TraverseOrder::Forward, start, from, to))
    }

    /// Walk linked objects backwards from `start`, newest first
    ///
    /// `from` is the most recent creation time to yield and `to` the oldest;
    /// the walk ends at the first record created before `to`.
    pub fn traverse_post_order(&self, start: &str, from: Option<i64>, to: Option<i64>) -> Result<Traversal<'_>> {
        validate_key(start)?;
        if let (Some(from), Some(to)) = (from, to) {
            if to > from {
                return Err(ShardStorError::InvalidConfig(format!(
                    "epoch range {}..={} runs forward",
                    from, to
                )));
            }
        }
        Ok(Traversal::new(self, TraverseOrder::Backward, start, from, to))
    }

    async fn write_chunks(
        &self,
        key: &str,
        mut chunker: Chunker<'_>,
        user_defined: BTreeMap<String, String>,
        previous_key: Option<String>,
    ) -> Result<Metadata> {
        validate_key(key)?;

        let mut metadata = Metadata::new(
            key,
            &self.config.namespace,
            self.config.chunk_size as u64,
            self.config.codec.params(),
            self.config.hasher,
            self.config.hash_point,
            self.pipeline.descriptors(),
        );
        metadata.user_defined = user_defined;
        metadata.previous_key = previous_key;

        while chunker.advance()? {
            if self.options.is_cancelled() {
                return Err(ShardStorError::Cancelled);
            }
            let index = metadata.chunks.len();
            let record = self.write_chunk(index, chunker.value()).await?;
            metadata.push_chunk(record);
        }

        self.metastor.set(&metadata).await?;
        info!(
            key,
            bytes = metadata.original_size,
            stored = metadata.storage_size,
            chunks = metadata.chunks.len(),
            "object stored"
        );
        Ok(metadata)
    }

    async fn write_chunk(&self, index: usize, raw: &[u8]) -> Result<ChunkRecord> {
        let mut state = ChunkState::New;
        let result = self.advance_chunk(index, raw, &mut state).await;
        match &result {
            Ok(record) => debug!(chunk = index, key = %record.key, state = %state, "chunk written"),
            Err(e) => warn!(chunk = index, state = %state, error = %e, "chunk write aborted"),
        }
        result
    }

    /// Drive one chunk from `New` to `Done`, leaving `state` at the last state reached
    async fn advance_chunk(&self, index: usize, raw: &[u8], state: &mut ChunkState) -> Result<ChunkRecord> {
        let processed = self.pipeline.write(raw)?;
        *state = ChunkState::after_pipeline(&self.pipeline);

        let payload_key = self.hasher.hash(&processed.data);
        let key = match self.config.hash_point {
            HashPoint::Plaintext => self.hasher.hash(raw),
            HashPoint::Processed => payload_key.clone(),
        };
        *state = ChunkState::Keyed;

        let params = self.config.codec.params();
        let tolerance = self.config.codec.write_tolerance();
        let addresses = self.shards.placement(index, params.slots())?;
        let keys = slot_keys(&payload_key, &params);
        let targets = self.shards.targets(&addresses);
        let stored_size = processed.data.len() as u64;
        let payload = Bytes::from(processed.data);

        match self.config.codec {
            CodecConfig::Erasure { .. } => {
                let codec = self.erasure.as_ref().ok_or_else(|| {
                    ShardStorError::InvalidConfig("erasure codec not initialised".to_string())
                })?;
                let fragments: Vec<Bytes> = codec.encode(&payload)?.into_iter().map(|f| f.data).collect();
                *state = ChunkState::Fragmented;
                ShardFanout::new(targets, self.options.clone())
                    .write(&keys, &fragments)
                    .await?
                    .check(tolerance)?;
            }
            CodecConfig::Replication { mode, .. } => {
                *state = ChunkState::Fragmented;
                Replicator::new(targets, mode, self.options.clone())
                    .write(first_key(&keys)?, payload)
                    .await
                    .into_result(tolerance)?;
            }
            CodecConfig::None => {
                *state = ChunkState::Fragmented;
                ShardFanout::new(targets, self.options.clone())
                    .write(&keys, &[payload])
                    .await?
                    .check(tolerance)?;
            }
        }
        *state = ChunkState::Placed;

        let record = ChunkRecord {
            key,
            payload_key,
            size: raw.len() as u64,
            stored_size,
            shards: addresses,
            digests: processed.digests,
        };
        *state = ChunkState::Done;
        Ok(record)
    }

    // ===== Read path =====

    /// Read the whole object stored under `key`
    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.read_f(key, &mut out).await?;
        Ok(out)
    }

    /// Stream the object stored under `key` into `writer`, one chunk at a time
    pub async fn read_f<W: Write + ?Sized>(&self, key: &str, writer: &mut W) -> Result<Metadata> {
        let metadata = self.metastor.get(key).await?;
        self.read_object(&metadata, writer).await?;
        info!(key, bytes = metadata.original_size, "object read");
        Ok(metadata)
    }

    /// Stream every chunk listed in `metadata` into `writer`
    pub(crate) async fn read_object<W: Write + ?Sized>(&self, metadata: &Metadata, writer: &mut W) -> Result<()> {
        let codec = self.prepare_read(metadata)?;
        for (index, chunk) in metadata.chunks.iter().enumerate() {
            let data = self.read_chunk(metadata, codec.as_ref(), index, chunk).await?;
            writer.write_all(&data)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write `length` bytes starting at `offset` into `writer`
    ///
    /// Only the chunks covering the range are fetched.
    pub async fn read_range<W: Write + ?Sized>(
        &self,
        key: &str,
        offset: u64,
        length: u64,
        writer: &mut W,
    ) -> Result<u64> {
        let metadata = self.metastor.get(key).await?;
        let end = offset
            .checked_add(length)
            .filter(|&end| end <= metadata.original_size)
            .ok_or_else(|| {
                ShardStorError::InvalidConfig(format!(
                    "range {}+{} exceeds object size {}",
                    offset, length, metadata.original_size
                ))
            })?;
        if length == 0 {
            return Ok(0);
        }

        let codec = self.prepare_read(&metadata)?;
        let first = offset / metadata.chunk_size;
        let last = (end - 1) / metadata.chunk_size;

        let mut written = 0u64;
        for index in first..=last {
            let index = index as usize;
            let data = self
                .read_chunk(&metadata, codec.as_ref(), index, &metadata.chunks[index])
                .await?;

            let chunk_start = index as u64 * metadata.chunk_size;
            let from = offset.saturating_sub(chunk_start) as usize;
            let to = (end - chunk_start).min(data.len() as u64) as usize;
            writer.write_all(&data[from..to])?;
            written += (to - from) as u64;
        }
        writer.flush()?;

        debug!(key, offset, bytes = written, "range read");
        Ok(written)
    }

    /// Check that the configured pipeline can undo the one recorded in `metadata`
    fn prepare_read(&self, metadata: &Metadata) -> Result<Option<ErasureCodec>> {
        let current = self.pipeline.descriptors();
        let compatible = current.len() == metadata.stages.len()
            && current.iter().zip(&metadata.stages).all(|(a, b)| {
                a.stage_type == b.stage_type
                    && a.action == b.action
                    && a.algorithm == b.algorithm
                    && a.key_id == b.key_id
            });
        if !compatible {
            return Err(ShardStorError::InvalidConfig(format!(
                "object {} was written with a different pipeline",
                metadata.key
            )));
        }
        codec_for(&metadata.codec)
    }

    async fn read_chunk(
        &self,
        metadata: &Metadata,
        codec: Option<&ErasureCodec>,
        index: usize,
        chunk: &ChunkRecord,
    ) -> Result<Vec<u8>> {
        let stored_size = chunk.stored_size as usize;
        let keys = slot_keys(&chunk.payload_key, &metadata.codec);
        let targets = self.shards.targets(&chunk.shards);

        let plain = match codec {
            Some(codec) => {
                let params = &metadata.codec;
                let fragment_size = codec.config().fragment_size(stored_size);
                let read = ShardFanout::new(targets, self.options.clone())
                    .read_until(&keys, params.k, |b| b.len() == fragment_size)
                    .await?;
                if read.delivered() < params.k {
                    return Err(ShardStorError::Unrecoverable {
                        lost: params.slots() - read.delivered(),
                        tolerated: params.m,
                        errors: read.errors,
                    });
                }
                let slots: Vec<Bytes> = read.slots.into_iter().map(Option::unwrap_or_default).collect();
                let payload = codec.decode(&slots, &read.lost, stored_size)?;
                self.open_payload(metadata, index, chunk, &payload)?
            }
            None => {
                let (_, plain) = Replicator::new(targets, ReplicationMode::Sync, self.options.clone())
                    .read(first_key(&keys)?, |b| self.open_payload(metadata, index, chunk, b))
                    .await?;
                plain
            }
        };

        debug!(chunk = index, bytes = plain.len(), "chunk read");
        Ok(plain)
    }

    /// Verify a stored payload and undo the pipeline on it
    fn open_payload(&self, metadata: &Metadata, index: usize, chunk: &ChunkRecord, payload: &[u8]) -> Result<Vec<u8>> {
        let hasher = Hasher::new(metadata.hasher);
        if payload.len() as u64 != chunk.stored_size || !hasher.verify(payload, &chunk.payload_key) {
            return Err(ShardStorError::CorruptData(format!(
                "chunk {} payload does not match its key",
                index
            )));
        }

        let plain = self.pipeline.read(payload, &chunk.digests)?;

        if metadata.hash_point == HashPoint::Plaintext && !hasher.verify(&plain, &chunk.key) {
            return Err(ShardStorError::CorruptData(format!(
                "chunk {} does not match its content key",
                index
            )));
        }
        if plain.len() as u64 != chunk.size {
            return Err(ShardStorError::CorruptData(format!(
                "chunk {} decoded to {} bytes, expected {}",
                index,
                plain.len(),
                chunk.size
            )));
        }
        Ok(plain)
    }

    // ===== Maintenance =====

    /// Metadata record of `key`
    pub async fn stat(&self, key: &str) -> Result<Metadata> {
        self.metastor.get(key).await
    }

    /// Classify the object's redundancy
    ///
    /// `fast` only asks every shard whether it holds its slot; otherwise each
    /// slot is fetched and validated (see `survey`).
    pub async fn check(&self, key: &str, fast: bool) -> Result<CheckStatus> {
        let metadata = self.metastor.get(key).await?;
        let tolerated = metadata.codec.recoverable_losses();

        let mut status = CheckStatus::Optimal;
        for (index, chunk) in metadata.chunks.iter().enumerate() {
            let missing = if fast {
                let outcome = ShardFanout::new(self.shards.targets(&chunk.shards), self.options.clone())
                    .exists(&slot_keys(&chunk.payload_key, &metadata.codec))
                    .await?;
                if outcome.cancelled {
                    return Err(ShardStorError::Cancelled);
                }
                outcome.failed.len()
            } else {
                let read = self.survey(&metadata, chunk).await?;
                metadata.codec.slots() - read.delivered()
            };

            let chunk_status = match missing {
                0 => CheckStatus::Optimal,
                n if n <= tolerated => CheckStatus::Valid,
                _ => CheckStatus::Invalid,
            };
            if chunk_status != CheckStatus::Optimal {
                debug!(chunk = index, lost = missing, status = %chunk_status, "degraded chunk");
            }
            status = status.max(chunk_status);
        }

        info!(key, status = %status, fast, "check finished");
        Ok(status)
    }

    /// Fetch every slot of `chunk`, keeping only data that passes validation
    ///
    /// Replicas are checked against the payload key. Erasure fragments can
    /// only be checked for length; the decoded payload is verified later.
    async fn survey(&self, metadata: &Metadata, chunk: &ChunkRecord) -> Result<FanoutRead> {
        let stored_size = chunk.stored_size as usize;
        let (expected_len, verify) = match metadata.codec.kind {
            CodecKind::Erasure => {
                let config = ErasureConfig::new(metadata.codec.k, metadata.codec.m)?;
                (config.fragment_size(stored_size), false)
            }
            CodecKind::Replication | CodecKind::None => (stored_size, true),
        };
        let hasher = Hasher::new(metadata.hasher);

        ShardFanout::new(self.shards.targets(&chunk.shards), self.options.clone())
            .read_all(&slot_keys(&chunk.payload_key, &metadata.codec), |b| {
                b.len() == expected_len && (!verify || hasher.verify(b, &chunk.payload_key))
            })
            .await
    }

    /// Rewrite every missing slot of every chunk
    ///
    /// A slot goes back to its original shard, or to the first spare shard
    /// not used by the chunk when the original one refuses it. Metadata is
    /// re-stored whenever a slot moved, even if a later chunk fails.
    ///
    /// The repair source is decoded through the pipeline before anything is
    /// rewritten, so the configured pipeline must match the object's.
    pub async fn repair(&self, key: &str) -> Result<Metadata> {
        let mut metadata = self.metastor.get(key).await?;
        let codec = self.prepare_read(&metadata)?;

        let mut repaired = 0usize;
        let mut failure = None;
        for index in 0..metadata.chunks.len() {
            let outcome = self
                .repair_chunk(&metadata, codec.as_ref(), index, &metadata.chunks[index])
                .await;
            match outcome {
                Ok(Some(shards)) => {
                    metadata.chunks[index].shards = shards;
                    repaired += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if repaired > 0 {
            metadata.touch();
            self.metastor.set(&metadata).await?;
        }
        if let Some(e) = failure {
            return Err(e);
        }

        info!(key, chunks = repaired, "repair finished");
        Ok(metadata)
    }

    /// Restore the missing slots of one chunk. Returns the new shard list
    /// when anything was rewritten.
    async fn repair_chunk(
        &self,
        metadata: &Metadata,
        codec: Option<&ErasureCodec>,
        index: usize,
        chunk: &ChunkRecord,
    ) -> Result<Option<Vec<String>>> {
        let read = self.survey(metadata, chunk).await?;
        let lost: Vec<usize> = (0..read.slots.len())
            .filter(|&slot| read.slots[slot].is_none())
            .collect();
        if lost.is_empty() {
            return Ok(None);
        }
        let params = &metadata.codec;

        let payloads: Vec<Bytes> = match codec {
            Some(codec) => {
                if read.delivered() < params.k {
                    return Err(ShardStorError::Unrecoverable {
                        lost: lost.len(),
                        tolerated: params.m,
                        errors: read.errors,
                    });
                }
                let slots: Vec<Bytes> = read.slots.iter().map(|s| s.clone().unwrap_or_default()).collect();
                let payload = codec.decode(&slots, &lost, chunk.stored_size as usize)?;
                self.open_payload(metadata, index, chunk, &payload)?;
                codec.encode(&payload)?.into_iter().map(|f| f.data).collect()
            }
            None => {
                let source = read
                    .slots
                    .iter()
                    .flatten()
                    .find(|b| self.open_payload(metadata, index, chunk, b).is_ok());
                match source {
                    Some(source) => vec![source.clone(); params.slots()],
                    None => {
                        return Err(ShardStorError::Unrecoverable {
                            lost: lost.len(),
                            tolerated: params.recoverable_losses(),
                            errors: read.errors,
                        })
                    }
                }
            }
        };

        let keys = slot_keys(&chunk.payload_key, params);
        let mut shards = chunk.shards.clone();
        let mut spares: Vec<String> = self.shards.spares(&chunk.shards).cloned().collect();
        let errors = ShardErrorSet::new();
        let mut unplaced = 0usize;

        for slot in lost {
            let mut candidates = vec![shards[slot].clone()];
            candidates.extend(spares.iter().cloned());

            let mut placed = false;
            for address in candidates {
                let result = match self.shards.client(&address) {
                    Ok(client) => {
                        self.options
                            .run(client.store(&keys[slot], payloads[slot].clone()))
                            .await
                    }
                    Err(e) => Err(e),
                };
                match result {
                    Ok(()) => {
                        if address != shards[slot] {
                            info!(chunk = index, slot, from = %shards[slot], to = %address, "slot moved to spare shard");
                            spares.retain(|s| s != &address);
                            shards[slot] = address;
                        } else {
                            debug!(chunk = index, slot, address = %address, "slot rewritten");
                        }
                        placed = true;
                        break;
                    }
                    Err(ShardStorError::Cancelled) => return Err(ShardStorError::Cancelled),
                    Err(e) => {
                        warn!(chunk = index, slot, address = %address, error = %e, "repair write failed");
                        errors.add_error(&address, SHARD_KIND_OBJECT, &e);
                    }
                }
            }
            if !placed {
                unplaced += 1;
            }
        }

        if unplaced > 0 {
            return Err(ShardStorError::Unrecoverable {
                lost: unplaced,
                tolerated: 0,
                errors,
            });
        }
        Ok(Some(shards))
    }

    /// Remove the metadata record of `key`
    ///
    /// Stored chunks are content addressed and may be shared with other
    /// objects, so they stay on the shards.
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.metastor.delete(key).await?;
        info!(key, "object deleted");
        Ok(())
    }

    /// Close every resolved shard client
    pub async fn close(&self) -> Result<()> {
        let objects = self.shards.close(&self.options, SHARD_KIND_OBJECT).await;
        let metadata = self.metastor.close().await;
        match (objects, metadata) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(ShardStorError::ShardFailures(a)), Err(ShardStorError::ShardFailures(b))) => {
                a.extend(&b);
                Err(ShardStorError::ShardFailures(a))
            }
            (Err(e), _) | (_, Err(e)) => Err(e),
        }
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(ShardStorError::InvalidConfig(
            "object key must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn slot_keys(payload_key: &ContentKey, params: &CodecParams) -> Vec<Vec<u8>> {
    (0..params.slots())
        .map(|slot| slot_key(payload_key, params.kind, slot))
        .collect()
}

/// Shared key of a replicated or single-copy chunk
fn first_key(keys: &[Vec<u8>]) -> Result<&[u8]> {
    keys.first()
        .map(Vec::as_slice)
        .ok_or_else(|| ShardStorError::CorruptData("codec has no slots".to_string()))
}

fn codec_for(params: &CodecParams) -> Result<Option<ErasureCodec>> {
    match params.kind {
        CodecKind::Erasure => Ok(Some(ErasureCodec::new(params.k, params.m)?)),
        CodecKind::Replication | CodecKind::None => Ok(None),
    }
}
