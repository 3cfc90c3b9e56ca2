//! Shard fan-out
//!
//! Dispatches positional payloads to positional shards. Every shard call is
//! bounded by an optional per-operation deadline and raced against a
//! cancellation token. Results land in per-slot positions and errors are
//! folded into a [`ShardErrorSet`] after the join, so workers never share
//! mutable state.

use crate::backend::ShardClient;
use bytes::Bytes;
use futures::future::join_all;
use shardstor_core::error::{Result, ShardStorError};
use shardstor_core::shard_error::{ShardErrorSet, SHARD_KIND_OBJECT};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Deadline and cancellation applied to every shard operation
#[derive(Debug, Clone, Default)]
pub struct FanoutOptions {
    /// Per-operation deadline; `None` waits forever
    pub timeout: Option<Duration>,
    /// Aborts outstanding shard I/O with `Cancelled`
    pub cancel: CancellationToken,
}

impl FanoutOptions {
    pub fn new(timeout: Option<Duration>, cancel: CancellationToken) -> Self {
        Self { timeout, cancel }
    }

    /// Run one shard operation under the deadline and the cancellation token
    pub async fn run<T, F>(&self, op: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let timeout = self.timeout;
        let bounded = async move {
            match timeout {
                Some(deadline) => tokio::time::timeout(deadline, op)
                    .await
                    .map_err(|_| ShardStorError::Timeout(deadline))?,
                None => op.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ShardStorError::Cancelled),
            res = bounded => res,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// One positional fan-out target
///
/// Holds the resolution failure instead of a client when the address could
/// not be resolved, so the slot fails like any other shard.
pub struct ShardTarget {
    address: String,
    client: std::result::Result<Arc<dyn ShardClient>, String>,
}

impl ShardTarget {
    pub fn new(client: Arc<dyn ShardClient>) -> Self {
        Self {
            address: client.address().to_string(),
            client: Ok(client),
        }
    }

    /// A slot whose address could not be resolved
    pub fn unresolved(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            client: Err(reason.into()),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn client(&self) -> Result<&Arc<dyn ShardClient>> {
        self.client
            .as_ref()
            .map_err(|reason| ShardStorError::InvalidShardAddress(reason.clone()))
    }
}

/// Outcome of a fan-out operation
#[derive(Debug, Default)]
pub struct FanoutOutcome {
    /// Slots that failed, in ascending order
    pub failed: Vec<usize>,
    /// Shard errors of the failed slots
    pub errors: ShardErrorSet,
    /// Set when the operation was aborted by the cancellation token
    pub cancelled: bool,
}

impl FanoutOutcome {
    fn record(&mut self, slot: usize, address: &str, kind: &str, error: ShardStorError) {
        if matches!(error, ShardStorError::Cancelled) {
            self.cancelled = true;
            return;
        }
        warn!(slot, address, error = %error, "shard operation failed");
        self.errors.add_error(address, kind, &error);
        self.failed.push(slot);
    }

    /// Accept the outcome when at most `tolerance` slots failed
    pub fn check(&self, tolerance: usize) -> Result<()> {
        if self.cancelled {
            return Err(ShardStorError::Cancelled);
        }
        if self.failed.len() > tolerance {
            return Err(ShardStorError::Unrecoverable {
                lost: self.failed.len(),
                tolerated: tolerance,
                errors: self.errors.clone(),
            });
        }
        Ok(())
    }
}

/// Result of a positional read
#[derive(Debug, Default)]
pub struct FanoutRead {
    /// One entry per target; `None` for slots not fetched or lost
    pub slots: Vec<Option<Bytes>>,
    /// Slots requested but not delivered (failed or rejected)
    pub lost: Vec<usize>,
    pub errors: ShardErrorSet,
    pub cancelled: bool,
}

impl FanoutRead {
    /// Number of slots holding accepted data
    pub fn delivered(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

/// Ordered shard targets plus the options applied to each call
pub struct ShardFanout {
    targets: Vec<ShardTarget>,
    options: FanoutOptions,
}

impl ShardFanout {
    pub fn new(targets: Vec<ShardTarget>, options: FanoutOptions) -> Self {
        Self { targets, options }
    }

    pub fn targets(&self) -> &[ShardTarget] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    fn check_arity(&self, n: usize) -> Result<()> {
        if n != self.targets.len() {
            return Err(ShardStorError::InvalidConfig(format!(
                "fan-out has {} targets but got {} entries",
                self.targets.len(),
                n
            )));
        }
        Ok(())
    }

    /// Store `values[i]` under `keys[i]` on target `i`, all slots in parallel
    pub async fn write(&self, keys: &[Vec<u8>], values: &[Bytes]) -> Result<FanoutOutcome> {
        self.check_arity(keys.len())?;
        self.check_arity(values.len())?;

        let results = join_all(self.targets.iter().zip(keys).zip(values).map(
            |((target, key), value)| async move {
                let client = target.client()?;
                self.options.run(client.store(key, value.clone())).await
            },
        ))
        .await;

        let mut outcome = FanoutOutcome::default();
        for (slot, result) in results.into_iter().enumerate() {
            if let Err(e) = result {
                outcome.record(slot, self.targets[slot].address(), SHARD_KIND_OBJECT, e);
            }
        }
        debug!(
            slots = self.targets.len(),
            failed = outcome.failed.len(),
            "fan-out write finished"
        );
        Ok(outcome)
    }

    /// Check `keys[i]` on target `i`, all slots in parallel
    ///
    /// A missing key counts as a lost slot without a shard error.
    pub async fn exists(&self, keys: &[Vec<u8>]) -> Result<FanoutOutcome> {
        self.check_arity(keys.len())?;

        let results = join_all(self.targets.iter().zip(keys).map(|(target, key)| async move {
            let client = target.client()?;
            self.options.run(client.exists(key)).await
        }))
        .await;

        let mut outcome = FanoutOutcome::default();
        for (slot, result) in results.into_iter().enumerate() {
            match result {
                Ok(true) => {}
                Ok(false) => outcome.failed.push(slot),
                Err(e) => outcome.record(slot, self.targets[slot].address(), SHARD_KIND_OBJECT, e),
            }
        }
        Ok(outcome)
    }

    /// Fetch `keys[i]` from target `i` for every slot in parallel
    pub async fn read_all<A>(&self, keys: &[Vec<u8>], accept: A) -> Result<FanoutRead>
    where
        A: Fn(&Bytes) -> bool,
    {
        self.read_until(keys, self.targets.len(), accept).await
    }

    /// Fetch until `needed` slots have delivered acceptable data
    ///
    /// The first `needed` slots are requested in parallel; every later round
    /// requests as many further slots, in order, as the previous round lost.
    /// Data rejected by `accept` counts as a loss.
    pub async fn read_until<A>(&self, keys: &[Vec<u8>], needed: usize, accept: A) -> Result<FanoutRead>
    where
        A: Fn(&Bytes) -> bool,
    {
        self.check_arity(keys.len())?;

        let total = self.targets.len();
        let mut read = FanoutRead {
            slots: vec![None; total],
            ..Default::default()
        };
        let mut next = 0usize;
        let mut missing = needed.min(total);

        while missing > 0 && next < total {
            let round: Vec<usize> = (next..(next + missing).min(total)).collect();
            next += round.len();

            let results = join_all(round.iter().map(|&slot| {
                let target = &self.targets[slot];
                let key = &keys[slot];
                async move {
                    let client = target.client()?;
                    self.options.run(client.get(key)).await
                }
            }))
            .await;

            for (slot, result) in round.into_iter().zip(results) {
                match result {
                    Ok(data) if accept(&data) => read.slots[slot] = Some(data),
                    Ok(data) => {
                        warn!(slot, address = self.targets[slot].address(), len = data.len(), "rejected shard data");
                        read.errors.add(
                            vec![self.targets[slot].address().to_string()],
                            SHARD_KIND_OBJECT,
                            Some(format!("unexpected data of {} bytes", data.len())),
                            0,
                        );
                        read.lost.push(slot);
                    }
                    Err(ShardStorError::Cancelled) => read.cancelled = true,
                    Err(e) => {
                        warn!(slot, address = self.targets[slot].address(), error = %e, "shard read failed");
                        read.errors.add_error(self.targets[slot].address(), SHARD_KIND_OBJECT, &e);
                        read.lost.push(slot);
                    }
                }
            }

            if read.cancelled {
                return Err(ShardStorError::Cancelled);
            }
            missing = needed.saturating_sub(read.delivered());
        }

        Ok(read)
    }
}
