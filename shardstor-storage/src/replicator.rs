//! Replication to N shards
//!
//! Writes the same payload to every target, either one after another
//! (stopping at the first failure) or all at once. Reads try the targets in
//! order until one answers.

use crate::fanout::{FanoutOptions, ShardTarget};
use bytes::Bytes;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use shardstor_core::error::{Result, ShardStorError};
use shardstor_core::shard_error::{ShardErrorSet, SHARD_KIND_OBJECT};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// How replicas are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicationMode {
    /// In order; the first failure ends the write
    Sync,
    /// All replicas in parallel; every failure is collected
    #[default]
    Async,
}

impl FromStr for ReplicationMode {
    type Err = ShardStorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sync" => Ok(ReplicationMode::Sync),
            "async" => Ok(ReplicationMode::Async),
            other => Err(ShardStorError::InvalidConfig(format!(
                "unknown replication mode: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ReplicationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicationMode::Sync => f.write_str("sync"),
            ReplicationMode::Async => f.write_str("async"),
        }
    }
}

/// Outcome of a replicated write
#[derive(Debug, Default)]
pub struct ReplicationReport {
    /// Bytes accepted, summed over successful replicas
    pub bytes_written: u64,
    /// Replicas that failed, in ascending order
    pub failed: Vec<usize>,
    /// Replicas never attempted because a sync write stopped early
    pub skipped: Vec<usize>,
    pub errors: ShardErrorSet,
    pub cancelled: bool,
    /// Total number of replicas
    pub replicas: usize,
}

impl ReplicationReport {
    /// True when every replica holds the payload
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.failed.is_empty() && self.skipped.is_empty()
    }

    /// Accept the write when at most `tolerance` replicas are missing
    ///
    /// A sync write that stopped early is never accepted. Losing every
    /// replica is `Unrecoverable`; a partial loss beyond the tolerance
    /// surfaces all underlying errors as `ShardFailures`.
    pub fn into_result(self, tolerance: usize) -> Result<u64> {
        if self.cancelled {
            return Err(ShardStorError::Cancelled);
        }
        let missing = self.failed.len() + self.skipped.len();
        if missing == 0 {
            return Ok(self.bytes_written);
        }
        if missing >= self.replicas {
            return Err(ShardStorError::Unrecoverable {
                lost: missing,
                tolerated: tolerance,
                errors: self.errors,
            });
        }
        if !self.skipped.is_empty() || missing > tolerance {
            return Err(ShardStorError::ShardFailures(self.errors));
        }
        Ok(self.bytes_written)
    }
}

/// Writes one payload to N ordered targets
pub struct Replicator {
    targets: Vec<ShardTarget>,
    mode: ReplicationMode,
    options: FanoutOptions,
}

impl Replicator {
    pub fn new(targets: Vec<ShardTarget>, mode: ReplicationMode, options: FanoutOptions) -> Self {
        Self {
            targets,
            mode,
            options,
        }
    }

    pub fn mode(&self) -> ReplicationMode {
        self.mode
    }

    pub fn replicas(&self) -> usize {
        self.targets.len()
    }

    /// Store `value` under `key` on every target
    pub async fn write(&self, key: &[u8], value: Bytes) -> ReplicationReport {
        let mut report = ReplicationReport {
            replicas: self.targets.len(),
            ..Default::default()
        };

        match self.mode {
            ReplicationMode::Sync => {
                for (slot, target) in self.targets.iter().enumerate() {
                    let result = match target.client() {
                        Ok(client) => self.options.run(client.store(key, value.clone())).await,
                        Err(e) => Err(e),
                    };
                    if let Err(e) = result {
                        Self::record(&mut report, slot, target.address(), e);
                        report.skipped = (slot + 1..self.targets.len()).collect();
                        break;
                    }
                    report.bytes_written += value.len() as u64;
                }
            }
            ReplicationMode::Async => {
                let results = join_all(self.targets.iter().map(|target| {
                    let value = value.clone();
                    async move {
                        let client = target.client()?;
                        self.options.run(client.store(key, value)).await
                    }
                }))
                .await;

                for (slot, result) in results.into_iter().enumerate() {
                    match result {
                        Ok(()) => report.bytes_written += value.len() as u64,
                        Err(e) => Self::record(&mut report, slot, self.targets[slot].address(), e),
                    }
                }
            }
        }

        debug!(
            mode = %self.mode,
            replicas = report.replicas,
            failed = report.failed.len(),
            bytes = report.bytes_written,
            "replicated write finished"
        );
        report
    }

    /// Read `key` from the first target whose data `decode` accepts
    ///
    /// A replica that `decode` rejects counts as lost and the next one is
    /// tried, so a corrupt copy never hides an intact one further down.
    pub async fn read<T, D>(&self, key: &[u8], decode: D) -> Result<(usize, T)>
    where
        D: Fn(&Bytes) -> Result<T>,
    {
        let errors = ShardErrorSet::new();
        let mut rejected = 0usize;
        let mut last_rejection = None;
        for (slot, target) in self.targets.iter().enumerate() {
            let result = match target.client() {
                Ok(client) => self.options.run(client.get(key)).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(data) => match decode(&data) {
                    Ok(value) => return Ok((slot, value)),
                    Err(e) => {
                        warn!(slot, address = target.address(), len = data.len(), error = %e, "rejected replica");
                        errors.add(
                            vec![target.address().to_string()],
                            SHARD_KIND_OBJECT,
                            Some(&e),
                            e.code(),
                        );
                        rejected += 1;
                        last_rejection = Some(e);
                    }
                },
                Err(ShardStorError::Cancelled) => return Err(ShardStorError::Cancelled),
                Err(e) => {
                    warn!(slot, address = target.address(), error = %e, "replica read failed");
                    errors.add_error(target.address(), SHARD_KIND_OBJECT, &e);
                }
            }
        }

        // every replica answered and none decoded: the data itself is bad
        if rejected == self.targets.len() {
            if let Some(e) = last_rejection {
                return Err(e);
            }
        }
        Err(ShardStorError::Unrecoverable {
            lost: self.targets.len(),
            tolerated: self.targets.len().saturating_sub(1),
            errors,
        })
    }

    fn record(report: &mut ReplicationReport, slot: usize, address: &str, error: ShardStorError) {
        if matches!(error, ShardStorError::Cancelled) {
            report.cancelled = true;
            return;
        }
        warn!(slot, address, error = %error, "replica write failed");
        report.errors.add_error(address, SHARD_KIND_OBJECT, &error);
        report.failed.push(slot);
    }
}
