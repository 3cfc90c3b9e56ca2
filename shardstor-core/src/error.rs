//! Error types for shardstor
//!
//! Provides a unified error type for all shardstor operations, plus the
//! `ErrorKind` taxonomy used for cross-process reporting.

use crate::shard_error::ShardErrorSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for shardstor operations
pub type Result<T> = std::result::Result<T, ShardStorError>;

/// Error classification with a stable numeric code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidConfig,
    Cancelled,
    Unrecoverable,
    CorruptData,
    NotFound,
    /// Local file or stream failure, never attributed to a shard
    LocalIo,
    UnknownShardError,
    Timeout,
    InvalidShardAddress,
    ShardIo,
}

impl ErrorKind {
    /// Numeric code reported across process boundaries
    pub fn code(self) -> u16 {
        match self {
            ErrorKind::InvalidConfig => 100,
            ErrorKind::Cancelled => 101,
            ErrorKind::Unrecoverable => 102,
            ErrorKind::CorruptData => 103,
            ErrorKind::NotFound => 104,
            ErrorKind::LocalIo => 105,
            ErrorKind::UnknownShardError => 400,
            ErrorKind::Timeout => 401,
            ErrorKind::InvalidShardAddress => 402,
            ErrorKind::ShardIo => 403,
        }
    }

    /// Reverse of [`ErrorKind::code`]
    pub fn from_code(code: u16) -> Option<Self> {
        let kind = match code {
            100 => ErrorKind::InvalidConfig,
            101 => ErrorKind::Cancelled,
            102 => ErrorKind::Unrecoverable,
            103 => ErrorKind::CorruptData,
            104 => ErrorKind::NotFound,
            105 => ErrorKind::LocalIo,
            400 => ErrorKind::UnknownShardError,
            401 => ErrorKind::Timeout,
            402 => ErrorKind::InvalidShardAddress,
            403 => ErrorKind::ShardIo,
            _ => return None,
        };
        Some(kind)
    }

    /// Whether this kind counts against a shard's slot during fan-out
    pub fn is_shard_failure(self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout
                | ErrorKind::InvalidShardAddress
                | ErrorKind::ShardIo
                | ErrorKind::UnknownShardError
                | ErrorKind::NotFound
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidConfig => "InvalidConfig",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::Unrecoverable => "Unrecoverable",
            ErrorKind::CorruptData => "CorruptData",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::LocalIo => "LocalIO",
            ErrorKind::UnknownShardError => "UnknownShardError",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::InvalidShardAddress => "InvalidShardAddress",
            ErrorKind::ShardIo => "ShardIO",
        };
        f.write_str(name)
    }
}

/// Unified error type for shardstor
#[derive(Error, Debug)]
pub enum ShardStorError {
    // ===== Construction Errors =====
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ===== Caller Errors =====
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Not found: {0}")]
    NotFound(String),

    // ===== Shard Errors =====
    #[error("Shard operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid shard address: {0}")]
    InvalidShardAddress(String),

    #[error("Shard I/O error: {0}")]
    ShardIo(String),

    #[error("Unknown shard error: {0}")]
    UnknownShard(String),

    #[error("{0}")]
    ShardFailures(ShardErrorSet),

    // ===== Object Errors =====
    #[error("Unrecoverable: {lost} shard(s) lost, at most {tolerated} tolerated{}", render_errors(.errors))]
    Unrecoverable {
        lost: usize,
        tolerated: usize,
        errors: ShardErrorSet,
    },

    #[error("Corrupt data: {0}")]
    CorruptData(String),

    // ===== Local Errors =====
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

fn render_errors(errors: &ShardErrorSet) -> String {
    if errors.is_empty() {
        String::new()
    } else {
        format!("\n{}", errors)
    }
}

impl ShardStorError {
    /// Unrecoverable loss without any recorded shard errors
    pub fn unrecoverable(lost: usize, tolerated: usize) -> Self {
        ShardStorError::Unrecoverable {
            lost,
            tolerated,
            errors: ShardErrorSet::new(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShardStorError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            ShardStorError::Cancelled => ErrorKind::Cancelled,
            ShardStorError::NotFound(_) => ErrorKind::NotFound,
            ShardStorError::Timeout(_) => ErrorKind::Timeout,
            ShardStorError::InvalidShardAddress(_) => ErrorKind::InvalidShardAddress,
            ShardStorError::ShardIo(_) => ErrorKind::ShardIo,
            ShardStorError::UnknownShard(_) => ErrorKind::UnknownShardError,
            ShardStorError::ShardFailures(set) => set.dominant_kind(),
            ShardStorError::Unrecoverable { .. } => ErrorKind::Unrecoverable,
            ShardStorError::CorruptData(_) => ErrorKind::CorruptData,
            ShardStorError::Io(_) => ErrorKind::LocalIo,
            ShardStorError::Serialization(_) => ErrorKind::CorruptData,
        }
    }

    /// Numeric code of this error's kind
    pub fn code(&self) -> u16 {
        self.kind().code()
    }

    /// Shard errors attached to this error, if any
    pub fn shard_errors(&self) -> Option<&ShardErrorSet> {
        match self {
            ShardStorError::ShardFailures(set) => Some(set),
            ShardStorError::Unrecoverable { errors, .. } if !errors.is_empty() => Some(errors),
            _ => None,
        }
    }
}

impl From<bincode::Error> for ShardStorError {
    fn from(err: bincode::Error) -> Self {
        ShardStorError::Serialization(err.to_string())
    }
}
