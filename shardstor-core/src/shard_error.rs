//! Per-shard error accounting
//!
//! A `ShardErrorSet` collects the failures of individual shards during a
//! fan-out. It is the only mutable object shared between fan-out workers and
//! guards its entries with a mutex. Rendering is stable: a header line
//! followed by one JSON object per entry, so other tools can parse it.

use crate::error::{ErrorKind, ShardStorError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shard kind for object (fragment) servers
pub const SHARD_KIND_OBJECT: &str = "object";

/// Shard kind for metadata servers
pub const SHARD_KIND_METADATA: &str = "metadata";

/// A single shard failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardError {
    /// Addresses of the shard(s) that failed
    pub addresses: Vec<String>,
    /// Shard kind (see `SHARD_KIND_*`)
    pub kind: String,
    /// Numeric error code (see [`ErrorKind::code`])
    pub code: u16,
    /// Rendered underlying error, if one was given
    pub message: Option<String>,
}

impl ShardError {
    /// Error kind matching this entry's code
    pub fn error_kind(&self) -> ErrorKind {
        ErrorKind::from_code(self.code).unwrap_or(ErrorKind::UnknownShardError)
    }
}

impl fmt::Display for ShardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

/// Thread-safe, append-only list of shard failures
#[derive(Default)]
pub struct ShardErrorSet {
    errors: Mutex<Vec<ShardError>>,
}

impl ShardErrorSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure. A zero code is stored as `UnknownShardError`.
    pub fn add<E: fmt::Display>(
        &self,
        addresses: Vec<String>,
        kind: impl Into<String>,
        error: Option<E>,
        code: u16,
    ) {
        let code = if code == 0 {
            ErrorKind::UnknownShardError.code()
        } else {
            code
        };
        let entry = ShardError {
            addresses,
            kind: kind.into(),
            code,
            message: error.map(|e| e.to_string()),
        };
        self.errors.lock().push(entry);
    }

    /// Record a failure of one shard, deriving the code from the error
    pub fn add_error(&self, address: &str, kind: &str, error: &ShardStorError) {
        let code = match error.kind() {
            k if k.is_shard_failure() => k.code(),
            _ => ErrorKind::UnknownShardError.code(),
        };
        self.add(vec![address.to_string()], kind, Some(error), code);
    }

    /// Append every entry of another set
    pub fn extend(&self, other: &ShardErrorSet) {
        let items = other.items();
        self.errors.lock().extend(items);
    }

    /// Number of recorded failures
    pub fn count(&self) -> usize {
        self.errors.lock().len()
    }

    /// True when no failure was recorded
    pub fn is_empty(&self) -> bool {
        self.errors.lock().is_empty()
    }

    /// Snapshot of the recorded failures
    pub fn items(&self) -> Vec<ShardError> {
        self.errors.lock().clone()
    }

    /// Most frequent error kind, `UnknownShardError` when empty
    pub fn dominant_kind(&self) -> ErrorKind {
        let errors = self.errors.lock();
        let mut counts: Vec<(ErrorKind, usize)> = Vec::new();
        for err in errors.iter() {
            let kind = err.error_kind();
            match counts.iter_mut().find(|(k, _)| *k == kind) {
                Some((_, n)) => *n += 1,
                None => counts.push((kind, 1)),
            }
        }
        counts
            .into_iter()
            .max_by_key(|(_, n)| *n)
            .map(|(k, _)| k)
            .unwrap_or(ErrorKind::UnknownShardError)
    }

    /// Render all entries as a JSON array
    pub fn to_json(&self) -> String {
        serde_json::to_string(&*self.errors.lock()).unwrap_or_else(|_| "[]".to_string())
    }
}

impl Clone for ShardErrorSet {
    fn clone(&self) -> Self {
        Self {
            errors: Mutex::new(self.items()),
        }
    }
}

impl fmt::Debug for ShardErrorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.errors.lock().iter()).finish()
    }
}

impl fmt::Display for ShardErrorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let errors = self.errors.lock();
        if errors.is_empty() {
            return Ok(());
        }
        write!(f, "following shard errors occurred:")?;
        for err in errors.iter() {
            write!(f, "\n\t{}", err)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_empty_set() {
        let set = ShardErrorSet::new();
        assert!(set.is_empty());
        assert_eq!(set.count(), 0);
        assert_eq!(set.to_string(), "");
        assert_eq!(set.to_json(), "[]");
    }

    #[test]
    fn test_zero_code_becomes_unknown() {
        let set = ShardErrorSet::new();
        set.add(vec!["22379".to_string()], "", None::<&str>, 0);
        let items = set.items();
        assert_eq!(items[0].code, ErrorKind::UnknownShardError.code());
        assert_eq!(items[0].message, None);
    }

    #[test]
    fn test_concurrent_add() {
        let set = Arc::new(ShardErrorSet::new());
        let handles: Vec<_> = (0..1000)
            .map(|_| {
                let set = Arc::clone(&set);
                std::thread::spawn(move || {
                    set.add(vec!["22379".to_string()], "", None::<&str>, 0);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(set.count(), 1000);
    }

    #[test]
    fn test_rendering_is_parseable() {
        let set = ShardErrorSet::new();
        set.add(
            vec!["memory://a".to_string(), "memory://b".to_string()],
            SHARD_KIND_OBJECT,
            Some("timed out"),
            ErrorKind::Timeout.code(),
        );
        set.add_error(
            "memory://c",
            SHARD_KIND_METADATA,
            &ShardStorError::InvalidShardAddress("memory://c".to_string()),
        );

        let rendered = set.to_string();
        let mut lines = rendered.lines();
        assert_eq!(lines.next(), Some("following shard errors occurred:"));
        let parsed: Vec<ShardError> = lines
            .map(|l| serde_json::from_str(l.trim_start_matches('\t')).unwrap())
            .collect();
        assert_eq!(parsed, set.items());

        let all: Vec<ShardError> = serde_json::from_str(&set.to_json()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].code, 402);
    }

    #[test]
    fn test_dominant_kind() {
        let set = ShardErrorSet::new();
        set.add(vec![], SHARD_KIND_OBJECT, None::<&str>, ErrorKind::Timeout.code());
        set.add(vec![], SHARD_KIND_OBJECT, None::<&str>, ErrorKind::ShardIo.code());
        set.add(vec![], SHARD_KIND_OBJECT, None::<&str>, ErrorKind::ShardIo.code());
        assert_eq!(set.dominant_kind(), ErrorKind::ShardIo);
    }
}
