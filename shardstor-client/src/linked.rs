//! Walking chains of linked objects
//!
//! [`Client::write_linked`] chains objects through the `previous_key` and
//! `next_key` fields of their metadata. A [`Traversal`] follows that chain
//! one record at a time, filtered by creation time.

use crate::client::Client;
use shardstor_core::error::{Result, ShardStorError};
use shardstor_core::metadata::Metadata;
use std::io::Write;
use tracing::debug;

/// Direction a [`Traversal`] follows the chain in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraverseOrder {
    /// Oldest to newest, following `next_key`
    Forward,
    /// Newest to oldest, following `previous_key`
    Backward,
}

/// Cursor over a chain of linked objects
///
/// Call [`Traversal::next`] before reading the current record. A failed
/// metadata read ends the walk with that error.
pub struct Traversal<'a> {
    client: &'a Client,
    order: TraverseOrder,
    pending: Option<String>,
    from: Option<i64>,
    to: Option<i64>,
    current: Option<Metadata>,
}

impl<'a> Traversal<'a> {
    pub(crate) fn new(
        client: &'a Client,
        order: TraverseOrder,
        start: &str,
        from: Option<i64>,
        to: Option<i64>,
    ) -> Self {
        Self {
            client,
            order,
            pending: Some(start.to_string()),
            from,
            to,
            current: None,
        }
    }

    pub fn order(&self) -> TraverseOrder {
        self.order
    }

    /// Move to the next record inside the epoch range
    ///
    /// Returns `None` once the chain ends or leaves the range.
    pub async fn next(&mut self) -> Result<Option<&Metadata>> {
        while let Some(key) = self.pending.take() {
            let metadata = self.client.stat(&key).await?;
            let created = metadata.created_at;

            if self.past_range(created) {
                debug!(key = %key, created, "traversal left the epoch range");
                self.current = None;
                return Ok(None);
            }

            self.pending = match self.order {
                TraverseOrder::Forward => metadata.next_key.clone(),
                TraverseOrder::Backward => metadata.previous_key.clone(),
            };
            if self.before_range(created) {
                continue;
            }

            self.current = Some(metadata);
            return Ok(self.current.as_ref());
        }
        self.current = None;
        Ok(None)
    }

    /// Key the next call to [`Traversal::next`] will load, if any
    ///
    /// The record behind it may still fall outside the epoch range.
    pub fn peek_next_key(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    /// Record the cursor is on
    pub fn metadata(&self) -> Option<&Metadata> {
        self.current.as_ref()
    }

    /// Stream the object the cursor is on into `writer`
    pub async fn read_data<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        let metadata = self.current.as_ref().ok_or_else(|| {
            ShardStorError::InvalidConfig("traversal has no current record, call next first".to_string())
        })?;
        self.client.read_object(metadata, writer).await
    }

    /// Record lies beyond the far end of the range, so the walk is over
    fn past_range(&self, created: i64) -> bool {
        match (self.order, self.to) {
            (TraverseOrder::Forward, Some(to)) => created > to,
            (TraverseOrder::Backward, Some(to)) => created < to,
            (_, None) => false,
        }
    }

    /// Record lies before the near end of the range and is skipped
    fn before_range(&self, created: i64) -> bool {
        match (self.order, self.from) {
            (TraverseOrder::Forward, Some(from)) => created < from,
            (TraverseOrder::Backward, Some(from)) => created > from,
            (_, None) => false,
        }
    }
}
