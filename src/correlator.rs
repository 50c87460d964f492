use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use crate::{error::Error, wire::Tag};

/// A ping matched with its ack.
#[derive(Copy, Clone, Debug)]
pub struct Resolved {
    pub tag: Tag,
    /// Time between `new_ping` and `resolve`, in milliseconds.
    pub elapsed_ms: f64,
    /// When the ping was registered.
    pub sent_at: Instant,
}

#[derive(Default)]
struct PendingTable {
    last_tag: Tag,
    pending: HashMap<Tag, Instant>,
}

/// Owns the tag sequence and the table of pings awaiting their ack.
///
/// Tag allocation and table insertion happen under the same lock, so an ack can never
/// observe a tag that is not yet in the table.
#[derive(Default)]
pub struct RoundtripCorrelator {
    table: Mutex<PendingTable>,
}

impl RoundtripCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next tag and records the current time as its send time.
    ///
    /// Must be called before the outbound send is issued.
    pub fn new_ping(&self) -> Tag {
        let mut table = self.lock();
        table.last_tag = table.last_tag.wrapping_add(1);
        let tag = table.last_tag;
        table.pending.insert(tag, Instant::now());
        tag
    }

    /// Matches an ack to its pending ping and removes the entry.
    ///
    /// A second ack for the same tag yields `UnknownTag`.
    pub fn resolve(&self, tag: Tag) -> Result<Resolved, Error> {
        let sent_at = self.lock().pending.remove(&tag).ok_or(Error::UnknownTag(tag))?;
        let elapsed_ms = sent_at.elapsed().as_secs_f64() * 1000.0;

        Ok(Resolved {
            tag,
            elapsed_ms,
            sent_at,
        })
    }

    /// Number of pings still waiting for an ack.
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Drops pending pings registered more than `max_age` ago. Returns how many were removed.
    pub fn evict_older_than(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let mut table = self.lock();
        let before = table.pending.len();
        table
            .pending
            .retain(|_, sent_at| now.saturating_duration_since(*sent_at) <= max_age);
        before - table.pending.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PendingTable> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }
}
