// src/recording/buffer.rs
//! In-memory event buffer and session-wide accumulating cache
//!
//! ```text
//! record() → pending ──flush (interval elapsed | high/critical)──→ cache
//!                                                                   │
//!                                           len ≥ limit → ChunkWriter
//! ```
//!
//! The buffer holds no lock of its own; the recorder owns it behind the
//! single ingestion mutex.

use crate::recording::event::{Event, Priority};
use std::ops::Range;
use std::time::{Duration, Instant};

/// Pending events plus the accumulating cache
#[derive(Debug)]
pub struct EventBuffer {
    /// Events recorded since the last flush
    pending: Vec<Event>,

    /// Flushed events awaiting compression
    cache: Vec<Event>,

    /// Instant of the last flush (`None` until the first one)
    last_flush: Option<Instant>,

    flush_interval: Duration,

    flush_count: u64,
}

impl EventBuffer {
    pub fn new(flush_interval: Duration) -> Self {
        Self {
            pending: Vec::new(),
            cache: Vec::new(),
            last_flush: None,
            flush_interval,
            flush_count: 0,
        }
    }

    /// Append an event to the pending list
    pub fn push(&mut self, event: Event) {
        self.pending.push(event);
    }

    /// Whether the pending list must be flushed now
    pub fn should_flush(&self, priority: Priority, now: Instant) -> bool {
        if priority.forces_flush() {
            return true;
        }
        match self.last_flush {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.flush_interval,
        }
    }

    /// Move pending events into the cache
    ///
    /// Returns the range of cache indices that were appended. An empty flush
    /// still resets the interval.
    pub fn flush(&mut self, now: Instant) -> Range<usize> {
        let start = self.cache.len();
        self.cache.append(&mut self.pending);
        self.last_flush = Some(now);
        self.flush_count += 1;
        start..self.cache.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn cache(&self) -> &[Event] {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut Vec<Event> {
        &mut self.cache
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Flushes performed so far
    pub fn flush_count(&self) -> u64 {
        self.flush_count
    }
}
