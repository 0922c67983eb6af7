// src/utils/time.rs
//! Wall-clock helpers and monotonic file identifiers
//!
//! Chunk ids and snapshot ticks are zero-padded millisecond timestamps so that
//! file names sort lexicographically in creation order.

use std::time::{SystemTime, UNIX_EPOCH};

/// Width of a formatted identifier
pub const ID_WIDTH: usize = 16;

/// Seconds since the Unix epoch as a float
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Milliseconds since the Unix epoch
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Format an identifier as a fixed-width decimal string
pub fn format_id(id: u64) -> String {
    format!("{:0width$}", id, width = ID_WIDTH)
}

/// Generator of strictly increasing millisecond identifiers
///
/// Two ids requested within the same millisecond (or after the clock stepped
/// backwards) still come out ordered.
#[derive(Debug, Clone, Default)]
pub struct MonotonicIds {
    last: u64,
}

impl MonotonicIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next raw identifier
    pub fn next_raw(&mut self) -> u64 {
        let id = unix_millis().max(self.last + 1);
        self.last = id;
        id
    }

    /// Next identifier, formatted for use in a file name
    pub fn next_id(&mut self) -> String {
        format_id(self.next_raw())
    }
}
