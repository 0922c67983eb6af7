// src/recording/snapshot.rs
//! Snapshot assembler
//!
//! Once per interval the events accumulated since the previous tick are
//! grouped by category into a [`Snapshot`] and written twice with identical
//! bytes:
//!
//! ```text
//! sessions/<id>/snapshots/snapshot_<tick>.json   (primary)
//! <root>/snapshot_<tick>.json                    (legacy flat mirror)
//! ```
//!
//! If the session already has a chunk, a [`Duplet`] pointing at the newest
//! chunk is written to `duplets/duplet_<tick>.json`.

use crate::observability::SNAPSHOTS_WRITTEN;
use crate::recording::chunk::latest_chunk_file;
use crate::recording::event::{Event, Value};
use crate::storage::layout::{snapshot_file_name, SessionPaths};
use crate::utils::errors::{EngineError, Result};
use crate::utils::fs::atomic_write;
use crate::utils::time::{unix_now, MonotonicIds};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Categorized aggregation of the events of one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Wall-clock creation time (seconds since epoch)
    pub timestamp: f64,

    /// Tick id, also used in the file name
    pub snapshot_time: String,

    pub session_id: String,

    /// Events of the tick grouped by category, in arrival order
    #[serde(rename = "snapshot_data", alias = "categorized_data")]
    pub categorized_data: BTreeMap<String, Vec<Event>>,
}

impl Snapshot {
    pub fn event_count(&self) -> usize {
        self.categorized_data.values().map(Vec::len).sum()
    }

    pub fn categories(&self) -> BTreeSet<String> {
        self.categorized_data.keys().cloned().collect()
    }

    /// Last event recorded for `category` during this tick
    pub fn latest(&self, category: &str) -> Option<&Event> {
        self.categorized_data.get(category)?.last()
    }

    /// Flattened state view used for pattern analysis
    ///
    /// `{"_timestamp": <timestamp>, "<category>": <payload of its last event>}`
    pub fn state(&self) -> Value {
        let mut state = serde_json::Map::new();
        state.insert("_timestamp".to_string(), Value::from(self.timestamp));
        for (category, events) in &self.categorized_data {
            if let Some(last) = events.last() {
                state.insert(category.clone(), last.payload.clone());
            }
        }
        Value::Object(state)
    }
}

/// Advisory pairing of a snapshot with the newest chunk at assembly time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Duplet {
    pub snapshot_file: PathBuf,

    pub log_chunk: PathBuf,

    pub timestamp: f64,

    pub snapshot_time: String,

    pub session_id: String,

    pub categories: BTreeSet<String>,
}

/// Result of a successful assembly
#[derive(Debug, Clone)]
pub struct AssembledSnapshot {
    pub snapshot: Snapshot,

    /// Primary location
    pub path: PathBuf,

    /// `None` when no chunk existed yet or the duplet could not be written
    pub duplet: Option<Duplet>,
}

/// Accumulates events between ticks and writes snapshots
#[derive(Debug)]
pub struct SnapshotAssembler {
    paths: SessionPaths,
    legacy_dir: PathBuf,

    pending: Vec<Event>,
    ticks: MonotonicIds,
    last_tick: Instant,
    interval: Duration,
}

impl SnapshotAssembler {
    /// `legacy_dir` receives the flat mirror copy of every snapshot
    pub fn new(paths: &SessionPaths, legacy_dir: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            paths: paths.clone(),
            legacy_dir: legacy_dir.into(),
            pending: Vec::new(),
            ticks: MonotonicIds::new(),
            last_tick: Instant::now(),
            interval,
        }
    }

    pub fn accumulate(&mut self, event: Event) {
        self.pending.push(event);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether a full interval elapsed since the previous tick
    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_tick) >= self.interval
    }

    /// Assemble and persist a snapshot from the pending events
    ///
    /// An empty accumulator only advances the tick and writes nothing. If the
    /// primary write fails the pending events are kept for the next tick.
    pub fn assemble(&mut self, session_id: &str, now: Instant) -> Result<Option<AssembledSnapshot>> {
        self.last_tick = now;

        if self.pending.is_empty() {
            return Ok(None);
        }

        let tick = self.ticks.next_id();

        let mut categorized_data: BTreeMap<String, Vec<Event>> = BTreeMap::new();
        for event in &self.pending {
            categorized_data
                .entry(event.category.clone())
                .or_default()
                .push(event.clone());
        }

        let snapshot = Snapshot {
            timestamp: unix_now(),
            snapshot_time: tick.clone(),
            session_id: session_id.to_string(),
            categorized_data,
        };

        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        let file_name = snapshot_file_name(&tick);
        let path = self.paths.snapshot_path(&tick);

        atomic_write(&path, &bytes).map_err(|e| {
            EngineError::StorageFailed(format!("Failed to write snapshot {:?}: {}", path, e))
        })?;

        let legacy_path = self.legacy_dir.join(&file_name);
        if let Err(e) = atomic_write(&legacy_path, &bytes) {
            warn!("Failed to mirror snapshot to {:?}: {}", legacy_path, e);
        }

        self.pending.clear();
        metrics::counter!(SNAPSHOTS_WRITTEN).increment(1);
        debug!(
            "Created snapshot {} ({} events)",
            tick,
            snapshot.event_count()
        );

        let duplet = self.write_duplet(&snapshot, &path);

        Ok(Some(AssembledSnapshot {
            snapshot,
            path,
            duplet,
        }))
    }

    fn write_duplet(&self, snapshot: &Snapshot, snapshot_path: &Path) -> Option<Duplet> {
        let log_chunk = latest_chunk_file(&self.paths.cache)?;

        let duplet = Duplet {
            snapshot_file: snapshot_path.to_path_buf(),
            log_chunk,
            timestamp: unix_now(),
            snapshot_time: snapshot.snapshot_time.clone(),
            session_id: snapshot.session_id.clone(),
            categories: snapshot.categories(),
        };

        let path = self.paths.duplet_path(&snapshot.snapshot_time);

        let written = serde_json::to_vec_pretty(&duplet)
            .map_err(|e| e.to_string())
            .and_then(|bytes| atomic_write(&path, &bytes).map_err(|e| e.to_string()));

        match written {
            Ok(()) => {
                debug!("Created snapshot-chunk duplet {:?}", path);
                Some(duplet)
            }
            Err(e) => {
                warn!("Failed to write duplet {:?}: {}", path, e);
                None
            }
        }
    }
}
