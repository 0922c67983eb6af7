// src/recording/recorder.rs
//! Session recorder: the ingestion handle used by the host application
//!
//! All ingestion work happens on the caller's thread inside one short
//! critical section. There is no background scheduler; flushing, chunk
//! compression and snapshot assembly are cadence checks piggybacked on
//! `record`:
//!
//! ```text
//! record(category, payload, priority)
//!   │  lock
//!   ├─ push → EventBuffer.pending, SnapshotAssembler.pending
//!   ├─ interval elapsed | high/critical → flush → cache (+ LogMirror)
//!   │                                       └─ cache ≥ limit → ChunkWriter
//!   └─ snapshot interval elapsed → SnapshotAssembler.assemble
//! ```

use crate::observability::{CACHE_ENTRIES, EVENTS_RECORDED, FLUSHES};
use crate::recording::buffer::EventBuffer;
use crate::recording::chunk::{ChunkHandle, ChunkWriter};
use crate::recording::compressor::{CompressionLevel, Compressor};
use crate::recording::event::{Event, Priority, Value};
use crate::recording::mirror::{LogMirror, DEFAULT_MIRROR_MAX_BYTES, DEFAULT_MIRROR_MAX_FILES};
use crate::recording::session::{
    generate_session_id, Session, SessionManifest, SessionMetadata, SessionState,
};
use crate::recording::snapshot::{Snapshot, SnapshotAssembler};
use crate::storage::layout::{is_chunk_file, LogLayout, SessionPaths};
use crate::utils::errors::{EngineError, Result};
use crate::utils::fs::{atomic_write, count_json_files, sorted_file_names};
use parking_lot::Mutex;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Recorder configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Root of the log tree
    pub log_dir: PathBuf,

    /// Minimum time between buffer flushes (milliseconds)
    pub flush_interval_ms: u64,

    /// Snapshot cadence (milliseconds)
    pub snapshot_interval_ms: u64,

    /// Cache entries that trigger chunk compression
    pub cache_size_limit: usize,

    /// Compression level
    pub compression_level: CompressionLevel,

    /// Rotation threshold of `game_log.log`
    pub mirror_max_bytes: u64,

    /// Rotated mirror files kept
    pub mirror_max_files: usize,

    /// Version string recorded in the manifest
    pub app_version: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            flush_interval_ms: 200,
            snapshot_interval_ms: 1000,
            cache_size_limit: 10_000,
            compression_level: CompressionLevel::Balanced,
            mirror_max_bytes: DEFAULT_MIRROR_MAX_BYTES,
            mirror_max_files: DEFAULT_MIRROR_MAX_FILES,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl RecorderConfig {
    /// Defaults rooted at `log_dir`
    pub fn with_log_dir(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            ..Self::default()
        }
    }
}

/// Recorder statistics
#[derive(Debug, Clone, Default)]
pub struct RecorderStats {
    pub events_recorded: u64,

    /// Events rejected because the session was no longer active
    pub events_dropped: u64,

    pub flushes: u64,

    pub chunks_written: u64,

    pub chunk_failures: u64,

    pub snapshots_written: u64,

    pub duplets_written: u64,
}

/// State guarded by the ingestion lock
struct RecorderInner {
    state: SessionState,
    session: Session,
    buffer: EventBuffer,
    chunks: ChunkWriter,
    assembler: SnapshotAssembler,
    mirror: LogMirror,
    stats: RecorderStats,
}

impl RecorderInner {
    /// Move pending events into the cache and echo them to the mirror
    fn flush_buffer(&mut self, now: Instant) {
        let range = self.buffer.flush(now);
        self.stats.flushes += 1;
        metrics::counter!(FLUSHES).increment(1);

        if !range.is_empty() {
            self.mirror.write_batch(&self.buffer.cache()[range]);
        }
        metrics::gauge!(CACHE_ENTRIES).set(self.buffer.cache_len() as f64);
    }

    fn compress_cache(&mut self) -> Result<Option<ChunkHandle>> {
        match self.chunks.compress(self.buffer.cache_mut()) {
            Ok(handle) => {
                if handle.is_some() {
                    self.stats.chunks_written += 1;
                }
                Ok(handle)
            }
            Err(e) => {
                self.stats.chunk_failures += 1;
                Err(e)
            }
        }
    }

    fn take_snapshot(&mut self, session_id: &str, now: Instant) -> Result<Option<Snapshot>> {
        let Some(assembled) = self.assembler.assemble(session_id, now)? else {
            return Ok(None);
        };

        self.stats.snapshots_written += 1;
        if assembled.duplet.is_some() {
            self.stats.duplets_written += 1;
        }
        Ok(Some(assembled.snapshot))
    }
}

/// Ingestion handle for one session
///
/// Opening a recorder starts a new session on disk; [`finalize`] (or drop)
/// closes it. Share it between threads behind an `Arc`.
///
/// [`finalize`]: SessionRecorder::finalize
pub struct SessionRecorder {
    config: RecorderConfig,
    layout: LogLayout,
    paths: SessionPaths,
    session_id: String,
    inner: Mutex<RecorderInner>,
}

impl SessionRecorder {
    /// Start a new session under `config.log_dir`
    pub fn open(config: RecorderConfig) -> Result<Self> {
        let layout = LogLayout::new(&config.log_dir);
        let session_id = unique_session_id(&layout);
        let paths = layout.session(&session_id);

        paths.create_dirs().map_err(|e| {
            EngineError::StorageFailed(format!("Failed to create session directory: {}", e))
        })?;
        for dir in [layout.legacy_cache_dir(), layout.exports_dir()] {
            fs::create_dir_all(&dir).map_err(|e| {
                EngineError::StorageFailed(format!("Failed to create {:?}: {}", dir, e))
            })?;
        }

        let session = Session::start(&session_id);

        let manifest = SessionManifest::for_session(&session, &config.app_version);
        atomic_write(&paths.manifest, &serde_json::to_vec_pretty(&manifest)?).map_err(|e| {
            EngineError::StorageFailed(format!("Failed to write manifest: {}", e))
        })?;

        let compressor = Compressor::new(config.compression_level);
        let mut mirror = LogMirror::open(
            &paths.log_file,
            config.mirror_max_bytes,
            config.mirror_max_files,
        );
        mirror.write_line("INFO", &format!("Session {} started", session_id));

        let mut inner = RecorderInner {
            state: SessionState::Created,
            session,
            buffer: EventBuffer::new(Duration::from_millis(config.flush_interval_ms)),
            chunks: ChunkWriter::new(&paths.cache, compressor),
            assembler: SnapshotAssembler::new(
                &paths,
                layout.root(),
                Duration::from_millis(config.snapshot_interval_ms),
            ),
            mirror,
            stats: RecorderStats::default(),
        };

        inner.state = SessionState::Active;
        info!("Recorder initialized for session {}", session_id);

        Ok(Self {
            config,
            layout,
            paths,
            session_id,
            inner: Mutex::new(inner),
        })
    }

    /// Record one event
    ///
    /// Never fails from the caller's perspective: persistence errors are
    /// logged and the affected entries stay cached for the next attempt.
    pub fn record(&self, category: &str, payload: Value, priority: Priority) {
        let mut inner = self.inner.lock();

        if !inner.state.accepts_events() {
            inner.stats.events_dropped += 1;
            warn!(
                "Dropping '{}' event: session {} is {}",
                category, self.session_id, inner.state
            );
            return;
        }

        if priority.forces_flush() {
            warn!("{}: {}", category, payload);
        } else {
            debug!("{}: {}", category, payload);
        }

        let event = Event::new(&self.session_id, category, payload, priority);
        inner.assembler.accumulate(event.clone());
        inner.buffer.push(event);
        inner.stats.events_recorded += 1;
        metrics::counter!(EVENTS_RECORDED).increment(1);

        let now = Instant::now();

        if inner.buffer.should_flush(priority, now) {
            inner.flush_buffer(now);

            if inner.buffer.cache_len() >= self.config.cache_size_limit {
                if let Err(e) = inner.compress_cache() {
                    error!("Cache compression failed: {}", e);
                }
            }
        }

        if inner.assembler.is_due(now) {
            if let Err(e) = inner.take_snapshot(&self.session_id, now) {
                error!("Snapshot assembly failed: {}", e);
            }
        }
    }

    /// Assemble a snapshot now, regardless of the interval
    pub fn force_snapshot(&self) -> Result<Option<Snapshot>> {
        let mut inner = self.inner.lock();
        self.ensure_active(inner.state)?;
        inner.take_snapshot(&self.session_id, Instant::now())
    }

    /// Flush pending events and compress the whole cache into a chunk
    pub fn flush(&self) -> Result<Option<ChunkHandle>> {
        let mut inner = self.inner.lock();
        self.ensure_active(inner.state)?;
        inner.flush_buffer(Instant::now());
        inner.compress_cache()
    }

    /// Close the session: final chunk, final snapshot, metadata
    ///
    /// Runs exactly once; later calls return `InvalidState`.
    pub fn finalize(&self) -> Result<SessionMetadata> {
        let mut inner = self.inner.lock();
        self.ensure_active(inner.state)?;
        inner.state = SessionState::Finalizing;

        let now = Instant::now();
        inner.flush_buffer(now);
        if let Err(e) = inner.compress_cache() {
            error!(
                "Final chunk of session {} could not be written: {}",
                self.session_id, e
            );
        }
        if let Err(e) = inner.take_snapshot(&self.session_id, now) {
            error!("Final snapshot of session {} failed: {}", self.session_id, e);
        }

        inner.session.close();
        let metadata = SessionMetadata {
            session_id: self.session_id.clone(),
            start_time: inner.session.start_time,
            end_time: inner.session.end_time.unwrap_or(inner.session.start_time),
            duration: inner.session.duration.unwrap_or(0.0),
            log_file: Some(self.paths.log_file.clone()),
            snapshot_count: count_json_files(&self.paths.snapshots),
            duplet_count: count_json_files(&self.paths.duplets),
            chunk_count: sorted_file_names(&self.paths.cache, is_chunk_file)
                .map(|names| names.len())
                .unwrap_or(0),
            events_recorded: inner.stats.events_recorded,
        };

        inner
            .mirror
            .write_line("INFO", &format!("Session {} finalized", self.session_id));
        inner.state = SessionState::Closed;

        let bytes = serde_json::to_vec_pretty(&metadata)?;
        atomic_write(&self.paths.metadata, &bytes).map_err(|e| {
            EngineError::StorageFailed(format!("Failed to write session metadata: {}", e))
        })?;
        if let Err(e) = atomic_write(&self.paths.legacy_metadata, &bytes) {
            warn!("Failed to mirror session metadata: {}", e);
        }

        info!(
            "Session {} finalized ({} events, {} snapshots, {} chunks)",
            self.session_id, metadata.events_recorded, metadata.snapshot_count, metadata.chunk_count
        );
        Ok(metadata)
    }

    pub fn current_session_id(&self) -> &str {
        &self.session_id
    }

    pub fn session(&self) -> Session {
        self.inner.lock().session.clone()
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn stats(&self) -> RecorderStats {
        self.inner.lock().stats.clone()
    }

    /// Entries flushed but not yet compressed
    pub fn cached_entries(&self) -> usize {
        self.inner.lock().buffer.cache_len()
    }

    pub fn layout(&self) -> &LogLayout {
        &self.layout
    }

    pub fn paths(&self) -> &SessionPaths {
        &self.paths
    }

    fn ensure_active(&self, state: SessionState) -> Result<()> {
        if state.accepts_events() {
            Ok(())
        } else {
            Err(EngineError::InvalidState(format!(
                "session {} is {}",
                self.session_id, state
            )))
        }
    }
}

impl Drop for SessionRecorder {
    fn drop(&mut self) {
        if self.inner.get_mut().state == SessionState::Active {
            if let Err(e) = self.finalize() {
                error!("Finalize on drop failed for {}: {}", self.session_id, e);
            }
        }
    }
}

/// Session id that does not collide with an existing directory
fn unique_session_id(layout: &LogLayout) -> String {
    let base = generate_session_id();
    let sessions = layout.sessions_dir();
    let mut candidate = base.clone();
    let mut suffix = 1;
    while sessions.join(&candidate).exists() {
        candidate = format!("{}_{}", base, suffix);
        suffix += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::compressor::Compressor;
    use serde_json::json;
    use tempfile::tempdir;

    fn config(root: &std::path::Path) -> RecorderConfig {
        RecorderConfig {
            snapshot_interval_ms: 3_600_000,
            ..RecorderConfig::with_log_dir(root)
        }
    }

    #[test]
    fn test_open_writes_manifest() {
        let dir = tempdir().unwrap();
        let recorder = SessionRecorder::open(config(dir.path())).unwrap();

        assert_eq!(recorder.state(), SessionState::Active);
        assert!(recorder.current_session_id().starts_with("session_"));
        assert!(recorder.paths().manifest.exists());
        assert!(recorder.layout().exports_dir().is_dir());

        let manifest: SessionManifest =
            serde_json::from_slice(&fs::read(&recorder.paths().manifest).unwrap()).unwrap();
        assert_eq!(manifest.session_id, recorder.current_session_id());
        assert_eq!(manifest.platform, std::env::consts::OS);
    }

    #[test]
    fn test_two_sessions_get_distinct_ids() {
        let dir = tempdir().unwrap();
        let first = SessionRecorder::open(config(dir.path())).unwrap();
        let second = SessionRecorder::open(config(dir.path())).unwrap();

        assert_ne!(first.current_session_id(), second.current_session_id());
    }

    #[test]
    fn test_critical_events_each_flush() {
        let dir = tempdir().unwrap();
        let recorder = SessionRecorder::open(config(dir.path())).unwrap();

        for i in 0..25 {
            recorder.record("combat", json!({ "hit": i }), Priority::Critical);
        }

        let stats = recorder.stats();
        assert_eq!(stats.events_recorded, 25);
        assert!(stats.flushes >= 25);
        assert_eq!(recorder.cached_entries(), 25);
    }

    #[test]
    fn test_normal_events_wait_for_interval() {
        let dir = tempdir().unwrap();
        let recorder = SessionRecorder::open(RecorderConfig {
            flush_interval_ms: 3_600_000,
            ..config(dir.path())
        })
        .unwrap();

        // First record flushes, the rest stay pending
        for i in 0..10 {
            recorder.record("player", json!({ "x": i }), Priority::Normal);
        }

        assert_eq!(recorder.stats().flushes, 1);
        assert_eq!(recorder.cached_entries(), 1);
    }

    #[test]
    fn test_explicit_flush_writes_partial_cache() {
        let dir = tempdir().unwrap();
        let recorder = SessionRecorder::open(RecorderConfig {
            flush_interval_ms: 3_600_000,
            ..config(dir.path())
        })
        .unwrap();

        for i in 0..4 {
            recorder.record("player", json!({ "x": i }), Priority::Normal);
        }
        assert_eq!(recorder.cached_entries(), 1);

        let handle = recorder.flush().unwrap().unwrap();
        assert_eq!(handle.summary.entry_count, 4);
        assert_eq!(recorder.cached_entries(), 0);
        assert_eq!(recorder.stats().chunks_written, 1);

        let chunks = sorted_file_names(&recorder.paths().cache, is_chunk_file).unwrap();
        assert_eq!(chunks.len(), 1);
        let blob = fs::read(recorder.paths().cache.join(&chunks[0])).unwrap();
        let xs: Vec<i64> = Compressor::default()
            .decode_events(&blob)
            .unwrap()
            .iter()
            .map(|e| e.payload["x"].as_i64().unwrap())
            .collect();
        assert_eq!(xs, vec![0, 1, 2, 3]);

        // Nothing left to write
        assert!(recorder.flush().unwrap().is_none());

        recorder.finalize().unwrap();
        assert!(matches!(
            recorder.flush(),
            Err(EngineError::InvalidState(_))
        ));
    }

    #[test]
    fn test_cache_limit_triggers_chunk() {
        let dir = tempdir().unwrap();
        let recorder = SessionRecorder::open(RecorderConfig {
            cache_size_limit: 5,
            ..config(dir.path())
        })
        .unwrap();

        for i in 0..12 {
            recorder.record("player", json!({ "x": i }), Priority::High);
        }

        let stats = recorder.stats();
        assert_eq!(stats.chunks_written, 2);
        assert_eq!(recorder.cached_entries(), 2);

        let chunks = sorted_file_names(&recorder.paths().cache, is_chunk_file).unwrap();
        assert_eq!(chunks.len(), 2);

        let blob = fs::read(recorder.paths().cache.join(&chunks[0])).unwrap();
        let events = Compressor::default().decode_events(&blob).unwrap();
        let xs: Vec<i64> = events
            .iter()
            .map(|e| e.payload["x"].as_i64().unwrap())
            .collect();
        assert_eq!(xs, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_snapshot_on_interval() {
        let dir = tempdir().unwrap();
        let recorder = SessionRecorder::open(RecorderConfig {
            snapshot_interval_ms: 1,
            ..RecorderConfig::with_log_dir(dir.path())
        })
        .unwrap();

        std::thread::sleep(Duration::from_millis(5));
        recorder.record("player", json!({ "health": 100 }), Priority::Normal);

        assert_eq!(recorder.stats().snapshots_written, 1);
        assert_eq!(count_json_files(&recorder.paths().snapshots), 1);
    }

    #[test]
    fn test_force_snapshot_and_empty_tick() {
        let dir = tempdir().unwrap();
        let recorder = SessionRecorder::open(config(dir.path())).unwrap();

        assert!(recorder.force_snapshot().unwrap().is_none());

        recorder.record("player", json!({ "health": 100 }), Priority::Normal);
        let snapshot = recorder.force_snapshot().unwrap().unwrap();
        assert_eq!(snapshot.session_id, recorder.current_session_id());
        assert_eq!(snapshot.event_count(), 1);

        assert!(recorder.force_snapshot().unwrap().is_none());
        assert_eq!(count_json_files(&recorder.paths().snapshots), 1);
    }

    #[test]
    fn test_finalize_runs_once() {
        let dir = tempdir().unwrap();
        let recorder = SessionRecorder::open(config(dir.path())).unwrap();

        recorder.record("player", json!({ "health": 100 }), Priority::Normal);
        recorder.record("player", json!({ "health": 90 }), Priority::Normal);

        let metadata = recorder.finalize().unwrap();
        assert_eq!(metadata.events_recorded, 2);
        assert_eq!(metadata.chunk_count, 1);
        assert_eq!(metadata.snapshot_count, 1);
        assert!(metadata.duration >= 0.0);
        assert!(recorder.paths().metadata.exists());
        assert!(recorder.paths().legacy_metadata.exists());
        assert_eq!(recorder.state(), SessionState::Closed);

        assert!(matches!(
            recorder.finalize(),
            Err(EngineError::InvalidState(_))
        ));

        recorder.record("player", json!({ "health": 80 }), Priority::Critical);
        assert_eq!(recorder.stats().events_dropped, 1);
        assert_eq!(recorder.stats().events_recorded, 2);
    }

    #[test]
    fn test_drop_finalizes() {
        let dir = tempdir().unwrap();
        let metadata_path = {
            let recorder = SessionRecorder::open(config(dir.path())).unwrap();
            recorder.record("player", json!({ "health": 1 }), Priority::Low);
            recorder.paths().metadata.clone()
        };

        assert!(metadata_path.exists());
    }

    #[test]
    fn test_mirror_receives_flushed_events() {
        let dir = tempdir().unwrap();
        let recorder = SessionRecorder::open(config(dir.path())).unwrap();
        recorder.record("enemy", json!({ "count": 3 }), Priority::High);

        let content = fs::read_to_string(&recorder.paths().log_file).unwrap();
        assert!(content.contains("[enemy] {\"count\":3}"));
    }
}
