// src/storage/loader.rs
//! Read path: sessions, chunks, snapshots and duplets
//!
//! Every file boundary returns `Result<_, LoadError>`. Batch loaders never
//! abort on a bad file: the failure is logged, counted and reported in
//! [`LoadReport::skipped`], and loading continues. Only a session that does
//! not exist at all surfaces as [`EngineError::SessionNotFound`].
//!
//! Artifacts are only ever read after their atomic rename, so loading a
//! session that is still being recorded is safe.

use crate::observability::ARTIFACTS_SKIPPED;
use crate::recording::chunk::ChunkSummary;
use crate::recording::compressor::Compressor;
use crate::recording::event::{Event, Value};
use crate::recording::session::SessionState;
use crate::recording::snapshot::{Duplet, Snapshot};
use crate::storage::layout::{
    is_chunk_file, is_duplet_file, tick_from_snapshot_name, LogLayout, SNAPSHOT_PREFIX,
    SUMMARY_SUFFIX,
};
use crate::utils::errors::{EngineError, LoadError, Result};
use crate::utils::fs::{count_json_files, read_json, sorted_file_names};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Files smaller than this cannot hold a valid chunk
pub const MIN_CHUNK_BYTES: u64 = 10;

/// A file that was skipped while loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Items loaded from a set of files plus the files that were skipped
#[derive(Debug, Clone)]
pub struct LoadReport<T> {
    pub items: Vec<T>,
    pub skipped: Vec<SkippedFile>,
}

impl<T> LoadReport<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Record a skipped file
    pub fn skip(&mut self, err: LoadError) {
        warn!("Skipping {}", err);
        metrics::counter!(ARTIFACTS_SKIPPED).increment(1);
        self.skipped.push(SkippedFile {
            path: err.path().to_path_buf(),
            reason: err.to_string(),
        });
    }

    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<T> Default for LoadReport<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One entry of the session listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,

    pub start_time: f64,

    pub end_time: Option<f64>,

    pub duration: Option<f64>,

    /// `Closed` once metadata exists, otherwise `Active` (includes crashed sessions)
    pub state: SessionState,

    pub snapshot_count: usize,

    pub platform: Option<String>,
}

/// Loose view over `metadata.json` / `manifest.json` of any vintage
#[derive(Debug, Deserialize)]
struct SessionRecord {
    session_id: Option<String>,
    start_time: Option<f64>,
    end_time: Option<f64>,
    duration: Option<f64>,
    snapshot_count: Option<usize>,
    platform: Option<String>,
}

/// Read-only access to the log tree
#[derive(Debug, Clone)]
pub struct SessionStore {
    layout: LogLayout,
    compressor: Compressor,
}

impl SessionStore {
    pub fn new(layout: LogLayout) -> Self {
        Self {
            layout,
            compressor: Compressor::default(),
        }
    }

    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self::new(LogLayout::new(root))
    }

    pub fn layout(&self) -> &LogLayout {
        &self.layout
    }

    /// All known sessions, oldest first
    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let mut sessions = Vec::new();
        let mut seen = HashSet::new();

        for session_id in self.session_dirs()? {
            let paths = self.layout.session(&session_id);

            let (record, state) = if paths.metadata.exists() {
                (read_json::<SessionRecord>(&paths.metadata), SessionState::Closed)
            } else if paths.manifest.exists() {
                (read_json::<SessionRecord>(&paths.manifest), SessionState::Active)
            } else {
                debug!("Ignoring {:?}: no metadata or manifest", paths.dir);
                continue;
            };

            match record {
                Ok(record) => {
                    let snapshot_count = record
                        .snapshot_count
                        .unwrap_or_else(|| count_json_files(&paths.snapshots));
                    let summary = summarize(record, &session_id, state, snapshot_count);
                    seen.insert(summary.session_id.clone());
                    sessions.push(summary);
                }
                Err(e) => warn!("Unreadable session descriptor: {}", e),
            }
        }

        let legacy_dir = self.layout.legacy_cache_dir();
        let legacy = sorted_file_names(&legacy_dir, |name| name.ends_with("_metadata.json"))
            .map_err(|e| EngineError::StorageFailed(format!("Failed to list {:?}: {}", legacy_dir, e)))?;

        for name in legacy {
            let session_id = name.trim_end_matches("_metadata.json").to_string();
            if seen.contains(&session_id) {
                continue;
            }
            match read_json::<SessionRecord>(&legacy_dir.join(&name)) {
                Ok(record) => {
                    let count = record.snapshot_count.unwrap_or(0);
                    let summary = summarize(record, &session_id, SessionState::Closed, count);
                    seen.insert(summary.session_id.clone());
                    sessions.push(summary);
                }
                Err(e) => warn!("Unreadable legacy metadata: {}", e),
            }
        }

        sessions.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        Ok(sessions)
    }

    /// The newest `k` sessions, oldest first
    pub fn list_recent_sessions(&self, k: usize) -> Result<Vec<SessionSummary>> {
        let mut sessions = self.list_sessions()?;
        let skip = sessions.len().saturating_sub(k);
        Ok(sessions.split_off(skip))
    }

    /// Whether any artifact of the session exists
    pub fn session_exists(&self, session_id: &str) -> bool {
        if session_id.is_empty() || session_id.contains(['/', '\\']) || session_id == ".." {
            return false;
        }
        if self.layout.session(session_id).dir.is_dir()
            || self.layout.legacy_metadata_path(session_id).exists()
        {
            return true;
        }
        !self.legacy_chunk_names(session_id).is_empty()
    }

    /// All events of a session in chunk order
    ///
    /// Falls back to legacy `<root>/cache/<id>_chunk_*` files when the session
    /// has no chunks of its own.
    pub fn load_session_events(&self, session_id: &str) -> Result<LoadReport<Event>> {
        self.ensure_exists(session_id)?;

        let mut report = LoadReport::new();
        let cache_dir = self.layout.session(session_id).cache;
        let names = sorted_file_names(&cache_dir, is_chunk_file).unwrap_or_default();

        for name in &names {
            self.extend_from_chunk(&cache_dir.join(name), &mut report);
        }

        if report.items.is_empty() {
            let legacy_dir = self.layout.legacy_cache_dir();
            for name in self.legacy_chunk_names(session_id) {
                self.extend_from_chunk(&legacy_dir.join(name), &mut report);
            }
        }

        debug!(
            "Loaded {} events for {} ({} skipped)",
            report.items.len(),
            session_id,
            report.skipped.len()
        );
        Ok(report)
    }

    /// Decode a single chunk file
    pub fn read_chunk(&self, path: &Path) -> std::result::Result<Vec<Event>, LoadError> {
        let size = fs::metadata(path)
            .map_err(|e| LoadError::io(path, e))?
            .len();
        if size < MIN_CHUNK_BYTES {
            return Err(LoadError::Truncated {
                path: path.to_path_buf(),
                size,
            });
        }

        let blob = fs::read(path).map_err(|e| LoadError::io(path, e))?;
        let json = self
            .compressor
            .decompress(&blob)
            .map_err(|e| LoadError::Decompress {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let value: Value = serde_json::from_slice(&json).map_err(|e| LoadError::decode(path, e))?;
        if !value.is_array() {
            return Err(LoadError::UnexpectedShape {
                path: path.to_path_buf(),
                reason: "expected a sequence of events".to_string(),
            });
        }
        serde_json::from_value(value).map_err(|e| LoadError::decode(path, e))
    }

    /// All snapshots of a session, in tick order
    ///
    /// Sessions without a `snapshots/` directory fall back to the flat legacy
    /// mirror filtered by `session_id`.
    pub fn load_snapshots(&self, session_id: &str) -> Result<LoadReport<Snapshot>> {
        self.ensure_exists(session_id)?;

        let snapshots_dir = self.layout.session(session_id).snapshots;
        if snapshots_dir.is_dir() {
            return Ok(load_json_dir(&snapshots_dir, is_snapshot_file));
        }

        let mut report = load_json_dir::<Snapshot>(self.layout.root(), is_snapshot_file);
        report.items.retain(|s| s.session_id == session_id);
        Ok(report)
    }

    /// One snapshot by tick id
    pub fn load_snapshot(&self, session_id: &str, tick: &str) -> Result<Snapshot> {
        self.ensure_exists(session_id)?;

        let path = self.layout.session(session_id).snapshot_path(tick);
        let path = if path.exists() {
            path
        } else {
            self.layout.legacy_snapshot_path(tick)
        };
        if !path.exists() {
            return Err(EngineError::EntityNotFound(format!(
                "snapshot {} of {}",
                tick, session_id
            )));
        }
        Ok(read_json(&path)?)
    }

    /// Tick ids of a session's snapshots, in order
    pub fn snapshot_ticks(&self, session_id: &str) -> Result<Vec<String>> {
        self.ensure_exists(session_id)?;
        let dir = self.layout.session(session_id).snapshots;
        let names = sorted_file_names(&dir, is_snapshot_file)
            .map_err(|e| EngineError::StorageFailed(format!("Failed to list {:?}: {}", dir, e)))?;
        Ok(names
            .iter()
            .filter_map(|n| tick_from_snapshot_name(n).map(str::to_string))
            .collect())
    }

    /// All duplets of a session (empty for sessions that predate them)
    pub fn load_duplets(&self, session_id: &str) -> Result<LoadReport<Duplet>> {
        self.ensure_exists(session_id)?;
        let dir = self.layout.session(session_id).duplets;
        Ok(load_json_dir(&dir, is_duplet_file))
    }

    /// Per-chunk summaries, without decompressing any blob
    pub fn load_chunk_summaries(&self, session_id: &str) -> Result<LoadReport<ChunkSummary>> {
        self.ensure_exists(session_id)?;
        let dir = self.layout.session(session_id).cache;
        Ok(load_json_dir(&dir, |name| name.ends_with(SUMMARY_SUFFIX)))
    }

    /// Parse an export file under `<root>/exports/`
    pub fn load_export(&self, file_name: &str) -> Result<Value> {
        if file_name.contains(['/', '\\']) || file_name.starts_with("..") {
            return Err(EngineError::EntityNotFound(format!("export {}", file_name)));
        }
        let path = self.layout.exports_dir().join(file_name);
        if !path.exists() {
            return Err(EngineError::EntityNotFound(format!("export {}", file_name)));
        }
        Ok(read_json(&path)?)
    }

    fn ensure_exists(&self, session_id: &str) -> Result<()> {
        if self.session_exists(session_id) {
            Ok(())
        } else {
            Err(EngineError::SessionNotFound {
                session_id: session_id.to_string(),
            })
        }
    }

    fn session_dirs(&self) -> Result<Vec<String>> {
        let dir = self.layout.sessions_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(EngineError::StorageFailed(format!(
                    "Failed to list {:?}: {}",
                    dir, e
                )))
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }

    fn legacy_chunk_names(&self, session_id: &str) -> Vec<String> {
        let prefix = format!("{}_", session_id);
        sorted_file_names(&self.layout.legacy_cache_dir(), |name| {
            name.strip_prefix(&prefix).map(is_chunk_file).unwrap_or(false)
        })
        .unwrap_or_default()
    }

    fn extend_from_chunk(&self, path: &Path, report: &mut LoadReport<Event>) {
        match self.read_chunk(path) {
            Ok(events) => {
                debug!("Loaded {} entries from {:?}", events.len(), path);
                report.items.extend(events);
            }
            Err(e) => report.skip(e),
        }
    }
}

fn is_snapshot_file(name: &str) -> bool {
    name.starts_with(SNAPSHOT_PREFIX) && name.ends_with(".json")
}

fn load_json_dir<T>(dir: &Path, filter: impl Fn(&str) -> bool) -> LoadReport<T>
where
    T: serde::de::DeserializeOwned,
{
    let mut report = LoadReport::new();
    let names = match sorted_file_names(dir, filter) {
        Ok(names) => names,
        Err(e) => {
            report.skip(LoadError::io(dir, e));
            return report;
        }
    };

    for name in names {
        match read_json(&dir.join(&name)) {
            Ok(item) => report.items.push(item),
            Err(e) => report.skip(e),
        }
    }
    report
}

fn summarize(
    record: SessionRecord,
    fallback_id: &str,
    state: SessionState,
    snapshot_count: usize,
) -> SessionSummary {
    SessionSummary {
        session_id: record.session_id.unwrap_or_else(|| fallback_id.to_string()),
        start_time: record.start_time.unwrap_or(0.0),
        end_time: record.end_time,
        duration: record.duration,
        state,
        snapshot_count,
        platform: record.platform,
    }
}
