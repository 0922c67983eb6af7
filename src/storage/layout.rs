// src/storage/layout.rs
//! On-disk layout of the log root
//!
//! ```text
//! <root>/
//!   sessions/<session_id>/
//!     manifest.json
//!     metadata.json
//!     game_log.log
//!     snapshots/snapshot_<tick>.json
//!     cache/chunk_<id>.zst
//!     cache/chunk_<id>_summary.json
//!     duplets/duplet_<tick>.json
//!   exports/
//!   cache/<session_id>_metadata.json      (legacy)
//!   cache/<session_id>_chunk_<id>.zst     (legacy)
//!   snapshot_<tick>.json                  (legacy flat mirror)
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const SNAPSHOT_PREFIX: &str = "snapshot_";
pub const CHUNK_PREFIX: &str = "chunk_";
pub const DUPLET_PREFIX: &str = "duplet_";
pub const CHUNK_EXTENSION: &str = "zst";
pub const SUMMARY_SUFFIX: &str = "_summary.json";

/// Root of all persisted logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLayout {
    root: PathBuf,
}

impl LogLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.root.join("exports")
    }

    /// Flat `logs/cache/` directory kept for older readers
    pub fn legacy_cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    /// Flat mirror location of a snapshot file
    pub fn legacy_snapshot_path(&self, tick: &str) -> PathBuf {
        self.root.join(snapshot_file_name(tick))
    }

    pub fn legacy_metadata_path(&self, session_id: &str) -> PathBuf {
        self.legacy_cache_dir()
            .join(format!("{}_metadata.json", session_id))
    }

    /// Paths belonging to one session
    pub fn session(&self, session_id: &str) -> SessionPaths {
        let dir = self.sessions_dir().join(session_id);
        SessionPaths {
            snapshots: dir.join("snapshots"),
            cache: dir.join("cache"),
            duplets: dir.join("duplets"),
            manifest: dir.join("manifest.json"),
            metadata: dir.join("metadata.json"),
            log_file: dir.join("game_log.log"),
            legacy_metadata: self.legacy_metadata_path(session_id),
            dir,
        }
    }
}

impl Default for LogLayout {
    fn default() -> Self {
        Self::new("logs")
    }
}

/// Resolved paths of one session subtree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    pub dir: PathBuf,
    pub snapshots: PathBuf,
    pub cache: PathBuf,
    pub duplets: PathBuf,
    pub manifest: PathBuf,
    pub metadata: PathBuf,
    pub log_file: PathBuf,
    pub legacy_metadata: PathBuf,
}

impl SessionPaths {
    /// Create the session directory tree
    pub fn create_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(&self.snapshots)?;
        fs::create_dir_all(&self.cache)?;
        fs::create_dir_all(&self.duplets)?;
        Ok(())
    }

    pub fn snapshot_path(&self, tick: &str) -> PathBuf {
        self.snapshots.join(snapshot_file_name(tick))
    }

    pub fn duplet_path(&self, tick: &str) -> PathBuf {
        self.duplets.join(format!("{}{}.json", DUPLET_PREFIX, tick))
    }
}

pub fn snapshot_file_name(tick: &str) -> String {
    format!("{}{}.json", SNAPSHOT_PREFIX, tick)
}

pub fn chunk_file_name(chunk_id: &str) -> String {
    format!("{}{}.{}", CHUNK_PREFIX, chunk_id, CHUNK_EXTENSION)
}

pub fn summary_file_name(chunk_id: &str) -> String {
    format!("{}{}{}", CHUNK_PREFIX, chunk_id, SUMMARY_SUFFIX)
}

/// `chunk_<id>.zst` → `<id>`
pub fn chunk_id_from_name(name: &str) -> Option<&str> {
    name.strip_prefix(CHUNK_PREFIX)?
        .strip_suffix(CHUNK_EXTENSION)?
        .strip_suffix('.')
}

/// `snapshot_<tick>.json` → `<tick>`
pub fn tick_from_snapshot_name(name: &str) -> Option<&str> {
    name.strip_prefix(SNAPSHOT_PREFIX)?.strip_suffix(".json")
}

/// Whether `name` is a duplet document
pub fn is_duplet_file(name: &str) -> bool {
    name.strip_prefix(DUPLET_PREFIX)
        .and_then(|rest| rest.strip_suffix(".json"))
        .is_some_and(|tick| !tick.is_empty())
}

/// Whether `name` is a chunk blob (not a summary or temp file)
pub fn is_chunk_file(name: &str) -> bool {
    chunk_id_from_name(name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_paths() {
        let layout = LogLayout::new("/data/logs");
        let paths = layout.session("session_20240101_120000_42");

        assert_eq!(
            paths.dir,
            PathBuf::from("/data/logs/sessions/session_20240101_120000_42")
        );
        assert_eq!(
            paths.snapshot_path("0000000000000001"),
            paths.dir.join("snapshots/snapshot_0000000000000001.json")
        );
        assert_eq!(
            paths.duplet_path("0000000000000001"),
            paths.dir.join("duplets/duplet_0000000000000001.json")
        );
        assert_eq!(
            paths.legacy_metadata,
            PathBuf::from("/data/logs/cache/session_20240101_120000_42_metadata.json")
        );
    }

    #[test]
    fn test_file_name_parsing() {
        assert_eq!(chunk_file_name("0001"), "chunk_0001.zst");
        assert_eq!(summary_file_name("0001"), "chunk_0001_summary.json");
        assert_eq!(chunk_id_from_name("chunk_0001.zst"), Some("0001"));
        assert!(!is_chunk_file("chunk_0001_summary.json"));
        assert!(!is_chunk_file("chunk_0001.zst.tmp"));
        assert_eq!(tick_from_snapshot_name("snapshot_0042.json"), Some("0042"));
        assert_eq!(tick_from_snapshot_name("duplet_0042.json"), None);
        assert!(is_duplet_file("duplet_0042.json"));
        assert!(!is_duplet_file("duplet_0042.json.tmp"));
        assert!(!is_duplet_file("snapshot_0042.json"));
    }

    #[test]
    fn test_create_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let paths = LogLayout::new(dir.path()).session("s");
        paths.create_dirs().unwrap();

        assert!(paths.snapshots.is_dir());
        assert!(paths.cache.is_dir());
        assert!(paths.duplets.is_dir());
    }
}
