// src/recording/mirror.rs
//! Best-effort human-readable mirror of flushed events
//!
//! Every flush is echoed to `game_log.log` in the session directory, grouped
//! by category. Rotation by size is handled by `file-rotate`:
//!
//! ```text
//! game_log.log → game_log.log.1 → game_log.log.2 → ... → (dropped)
//! ```
//!
//! Nothing here can fail the caller. I/O errors are logged once and the
//! mirror disables itself.

use crate::recording::event::Event;
use chrono::Local;
use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default rotation threshold (100 MiB)
pub const DEFAULT_MIRROR_MAX_BYTES: u64 = 100 * 1024 * 1024;

/// Default number of rotated files kept
pub const DEFAULT_MIRROR_MAX_FILES: usize = 5;

/// Size-rotated text log for one session
pub struct LogMirror {
    path: PathBuf,

    /// `None` once the mirror is disabled
    writer: Option<FileRotate<AppendCount>>,
}

impl std::fmt::Debug for LogMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogMirror")
            .field("path", &self.path)
            .field("enabled", &self.writer.is_some())
            .finish()
    }
}

impl LogMirror {
    /// Open (append) the mirror file; never fails
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, max_files: usize) -> Self {
        let path = path.into();

        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Log mirror unavailable at {:?}: {}", path, e);
            return Self { path, writer: None };
        }

        let limit = usize::try_from(max_bytes).unwrap_or(usize::MAX).max(1);
        let writer = FileRotate::new(
            &path,
            AppendCount::new(max_files.max(1)),
            ContentLimit::BytesSurpassed(limit),
            Compression::None,
            #[cfg(unix)]
            None,
        );

        Self {
            path,
            writer: Some(writer),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    /// Write one flushed batch, grouped by category in first-seen order
    pub fn write_batch(&mut self, events: &[Event]) {
        let mut groups: Vec<(&str, Vec<&Event>)> = Vec::new();
        for event in events {
            match groups.iter_mut().find(|(cat, _)| *cat == event.category) {
                Some((_, list)) => list.push(event),
                None => groups.push((event.category.as_str(), vec![event])),
            }
        }

        for (category, entries) in groups {
            match entries.as_slice() {
                [single] => {
                    self.write_line("DEBUG", &format!("[{}] {}", category, single.payload));
                }
                [first, .., last] => {
                    self.write_line(
                        "DEBUG",
                        &format!(
                            "[{}] Bulk log: {} entries from {} to {}",
                            category,
                            entries.len(),
                            first.timestamp,
                            last.timestamp
                        ),
                    );
                    self.write_line("DEBUG", &format!("[{}] First: {}", category, first.payload));
                    self.write_line("DEBUG", &format!("[{}] Last: {}", category, last.payload));
                }
                [] => {}
            }
        }
    }

    /// Append a single formatted line
    pub fn write_line(&mut self, level: &str, message: &str) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };

        let line = format!(
            "{} | {} | {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            level,
            message
        );

        let written = writer
            .write_all(line.as_bytes())
            .and_then(|()| writer.flush());
        if let Err(e) = written {
            warn!("Log mirror write to {:?} failed, disabling: {}", self.path, e);
            self.writer = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::event::Priority;
    use serde_json::json;
    use tempfile::tempdir;

    fn event(category: &str, hp: i64, ts: f64) -> Event {
        Event::new("s", category, json!({ "hp": hp }), Priority::Normal).at(ts)
    }

    #[test]
    fn test_batch_grouping() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("game_log.log");
        let mut mirror = LogMirror::open(&path, DEFAULT_MIRROR_MAX_BYTES, 2);

        mirror.write_batch(&[
            event("player", 10, 1.0),
            event("enemy", 5, 1.5),
            event("player", 9, 2.0),
        ]);

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("[player] Bulk log: 2 entries from 1 to 2"));
        assert!(lines[1].contains("[player] First: {\"hp\":10}"));
        assert!(lines[2].contains("[player] Last: {\"hp\":9}"));
        assert!(lines[3].contains("[enemy] {\"hp\":5}"));
        assert!(lines[3].contains(" | DEBUG | "));
    }

    #[test]
    fn test_rotation_by_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("game_log.log");
        let mut mirror = LogMirror::open(&path, 200, 2);

        for i in 0..40 {
            mirror.write_line("INFO", &format!("line number {}", i));
        }
        assert!(mirror.is_enabled());

        let rotated = |n: usize| dir.path().join(format!("game_log.log.{}", n));
        assert!(path.exists());
        assert!(rotated(1).exists());
        assert!(rotated(2).exists());
        assert!(!rotated(3).exists());

        // Oldest lines are dropped, the newest survive
        let kept: String = [path.clone(), rotated(1), rotated(2)]
            .iter()
            .filter_map(|p| fs::read_to_string(p).ok())
            .collect();
        assert!(kept.contains("line number 39"));
        assert!(!kept.contains("line number 0\n"));
    }

    #[test]
    fn test_unwritable_location_is_silent() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not a directory").unwrap();

        let mut mirror = LogMirror::open(blocker.join("game_log.log"), 1024, 1);
        assert!(!mirror.is_enabled());
        mirror.write_batch(&[event("player", 1, 1.0)]);
        mirror.write_line("INFO", "still fine");
    }
}
