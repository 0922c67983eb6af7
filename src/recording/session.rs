// src/recording/session.rs
//! Session identity, lifecycle state and persisted descriptors

use crate::utils::time::unix_now;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Session lifecycle
///
/// ```text
/// Created → Active → Finalizing → Closed
/// ```
///
/// There is no transition out of `Closed`. A process killed before
/// finalization leaves the session `Active` on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Created,
    Active,
    Finalizing,
    Closed,
}

impl SessionState {
    pub fn accepts_events(&self) -> bool {
        matches!(self, SessionState::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "created",
            SessionState::Active => "active",
            SessionState::Finalizing => "finalizing",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Identity and timing of one recording session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,

    /// Seconds since epoch
    pub start_time: f64,

    /// Set exactly once, at finalize
    pub end_time: Option<f64>,

    pub duration: Option<f64>,
}

impl Session {
    pub fn start(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            start_time: unix_now(),
            end_time: None,
            duration: None,
        }
    }

    /// Stamp end time and duration (no-op when already closed)
    pub fn close(&mut self) {
        if self.end_time.is_some() {
            return;
        }
        let end = unix_now();
        self.end_time = Some(end);
        self.duration = Some((end - self.start_time).max(0.0));
    }
}

/// `session_<YYYYMMDD_HHMMSS>_<pid>` from the local wall clock
pub fn generate_session_id() -> String {
    format!(
        "session_{}_{}",
        Local::now().format("%Y%m%d_%H%M%S"),
        std::process::id()
    )
}

/// `manifest.json`, written when the session opens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionManifest {
    pub session_id: String,

    pub start_time: f64,

    #[serde(default)]
    pub platform: String,

    #[serde(default)]
    pub arch: String,

    #[serde(default)]
    pub pid: u32,

    #[serde(default)]
    pub executable: Option<String>,

    /// Human-readable start time
    #[serde(default, alias = "timestamp")]
    pub started_at: String,

    #[serde(default, alias = "game_version")]
    pub app_version: String,
}

impl SessionManifest {
    pub fn for_session(session: &Session, app_version: &str) -> Self {
        Self {
            session_id: session.id.clone(),
            start_time: session.start_time,
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            pid: std::process::id(),
            executable: std::env::current_exe()
                .ok()
                .map(|p| p.display().to_string()),
            started_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            app_version: app_version.to_string(),
        }
    }
}

/// `metadata.json`, written once at finalize
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: String,

    pub start_time: f64,

    pub end_time: f64,

    pub duration: f64,

    #[serde(default)]
    pub log_file: Option<PathBuf>,

    #[serde(default)]
    pub snapshot_count: usize,

    #[serde(default)]
    pub duplet_count: usize,

    #[serde(default)]
    pub chunk_count: usize,

    #[serde(default)]
    pub events_recorded: u64,
}
