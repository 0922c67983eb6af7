// src/lib.rs
//! Statelog Engine Library
//!
//! Records high-volume application events into per-session compressed
//! chunks and periodic snapshots, then compares snapshots, sessions and
//! exports to surface keys that change together.
//!
//! # Architecture
//!
//! The engine is structured into several key modules:
//!
//! - **recording**: Session recorder, buffering, chunk compression, snapshots, exports
//! - **storage**: On-disk layout and corruption-tolerant loading
//! - **analysis**: Structural diff, binary-tree comparison, duple aggregation, reports
//! - **runtime**: Cancellable background analysis tasks
//! - **observability**: Tracing setup and metric names
//! - **utils**: Errors, configuration, file and clock helpers
//!
//! # Example
//!
//! ```no_run
//! use statelog_engine::{Priority, RecorderConfig, SessionRecorder};
//! use serde_json::json;
//!
//! # fn main() -> statelog_engine::Result<()> {
//! let recorder = SessionRecorder::open(RecorderConfig::default())?;
//! recorder.record("player", json!({"health": 90, "wetness": 20}), Priority::Normal);
//! recorder.finalize()?;
//! # Ok(())
//! # }
//! ```

// Public module exports
pub mod analysis;
pub mod observability;
pub mod recording;
pub mod runtime;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use analysis::{
    compare_sequences, diff, find_duples, AnalysisConfig, Analyzer, ChangeSet, ComparisonResult,
    Duple, DupleReport, EntityRef, PatternCount, PatternReport,
};
pub use recording::{Event, Priority, RecorderConfig, SessionRecorder, Snapshot, Value};
pub use runtime::{AnalysisTask, TaskOutcome};
pub use storage::{LogLayout, SessionStore};
pub use utils::config::EngineConfig;
pub use utils::errors::{EngineError, LoadError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
