// src/storage/mod.rs
//! Persisted layout and the read path
//!
//! - **Layout**: directory and file naming of the log tree
//! - **Loader**: corruption-tolerant loading of sessions, chunks, snapshots and duplets

pub mod layout;
pub mod loader;

pub use layout::{LogLayout, SessionPaths};
pub use loader::{LoadReport, SessionStore, SessionSummary, SkippedFile};
