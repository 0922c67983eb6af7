// src/analysis/mod.rs
//! Read-only analysis of recorded sessions
//!
//! - **Diff**: recursive leaf-path diff of two nested values
//! - **Duple**: unordered key pairs and their counts
//! - **Comparator**: binary-tree comparison of two state sequences
//! - **Aggregator**: co-changing keys across consecutive snapshots
//! - **Trends**: correlation and state-change heuristics
//! - **Narrative**: Markdown / JSON pattern reports
//! - **Analyzer**: the above applied to sessions, snapshots and exports on disk
//!
//! # Architecture
//!
//! ```text
//! SessionStore ──snapshots──→ Snapshot::state() ──┬─→ SequenceComparator ─→ ComparisonResult
//!      │                                          ├─→ DupleAggregator ────→ DupleReport
//!      │                                          └─→ correlate / detect_state_changes
//!      └──EntityRef──→ load_entity ──→ DiffEngine ──→ ChangeSet
//!                                                        │
//!                                   DupleReport ──→ PatternReport ──→ Exporter
//! ```

pub mod aggregator;
pub mod analyzer;
pub mod comparator;
pub mod diff;
pub mod duple;
pub mod entity;
pub mod narrative;
pub mod trends;

pub use aggregator::{find_duples, DupleAggregator, DupleOccurrence, DupleReport};
pub use analyzer::{AnalysisConfig, Analyzer};
pub use comparator::{compare_sequences, ComparisonResult, SequenceComparator};
pub use diff::{diff, Change, ChangeSet, DiffEngine, DiffOptions, TimeDifference};
pub use duple::{Duple, PatternCount};
pub use entity::EntityRef;
pub use narrative::{PatternLine, PatternReport};
pub use trends::{correlate, detect_state_changes, Correlation, Relationship, StateChange};
