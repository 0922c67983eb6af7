// src/runtime/mod.rs
//! Background execution for long-running analysis
//!
//! ```text
//! host ──spawn──→ AnalysisTask ──spawn_blocking──→ closure(token)
//!   │                  │                               │
//!   ├── cancel() ──→ CancellationToken ←── checked between sessions
//!   └── join().await ──→ Completed | Cancelled | Failed
//! ```

pub mod task;

pub use task::{AnalysisTask, TaskOutcome};
