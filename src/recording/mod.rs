// src/recording/mod.rs
//! Event ingestion and durable storage
//!
//! - **Recorder**: session handle exposing `record` / `force_snapshot` / `finalize`
//! - **Buffer**: pending list and accumulating cache
//! - **Chunk**: compresses the cache into immutable `chunk_<id>.zst` files
//! - **Snapshot**: per-interval categorized snapshots and duplets
//! - **Mirror**: size-rotated human-readable `game_log.log`
//! - **Exporter**: JSON / CSV / Markdown exports
//!
//! # Architecture
//!
//! ```text
//! Host → record() ─→ EventBuffer ──flush──→ cache ──≥ limit──→ ChunkWriter
//!           │              │                                    (zstd, atomic)
//!           │              └──→ LogMirror (best effort)
//!           └──→ SnapshotAssembler ──tick──→ snapshot_<tick>.json
//!                                                 └─→ duplet_<tick>.json
//! ```

pub mod buffer;
pub mod chunk;
pub mod compressor;
pub mod event;
pub mod exporter;
pub mod mirror;
pub mod recorder;
pub mod session;
pub mod snapshot;

// Re-export commonly used types
pub use chunk::{ChunkHandle, ChunkSummary, ChunkWriter};
pub use compressor::{CompressionLevel, Compressor};
pub use event::{Event, Priority, Value};
pub use exporter::{ExportFormat, Exporter};
pub use recorder::{RecorderConfig, RecorderStats, SessionRecorder};
pub use session::{Session, SessionManifest, SessionMetadata, SessionState};
pub use snapshot::{Duplet, Snapshot, SnapshotAssembler};
