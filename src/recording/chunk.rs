// src/recording/chunk.rs
//! Chunk compressor: turns the accumulating cache into immutable chunk files
//!
//! Each chunk is written as two files in the session `cache/` directory:
//!
//! - `chunk_<id>.zst`: zstd-compressed JSON array of events
//! - `chunk_<id>_summary.json`: entry count, time span, per-category counts
//!
//! The cache is cleared only after both files exist. On failure the cache is
//! left intact so the next compression attempt retries the same entries.

use crate::observability::{CACHE_ENTRIES, CHUNKS_WRITTEN, CHUNK_FAILURES};
use crate::recording::compressor::Compressor;
use crate::recording::event::Event;
use crate::storage::layout::{chunk_file_name, is_chunk_file, summary_file_name};
use crate::utils::errors::{EngineError, Result};
use crate::utils::fs::{atomic_write, sorted_file_names};
use crate::utils::time::MonotonicIds;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Human-readable statistics stored beside a chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSummary {
    pub chunk_id: String,

    /// Number of events in the chunk
    #[serde(alias = "entries")]
    pub entry_count: usize,

    /// Timestamp of the first event
    pub start_time: f64,

    /// Timestamp of the last event
    pub end_time: f64,

    /// Events per category
    pub categories: BTreeMap<String, usize>,

    /// Size of the compressed blob in bytes
    #[serde(default)]
    pub compressed_size: u64,
}

impl ChunkSummary {
    /// Derive a summary from the in-memory batch
    pub fn from_events(chunk_id: &str, events: &[Event], compressed_size: u64) -> Self {
        let mut categories = BTreeMap::new();
        for event in events {
            *categories.entry(event.category.clone()).or_insert(0) += 1;
        }

        Self {
            chunk_id: chunk_id.to_string(),
            entry_count: events.len(),
            start_time: events.first().map(|e| e.timestamp).unwrap_or(0.0),
            end_time: events.last().map(|e| e.timestamp).unwrap_or(0.0),
            categories,
            compressed_size,
        }
    }
}

/// A chunk that was fully written
#[derive(Debug, Clone)]
pub struct ChunkHandle {
    pub chunk_id: String,
    pub path: PathBuf,
    pub summary_path: PathBuf,
    pub summary: ChunkSummary,
}

/// Writes chunk files for one session
#[derive(Debug)]
pub struct ChunkWriter {
    cache_dir: PathBuf,
    compressor: Compressor,
    ids: MonotonicIds,
}

impl ChunkWriter {
    pub fn new(cache_dir: impl Into<PathBuf>, compressor: Compressor) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            compressor,
            ids: MonotonicIds::new(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Compress the whole cache into a new chunk
    ///
    /// Returns `Ok(None)` for an empty cache. The cache is cleared only when
    /// both the blob and its summary were written.
    pub fn compress(&mut self, cache: &mut Vec<Event>) -> Result<Option<ChunkHandle>> {
        if cache.is_empty() {
            return Ok(None);
        }

        match self.write_chunk(cache) {
            Ok(handle) => {
                cache.clear();
                metrics::counter!(CHUNKS_WRITTEN).increment(1);
                metrics::gauge!(CACHE_ENTRIES).set(0.0);
                info!(
                    "Wrote chunk {} ({} entries, {} bytes)",
                    handle.chunk_id, handle.summary.entry_count, handle.summary.compressed_size
                );
                Ok(Some(handle))
            }
            Err(e) => {
                metrics::counter!(CHUNK_FAILURES).increment(1);
                error!(
                    "Chunk write failed, keeping {} cached entries: {}",
                    cache.len(),
                    e
                );
                Err(e)
            }
        }
    }

    fn write_chunk(&mut self, events: &[Event]) -> Result<ChunkHandle> {
        let chunk_id = self.ids.next_id();
        let path = self.cache_dir.join(chunk_file_name(&chunk_id));
        let summary_path = self.cache_dir.join(summary_file_name(&chunk_id));

        let blob = self.compressor.encode_events(events)?;

        atomic_write(&path, &blob).map_err(|e| {
            EngineError::StorageFailed(format!("Failed to write chunk {:?}: {}", path, e))
        })?;

        let summary = ChunkSummary::from_events(&chunk_id, events, blob.len() as u64);
        let summary_bytes = serde_json::to_vec_pretty(&summary)?;

        if let Err(e) = atomic_write(&summary_path, &summary_bytes) {
            let _ = fs::remove_file(&path);
            return Err(EngineError::StorageFailed(format!(
                "Failed to write chunk summary {:?}: {}",
                summary_path, e
            )));
        }

        debug!("Chunk {} written to {:?}", chunk_id, path);

        Ok(ChunkHandle {
            chunk_id,
            path,
            summary_path,
            summary,
        })
    }
}

/// Most recently written chunk blob in `cache_dir`
pub fn latest_chunk_file(cache_dir: &Path) -> Option<PathBuf> {
    sorted_file_names(cache_dir, is_chunk_file)
        .ok()?
        .pop()
        .map(|name| cache_dir.join(name))
}
