// src/observability/mod.rs
//! Logging and metrics setup
//!
//! The library only emits through the `tracing` and `metrics` facades. A host
//! application calls [`init_tracing`] once at startup to get console output;
//! installing a metrics recorder/exporter is left to the host.

use crate::utils::errors::{EngineError, Result};
use serde::Deserialize;
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Events accepted by `record`
pub const EVENTS_RECORDED: &str = "statelog_events_recorded_total";

/// Buffer → cache flushes
pub const FLUSHES: &str = "statelog_flushes_total";

/// Chunk files written
pub const CHUNKS_WRITTEN: &str = "statelog_chunks_written_total";

/// Chunk writes that failed (cache preserved)
pub const CHUNK_FAILURES: &str = "statelog_chunk_failures_total";

/// Snapshot files written
pub const SNAPSHOTS_WRITTEN: &str = "statelog_snapshots_written_total";

/// Corrupt or unreadable artifacts skipped by the loader
pub const ARTIFACTS_SKIPPED: &str = "statelog_artifacts_skipped_total";

/// Entries currently held in the accumulating cache
pub const CACHE_ENTRIES: &str = "statelog_cache_entries";

/// Tracing subscriber settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            filter: "statelog_engine=info".to_string(),
            json: false,
        }
    }
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over `config.filter`. Calling this when a subscriber is
/// already installed is not an error.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter).map_err(|e| {
            EngineError::ConfigFailed(format!("Invalid log filter '{}': {}", config.filter, e))
        })?,
    };

    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json {
        registry.with(fmt::layer().json().with_target(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    if installed.is_err() {
        debug!("Tracing subscriber already installed");
    } else {
        describe_metrics();
    }

    Ok(())
}

/// Register descriptions for every metric the engine emits
pub fn describe_metrics() {
    metrics::describe_counter!(EVENTS_RECORDED, "Events accepted by the recorder");
    metrics::describe_counter!(FLUSHES, "Buffer flushes into the session cache");
    metrics::describe_counter!(CHUNKS_WRITTEN, "Compressed chunk files written");
    metrics::describe_counter!(CHUNK_FAILURES, "Chunk writes that failed");
    metrics::describe_counter!(SNAPSHOTS_WRITTEN, "Snapshot files written");
    metrics::describe_counter!(ARTIFACTS_SKIPPED, "Corrupt artifacts skipped while loading");
    metrics::describe_gauge!(CACHE_ENTRIES, "Entries held in the accumulating cache");
}
