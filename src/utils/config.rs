// src/utils/config.rs
//! Engine configuration
//!
//! Configuration is layered with the `config` crate:
//!
//! ```text
//! built-in defaults  →  statelog.toml (optional)  →  STATELOG__* env vars
//! ```
//!
//! Nested keys use `__` as separator, e.g.
//! `STATELOG__RECORDER__CACHE_SIZE_LIMIT=500`.

use crate::analysis::AnalysisConfig;
use crate::observability::ObservabilityConfig;
use crate::recording::recorder::RecorderConfig;
use crate::utils::errors::{EngineError, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "STATELOG";

/// Default configuration file stem (searched in the working directory)
pub const DEFAULT_CONFIG_NAME: &str = "statelog";

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ingestion pipeline settings
    pub recorder: RecorderConfig,

    /// Diff / comparator / aggregator settings
    pub analysis: AnalysisConfig,

    /// Tracing subscriber settings
    pub observability: ObservabilityConfig,
}

impl EngineConfig {
    /// Load from `statelog.toml` (if present) and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load from an explicit file (required to exist) and the environment
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        Self::build(path, ENV_PREFIX)
    }

    fn build(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut builder = Config::builder();

        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_NAME).required(false)),
        };

        let settings = builder
            .add_source(
                Environment::with_prefix(env_prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: EngineConfig = settings.try_deserialize()?;
        config.validate()?;

        debug!(?config, "Configuration loaded");
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let recorder = &self.recorder;

        if recorder.flush_interval_ms == 0 {
            return Err(EngineError::ConfigFailed(
                "recorder.flush_interval_ms must be greater than zero".to_string(),
            ));
        }
        if recorder.snapshot_interval_ms == 0 {
            return Err(EngineError::ConfigFailed(
                "recorder.snapshot_interval_ms must be greater than zero".to_string(),
            ));
        }
        if recorder.cache_size_limit == 0 {
            return Err(EngineError::ConfigFailed(
                "recorder.cache_size_limit must be greater than zero".to_string(),
            ));
        }
        if recorder.mirror_max_files == 0 {
            return Err(EngineError::ConfigFailed(
                "recorder.mirror_max_files must be greater than zero".to_string(),
            ));
        }
        let tolerance = self.analysis.float_tolerance;
        if tolerance.is_nan() || tolerance < 0.0 {
            return Err(EngineError::ConfigFailed(
                "analysis.float_tolerance must be a non-negative number".to_string(),
            ));
        }
        if self.analysis.min_occurrences == 0 {
            return Err(EngineError::ConfigFailed(
                "analysis.min_occurrences must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::compressor::CompressionLevel;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();

        assert_eq!(config.recorder.flush_interval_ms, 200);
        assert_eq!(config.recorder.snapshot_interval_ms, 1000);
        assert_eq!(config.recorder.cache_size_limit, 10_000);
        assert_eq!(config.analysis.float_tolerance, 0.0);
        assert_eq!(config.analysis.min_occurrences, 2);
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("statelog.toml");
        std::fs::write(
            &path,
            r#"
[recorder]
log_dir = "/var/tmp/statelog"
cache_size_limit = 250
compression_level = "best"

[analysis]
float_tolerance = 0.05
temporal_mode = true
"#,
        )
        .unwrap();

        let config = EngineConfig::build(Some(&path), "STATELOG_TEST_UNSET").unwrap();

        assert_eq!(config.recorder.log_dir, PathBuf::from("/var/tmp/statelog"));
        assert_eq!(config.recorder.cache_size_limit, 250);
        assert!(matches!(config.recorder.compression_level, CompressionLevel::Best));
        // Untouched keys keep their defaults
        assert_eq!(config.recorder.flush_interval_ms, 200);
        assert_eq!(config.analysis.float_tolerance, 0.05);
        assert!(config.analysis.temporal_mode);
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("statelog.toml");
        std::fs::write(&path, "[recorder]\ncache_size_limit = 250\n").unwrap();

        std::env::set_var("STATELOG_ENVTEST__RECORDER__CACHE_SIZE_LIMIT", "42");
        let config = EngineConfig::build(Some(&path), "STATELOG_ENVTEST").unwrap();
        std::env::remove_var("STATELOG_ENVTEST__RECORDER__CACHE_SIZE_LIMIT");

        assert_eq!(config.recorder.cache_size_limit, 42);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let dir = tempdir().unwrap();
        let result = EngineConfig::load_from(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(EngineError::ConfigFailed(_))));
    }

    #[test]
    fn test_validate_rejects_zero_cache_limit() {
        let mut config = EngineConfig::default();
        config.recorder.cache_size_limit = 0;
        assert!(matches!(config.validate(), Err(EngineError::ConfigFailed(_))));
    }
}
