// src/recording/exporter.rs
//! Export recorded events and analysis reports
//!
//! Supports:
//! - JSON (events and pattern reports)
//! - CSV (events, one `data.<key>` column per payload key of the first event)
//! - Markdown (pattern reports)
//!
//! Files land in `<root>/exports/`.

use crate::analysis::narrative::PatternReport;
use crate::recording::event::{Event, Value};
use crate::utils::errors::{EngineError, Result};
use crate::utils::fs::atomic_write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// JSON format
    Json,

    /// Comma-separated values (events only)
    Csv,

    /// Markdown (reports only)
    Markdown,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Markdown => "md",
        }
    }
}

/// Exporter for events and reports
pub struct Exporter {
    format: ExportFormat,
}

impl Exporter {
    /// Create a new exporter
    pub fn new(format: ExportFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    /// Export events to string
    pub fn export(&self, events: &[Event]) -> Result<String> {
        debug!("Exporting {} events to {:?} format", events.len(), self.format);

        match self.format {
            ExportFormat::Json => self.export_json(events),
            ExportFormat::Csv => self.export_csv(events),
            ExportFormat::Markdown => Err(EngineError::ExportFailed(
                "Markdown export is only available for reports".to_string(),
            )),
        }
    }

    /// Write a session's events to `<exports_dir>/<session_id>_export.<ext>`
    ///
    /// Returns `None` when there is nothing to export.
    pub fn export_session(
        &self,
        exports_dir: &Path,
        session_id: &str,
        events: &[Event],
    ) -> Result<Option<PathBuf>> {
        if events.is_empty() {
            return Ok(None);
        }

        let content = self.export(events)?;
        let path = exports_dir.join(format!("{}_export.{}", session_id, self.format.extension()));

        atomic_write(&path, content.as_bytes()).map_err(|e| {
            EngineError::ExportFailed(format!("Failed to write {:?}: {}", path, e))
        })?;

        info!("Exported {} events of {} to {:?}", events.len(), session_id, path);
        Ok(Some(path))
    }

    /// Render a pattern report
    pub fn render_report(&self, report: &PatternReport) -> Result<String> {
        match self.format {
            ExportFormat::Json => serde_json::to_string_pretty(report).map_err(|e| {
                EngineError::ExportFailed(format!("JSON serialization error: {}", e))
            }),
            ExportFormat::Markdown => Ok(report.to_markdown()),
            ExportFormat::Csv => Err(EngineError::ExportFailed(
                "CSV export is only available for events".to_string(),
            )),
        }
    }

    /// Write a pattern report to `<exports_dir>/<name>.<ext>`
    pub fn write_report(
        &self,
        exports_dir: &Path,
        name: &str,
        report: &PatternReport,
    ) -> Result<PathBuf> {
        let content = self.render_report(report)?;
        let path = exports_dir.join(format!("{}.{}", name, self.format.extension()));

        atomic_write(&path, content.as_bytes()).map_err(|e| {
            EngineError::ExportFailed(format!("Failed to write {:?}: {}", path, e))
        })?;

        info!("Wrote pattern report {:?}", path);
        Ok(path)
    }

    /// Export to JSON format
    fn export_json(&self, events: &[Event]) -> Result<String> {
        serde_json::to_string_pretty(events)
            .map_err(|e| EngineError::ExportFailed(format!("JSON serialization error: {}", e)))
    }

    /// Export to CSV format
    fn export_csv(&self, events: &[Event]) -> Result<String> {
        let keys: Vec<String> = events
            .first()
            .and_then(|e| e.payload.as_object())
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default();

        let mut writer = csv::Writer::from_writer(Vec::new());

        let mut header = vec![
            "timestamp".to_string(),
            "category".to_string(),
            "priority".to_string(),
        ];
        header.extend(keys.iter().map(|k| format!("data.{}", k)));
        writer
            .write_record(&header)
            .map_err(|e| EngineError::ExportFailed(format!("CSV header error: {}", e)))?;

        for event in events {
            let mut row = vec![
                event.timestamp.to_string(),
                event.category.clone(),
                event.priority.to_string(),
            ];
            if let Some(map) = event.payload.as_object() {
                row.extend(keys.iter().map(|k| map.get(k).map(csv_cell).unwrap_or_default()));
            } else {
                row.extend(keys.iter().map(|_| String::new()));
            }
            writer
                .write_record(&row)
                .map_err(|e| EngineError::ExportFailed(format!("CSV row error: {}", e)))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| EngineError::ExportFailed(format!("CSV flush error: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| EngineError::ExportFailed(format!("CSV encoding error: {}", e)))
    }
}

/// Strings are written bare, everything else as compact JSON
fn csv_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
