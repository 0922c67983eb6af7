// src/recording/event.rs
//! Event records submitted by the host application

use crate::utils::errors::EngineError;
use crate::utils::time::unix_now;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Recursive payload type: `Null | Bool | Number | String | Array | Object`
pub type Value = serde_json::Value;

/// Event priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,

    #[default]
    Normal,

    High,

    Critical,
}

impl Priority {
    /// High and critical events force a flush boundary
    pub fn forces_flush(&self) -> bool {
        matches!(self, Priority::High | Priority::Critical)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(EngineError::SerializationFailed(format!(
                "Unknown priority '{}'",
                other
            ))),
        }
    }
}

/// One structured record
///
/// Immutable once created. On disk the payload is stored under `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Seconds since the Unix epoch
    pub timestamp: f64,

    /// Free-form category (`player`, `enemy`, `environment`, ...)
    pub category: String,

    /// Nested key-value payload
    #[serde(rename = "data")]
    pub payload: Value,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub session_id: String,
}

impl Event {
    /// Create an event stamped with the current time
    pub fn new(
        session_id: impl Into<String>,
        category: impl Into<String>,
        payload: Value,
        priority: Priority,
    ) -> Self {
        Self {
            timestamp: unix_now(),
            category: category.into(),
            payload,
            priority,
            session_id: session_id.into(),
        }
    }

    /// Override the timestamp
    pub fn at(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }
}
