// src/analysis/entity.rs
//! References to comparable artifacts at any level of the log tree

use crate::utils::errors::EngineError;
use std::fmt;
use std::str::FromStr;

/// Something that can be loaded as a single [`Value`](crate::recording::event::Value)
///
/// Textual form: `snapshot:<session_id>:<tick>`, `session:<session_id>`,
/// `export:<file_name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityRef {
    /// One snapshot file
    Snapshot { session_id: String, tick: String },

    /// A whole session, as `{"session_id": .., "snapshots": [...]}`
    Session(String),

    /// A JSON file under `exports/`
    Export(String),
}

impl EntityRef {
    pub fn snapshot(session_id: impl Into<String>, tick: impl Into<String>) -> Self {
        EntityRef::Snapshot {
            session_id: session_id.into(),
            tick: tick.into(),
        }
    }

    pub fn session(session_id: impl Into<String>) -> Self {
        EntityRef::Session(session_id.into())
    }

    pub fn export(file_name: impl Into<String>) -> Self {
        EntityRef::Export(file_name.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EntityRef::Snapshot { .. } => "snapshot",
            EntityRef::Session(_) => "session",
            EntityRef::Export(_) => "export",
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Snapshot { session_id, tick } => write!(f, "snapshot:{}:{}", session_id, tick),
            EntityRef::Session(id) => write!(f, "session:{}", id),
            EntityRef::Export(name) => write!(f, "export:{}", name),
        }
    }
}

impl FromStr for EntityRef {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::EntityNotFound(format!("unrecognized entity reference '{}'", s));

        let (kind, rest) = s.split_once(':').ok_or_else(invalid)?;
        if rest.is_empty() {
            return Err(invalid());
        }

        match kind {
            "snapshot" => {
                let (session_id, tick) = rest.rsplit_once(':').ok_or_else(invalid)?;
                if session_id.is_empty() || tick.is_empty() {
                    return Err(invalid());
                }
                Ok(EntityRef::snapshot(session_id, tick))
            }
            "session" => Ok(EntityRef::session(rest)),
            "export" => Ok(EntityRef::export(rest)),
            _ => Err(invalid()),
        }
    }
}
