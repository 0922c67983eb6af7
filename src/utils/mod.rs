// src/utils/mod.rs
//! Common utilities: errors, configuration, file and clock helpers

pub mod config;
pub mod errors;
pub mod fs;
pub mod time;

pub use config::EngineConfig;
pub use errors::{EngineError, LoadError, Result};
