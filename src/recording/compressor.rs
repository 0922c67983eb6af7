// src/recording/compressor.rs
//! zstd compression for chunk blobs
//!
//! A chunk blob is a JSON array of events compressed as a single zstd frame.

use crate::recording::event::Event;
use crate::utils::errors::{EngineError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Compression levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    /// Fast compression (level 1)
    Fast,

    /// Balanced (level 3)
    #[default]
    Balanced,

    /// Best compression (level 19)
    Best,
}

impl CompressionLevel {
    pub fn as_i32(&self) -> i32 {
        match self {
            CompressionLevel::Fast => 1,
            CompressionLevel::Balanced => 3,
            CompressionLevel::Best => 19,
        }
    }
}

/// Compressor using zstd
#[derive(Debug, Clone, Copy, Default)]
pub struct Compressor {
    level: CompressionLevel,
}

impl Compressor {
    pub fn new(level: CompressionLevel) -> Self {
        Self { level }
    }

    pub fn level(&self) -> CompressionLevel {
        self.level
    }

    /// Compress raw bytes
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let level = self.level.as_i32();

        let compressed = zstd::encode_all(data, level)
            .map_err(|e| EngineError::CompressionFailed(format!("Compression error: {}", e)))?;

        debug!(
            "Compressed {} bytes -> {} bytes at level {}",
            data.len(),
            compressed.len(),
            level
        );

        Ok(compressed)
    }

    /// Decompress raw bytes
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::decode_all(data)
            .map_err(|e| EngineError::CompressionFailed(format!("Decompression error: {}", e)))
    }

    /// Serialize and compress an ordered batch of events
    pub fn encode_events(&self, events: &[Event]) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(events)
            .map_err(|e| EngineError::SerializationFailed(format!("Event batch: {}", e)))?;
        self.compress(&json)
    }

    /// Decompress and decode a chunk blob
    ///
    /// Fails if the blob decodes to anything but an array of events.
    pub fn decode_events(&self, data: &[u8]) -> Result<Vec<Event>> {
        let json = self.decompress(data)?;
        serde_json::from_slice(&json)
            .map_err(|e| EngineError::SerializationFailed(format!("Event batch: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::event::Priority;
    use serde_json::json;

    #[test]
    fn test_compression_levels() {
        assert_eq!(CompressionLevel::Fast.as_i32(), 1);
        assert_eq!(CompressionLevel::Balanced.as_i32(), 3);
        assert_eq!(CompressionLevel::Best.as_i32(), 19);
        assert_eq!(CompressionLevel::default(), CompressionLevel::Balanced);
    }

    #[test]
    fn test_truncated_frame_fails() {
        let compressor = Compressor::new(CompressionLevel::Fast);
        let payload = br#"[{"category":"player","data":{"health":100}}]"#.repeat(40);

        let blob = compressor.compress(&payload).unwrap();
        assert!(blob.len() < payload.len());
        assert_eq!(compressor.decompress(&blob).unwrap(), payload);

        let cut = &blob[..blob.len() / 2];
        assert!(matches!(
            compressor.decompress(cut),
            Err(EngineError::CompressionFailed(_))
        ));
    }

    #[test]
    fn test_event_batch_preserves_order() {
        let compressor = Compressor::default();
        let events: Vec<Event> = (0..50)
            .map(|i| {
                Event::new("s", "player", json!({"x": i, "pos": [i, i * 2]}), Priority::Normal)
                    .at(i as f64)
            })
            .collect();

        let blob = compressor.encode_events(&events).unwrap();
        let decoded = compressor.decode_events(&blob).unwrap();

        assert_eq!(decoded, events);
    }

    #[test]
    fn test_decode_rejects_non_sequence() {
        let compressor = Compressor::default();
        let blob = compressor.compress(br#"{"not": "a list"}"#).unwrap();

        assert!(matches!(
            compressor.decode_events(&blob),
            Err(EngineError::SerializationFailed(_))
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let compressor = Compressor::default();
        assert!(matches!(
            compressor.decode_events(b"definitely not zstd"),
            Err(EngineError::CompressionFailed(_))
        ));
    }
}
