//! Configuration for the speaker receiver
//!
//! Two layers:
//! 1. **TOML bootstrap** (`TomlConfig`): optional file, every field defaulted
//! 2. **Command line**: flags in `main.rs` override individual file values
//!
//! All values are static for the lifetime of a session.

use crate::error::{Error, Result};
use serde::Deserialize;
use speaker_common::LoggingConfig;
use std::time::Duration;

/// Default minimum buffered bytes before a decode is attempted
pub const DEFAULT_MIN_DECODE_BYTES: usize = 4096;

/// Default bytes kept in the ingest buffer after a successful decode
pub const DEFAULT_TAIL_KEEP_BYTES: usize = 1024;

/// Default chunk duration (ms)
pub const DEFAULT_CHUNK_MS: u32 = 50;

/// Default number of chunks queued before playback starts
pub const DEFAULT_PREBUFFER_CHUNKS: usize = 4;

/// Default playback queue capacity (20 seconds of 50ms chunks)
pub const DEFAULT_MAX_QUEUED_CHUNKS: usize = 400;

/// Pipeline tuning, fixed at session construction
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Ingest buffer length required before a decode attempt
    pub min_decode_bytes: usize,

    /// Bytes retained after a successful decode as the continuation window
    pub tail_keep_bytes: usize,

    /// Duration of each decoded chunk in milliseconds
    pub chunk_ms: u32,

    /// Chunks that must be queued before the first chunk is rendered
    pub prebuffer_chunks: usize,

    /// Playback queue capacity; 0 = unbounded
    pub max_queued_chunks: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_decode_bytes: DEFAULT_MIN_DECODE_BYTES,
            tail_keep_bytes: DEFAULT_TAIL_KEEP_BYTES,
            chunk_ms: DEFAULT_CHUNK_MS,
            prebuffer_chunks: DEFAULT_PREBUFFER_CHUNKS,
            max_queued_chunks: DEFAULT_MAX_QUEUED_CHUNKS,
        }
    }
}

impl PipelineConfig {
    /// Reject settings that would stall the pipeline forever.
    pub fn validate(&self) -> Result<()> {
        if self.min_decode_bytes == 0 {
            return Err(Error::Config("min_decode_bytes must be > 0".to_string()));
        }
        if self.tail_keep_bytes >= self.min_decode_bytes {
            return Err(Error::Config(format!(
                "tail_keep_bytes ({}) must be smaller than min_decode_bytes ({})",
                self.tail_keep_bytes, self.min_decode_bytes
            )));
        }
        if self.chunk_ms == 0 {
            return Err(Error::Config("chunk_ms must be > 0".to_string()));
        }
        if self.prebuffer_chunks == 0 {
            return Err(Error::Config("prebuffer_chunks must be > 0".to_string()));
        }
        if self.max_queued_chunks != 0 && self.prebuffer_chunks > self.max_queued_chunks {
            return Err(Error::Config(format!(
                "prebuffer_chunks ({}) exceeds max_queued_chunks ({})",
                self.prebuffer_chunks, self.max_queued_chunks
            )));
        }
        Ok(())
    }

    /// Chunk duration as a `Duration`
    pub fn chunk_duration(&self) -> Duration {
        Duration::from_millis(self.chunk_ms as u64)
    }

    /// Queue capacity, `None` when unbounded
    pub fn queue_capacity(&self) -> Option<usize> {
        (self.max_queued_chunks > 0).then_some(self.max_queued_chunks)
    }
}

/// Output device selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Device name (None = host default device)
    pub device: Option<String>,

    /// Ring buffer capacity in frames (None = one second at the device rate)
    pub ring_buffer_frames: Option<usize>,
}

/// Transport defaults for the binary
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Negotiated ATT MTU; each fragment carries `mtu - 3` payload bytes
    pub mtu: u16,

    /// Pause between replayed fragments in milliseconds (0 = no pacing)
    pub fragment_interval_ms: u64,

    /// Container hint handed to the decoder
    pub format_hint: String,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            mtu: 247,
            fragment_interval_ms: 5,
            format_hint: "mp3".to_string(),
        }
    }
}

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub pipeline: PipelineConfig,
    pub output: OutputSettings,
    pub transport: TransportSettings,
    pub logging: LoggingConfig,
}
