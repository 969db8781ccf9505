//! Error types for speaker-rx
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for speaker-rx
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Audio decoding errors (transient inside the decoder stage)
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors (fatal for the playback stage)
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Transport errors (replay file, TCP socket)
    #[error("Transport error: {0}")]
    Transport(String),

    /// A pipeline worker thread panicked or could not be spawned
    #[error("Worker error: {0}")]
    Worker(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from the shared crate (config file, logging)
    #[error(transparent)]
    Common(#[from] speaker_common::Error),
}

/// Convenience Result type using speaker-rx Error
pub type Result<T> = std::result::Result<T, Error>;
