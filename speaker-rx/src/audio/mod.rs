//! Audio capabilities: decoding, chunk types, output device
//!
//! The pipeline only depends on the `StreamDecoder` and `OutputDevice`
//! traits; symphonia and cpal are the production implementations.

pub mod decoder;
pub mod output;
pub mod resampler;
pub mod ring_buffer;
pub mod types;

pub use decoder::{StreamDecoder, SymphoniaDecoder};
pub use output::{CpalOutput, OutputDevice};
pub use types::{DecodedAudio, DecodedChunk};
