//! speaker-rx: streaming compressed-audio receiver
//!
//! Fragments of a compressed audio stream arrive from a transport (radio
//! notifications, a socket, a replayed capture), are decoded opportunistically
//! as they accumulate, and are played back in real time after a short
//! prebuffer.
//!
//! ```no_run
//! use speaker_rx::audio::{CpalOutput, SymphoniaDecoder};
//! use speaker_rx::config::{OutputSettings, PipelineConfig};
//! use speaker_rx::Session;
//!
//! # fn main() -> speaker_rx::Result<()> {
//! let output = OutputSettings::default();
//! let session = Session::start(
//!     &PipelineConfig::default(),
//!     SymphoniaDecoder::mp3(),
//!     move || CpalOutput::open(&output),
//! )?;
//!
//! let ingest = session.ingest();
//! ingest.on_fragment(&[0xFF, 0xFB, 0x90, 0x64]);
//! ingest.end_of_input();
//!
//! session.wait()
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod transport;

pub use error::{Error, Result};
pub use pipeline::{IngestHandle, Session, ShutdownToken, StatsSnapshot};
