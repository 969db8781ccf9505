//! Streaming decode/playback pipeline
//!
//! ```text
//! transport -> IngestHandle -> IngestBuffer -> DecoderStage -> PlaybackQueue -> PlaybackStage -> output
//! ```
//!
//! Three contexts run concurrently: the transport (any thread or task), the
//! `decoder-stage` thread and the `playback-stage` thread. Each shared
//! resource has exactly one lock and is mutated by exactly two roles.

pub mod decoder_stage;
pub mod ingest;
pub mod ingest_buffer;
pub mod playback_queue;
pub mod playback_stage;
pub mod session;
pub mod shutdown;
pub mod stats;

pub use ingest::IngestHandle;
pub use session::Session;
pub use shutdown::ShutdownToken;
pub use stats::StatsSnapshot;
