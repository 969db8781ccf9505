//! Transport-facing entry point
//!
//! The transport calls `on_fragment` for every notification it receives, from
//! whatever thread or task it runs on. The handle only appends; decoding and
//! playback happen on the session's own threads.

use crate::pipeline::ingest_buffer::IngestBuffer;
use crate::pipeline::stats::PipelineStats;
use std::sync::Arc;
use tracing::debug;

/// Cloneable handle given to transports
#[derive(Debug, Clone)]
pub struct IngestHandle {
    buffer: Arc<IngestBuffer>,
    stats: Arc<PipelineStats>,
}

impl IngestHandle {
    pub(crate) fn new(buffer: Arc<IngestBuffer>, stats: Arc<PipelineStats>) -> Self {
        Self { buffer, stats }
    }

    /// Deliver one received fragment (any size, including empty)
    pub fn on_fragment(&self, payload: &[u8]) {
        self.stats.record_fragment(payload.len());
        self.buffer.append(payload);
    }

    /// The transport will deliver no more fragments
    pub fn end_of_input(&self) {
        debug!(
            "End of input after {} bytes",
            self.buffer.total_appended()
        );
        self.buffer.finish();
    }
}
