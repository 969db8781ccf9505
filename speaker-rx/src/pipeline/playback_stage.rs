//! Playback stage worker
//!
//! Holds back the first chunk until the prebuffer is full, then renders one
//! chunk at a time. The blocking render call paces the loop at real time, so
//! the queue drains at exactly the playback rate.

use crate::audio::output::OutputDevice;
use crate::error::Result;
use crate::pipeline::playback_queue::{PlaybackQueue, QueueWait};
use crate::pipeline::shutdown::ShutdownToken;
use crate::pipeline::stats::PipelineStats;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, trace};

pub struct PlaybackStage {
    queue: Arc<PlaybackQueue>,
    stats: Arc<PipelineStats>,
    shutdown: ShutdownToken,
}

impl PlaybackStage {
    pub fn new(
        queue: Arc<PlaybackQueue>,
        stats: Arc<PipelineStats>,
        shutdown: ShutdownToken,
    ) -> Self {
        Self {
            queue,
            stats,
            shutdown,
        }
    }

    /// Render until the stream drains or the session shuts down.
    ///
    /// An output error ends the stage and is returned to the caller.
    pub fn run<O: OutputDevice>(self, output: &mut O) -> Result<()> {
        let mut started = false;
        let mut start_time: Option<Instant> = None;

        loop {
            match self.queue.await_ready(started) {
                QueueWait::Ready => {}
                QueueWait::Drained => {
                    if let Err(e) = output.finish(&self.shutdown) {
                        error!("Audio output failed while draining: {}", e);
                        return Err(e);
                    }
                    info!("Playback drained, stopping");
                    return Ok(());
                }
                QueueWait::Shutdown => {
                    debug!("Playback stage received shutdown signal");
                    return Ok(());
                }
            }

            let Some(chunk) = self.queue.take() else {
                continue;
            };

            if !started {
                info!(
                    "Starting playback with {} chunks buffered ({} Hz, {} ch)",
                    self.queue.len() + 1,
                    chunk.sample_rate(),
                    chunk.channels()
                );
                start_time = Some(Instant::now());
            }
            started = true;

            if let Err(e) = output.play(chunk, &self.shutdown) {
                error!(
                    "Audio output failed: {} - playback stopped; {} queued chunks will not drain \
                     and the decoder will stall once the queue is full",
                    e,
                    self.queue.len()
                );
                return Err(e);
            }
            if self.shutdown.is_raised() {
                return Ok(());
            }
            self.stats.record_rendered();

            if let Some(start) = start_time {
                trace!(
                    "Rendered chunk {} ({:.2}s since start, queued={})",
                    self.stats.snapshot().chunks_rendered,
                    start.elapsed().as_secs_f64(),
                    self.queue.len()
                );
            }
        }
    }
}
