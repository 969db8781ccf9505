//! Decoder stage worker
//!
//! Re-decodes the whole accumulated buffer on every attempt rather than
//! keeping stateful decoder progress. The buffer is trimmed to a short
//! continuation window after each success, which bounds both its size and the
//! cost of each re-decode.
//!
//! Loop:
//! 1. Wait for `min_decode_bytes` buffered
//! 2. Snapshot, decode, split into `chunk_ms` chunks
//! 3. Success: publish chunks in order, keep `tail_keep_bytes` of the decoded prefix
//! 4. Failure or empty result: leave the buffer alone, wait for bytes beyond the snapshot

use crate::audio::decoder::StreamDecoder;
use crate::config::PipelineConfig;
use crate::pipeline::ingest_buffer::{BufferWait, IngestBuffer, Snapshot};
use crate::pipeline::playback_queue::PlaybackQueue;
use crate::pipeline::stats::PipelineStats;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Result of one decode attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    /// This many chunks were queued
    Published(usize),
    /// Decoder returned no audio
    Empty,
    /// Decoder could not parse the bytes (yet)
    Failed,
    /// Session shut down while publishing
    Interrupted,
}

/// How the stage's loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageExit {
    /// Input ended and the remaining bytes were handled
    InputEnded,
    /// Session shut down
    Shutdown,
}

pub struct DecoderStage<D> {
    buffer: Arc<IngestBuffer>,
    queue: Arc<PlaybackQueue>,
    decoder: D,
    stats: Arc<PipelineStats>,
    min_decode_bytes: usize,
    tail_keep_bytes: usize,
    chunk_duration: Duration,
    /// `total_appended` of the most recent attempt's snapshot
    last_attempt_total: Option<u64>,
}

impl<D: StreamDecoder> DecoderStage<D> {
    pub fn new(
        config: &PipelineConfig,
        buffer: Arc<IngestBuffer>,
        queue: Arc<PlaybackQueue>,
        decoder: D,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            buffer,
            queue,
            decoder,
            stats,
            min_decode_bytes: config.min_decode_bytes,
            tail_keep_bytes: config.tail_keep_bytes,
            chunk_duration: config.chunk_duration(),
            last_attempt_total: None,
        }
    }

    /// Run until input ends or the session shuts down.
    ///
    /// On end of input the playback queue is marked end-of-stream so playback
    /// drains what is left and exits.
    pub fn run(mut self) -> StageExit {
        debug!(
            "Decoder stage started (min_decode_bytes={}, tail_keep_bytes={}, chunk={:?})",
            self.min_decode_bytes, self.tail_keep_bytes, self.chunk_duration
        );

        let exit = self.decode_loop();

        if exit == StageExit::InputEnded {
            self.queue.mark_end_of_stream();
        }
        info!("Decoder stage exited ({:?})", exit);
        exit
    }

    fn decode_loop(&mut self) -> StageExit {
        loop {
            match self.buffer.await_min_size(self.min_decode_bytes) {
                BufferWait::Ready(_) => {}
                BufferWait::InputEnded => return self.drain_remaining(),
                BufferWait::Shutdown => return StageExit::Shutdown,
            }

            let snapshot = self.buffer.snapshot();
            let observed_len = snapshot.len();

            match self.attempt(snapshot) {
                Attempt::Published(count) => {
                    self.buffer
                        .retain_decoded_tail(observed_len, self.tail_keep_bytes);
                    trace!(
                        "Published {} chunks, {} bytes left buffered",
                        count,
                        self.buffer.len()
                    );
                }
                Attempt::Empty | Attempt::Failed => {
                    // Decoding is deterministic: the same bytes give the same
                    // result, so only new bytes are worth another attempt
                    match self.buffer.await_growth(observed_len) {
                        BufferWait::Ready(_) => {}
                        BufferWait::InputEnded => return self.drain_remaining(),
                        BufferWait::Shutdown => return StageExit::Shutdown,
                    }
                }
                Attempt::Interrupted => return StageExit::Shutdown,
            }
        }
    }

    /// Final attempt on whatever arrived since the last attempt, ignoring the threshold.
    fn drain_remaining(&mut self) -> StageExit {
        let snapshot = self.buffer.snapshot();
        let has_new_bytes = !snapshot.is_empty()
            && self
                .last_attempt_total
                .map_or(true, |total| snapshot.total_appended > total);

        if !has_new_bytes {
            return StageExit::InputEnded;
        }

        debug!("Input ended, decoding remaining {} bytes", snapshot.len());
        let observed_len = snapshot.len();
        match self.attempt(snapshot) {
            Attempt::Published(_) => {
                self.buffer.retain_decoded_tail(observed_len, self.tail_keep_bytes);
                StageExit::InputEnded
            }
            Attempt::Interrupted => StageExit::Shutdown,
            Attempt::Empty | Attempt::Failed => StageExit::InputEnded,
        }
    }

    fn attempt(&mut self, snapshot: Snapshot) -> Attempt {
        self.last_attempt_total = Some(snapshot.total_appended);
        self.stats.record_attempt();

        let input_len = snapshot.len();
        let started = Instant::now();

        let audio = match self.decoder.decode(snapshot.bytes) {
            Ok(audio) => audio,
            Err(e) => {
                // Incomplete or malformed unit: wait for more bytes
                self.stats.record_failure();
                trace!("Decode of {} bytes failed: {}", input_len, e);
                return Attempt::Failed;
            }
        };

        let chunks = audio.into_chunks(self.chunk_duration);
        if chunks.is_empty() {
            self.stats.record_empty();
            trace!("Decode of {} bytes produced no audio", input_len);
            return Attempt::Empty;
        }

        let count = chunks.len();
        for chunk in chunks {
            if !self.queue.publish(chunk) {
                return Attempt::Interrupted;
            }
            self.stats.record_published();
        }

        debug!(
            "Decoded {} bytes into {} chunks in {:.1}ms (queued={})",
            input_len,
            count,
            started.elapsed().as_secs_f64() * 1000.0,
            self.queue.len()
        );
        Attempt::Published(count)
    }
}
