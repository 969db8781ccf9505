//! One streaming session: ingest buffer, playback queue and the two workers
//!
//! Everything a session shares is owned here and handed to its workers at
//! construction, so independent sessions can run side by side and be shut
//! down separately.

use crate::audio::decoder::StreamDecoder;
use crate::audio::output::OutputDevice;
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::pipeline::decoder_stage::DecoderStage;
use crate::pipeline::ingest::IngestHandle;
use crate::pipeline::ingest_buffer::IngestBuffer;
use crate::pipeline::playback_queue::PlaybackQueue;
use crate::pipeline::playback_stage::PlaybackStage;
use crate::pipeline::shutdown::ShutdownToken;
use crate::pipeline::stats::{PipelineStats, StatsSnapshot};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info, warn};

/// What every context needs to tear the session down
#[derive(Clone)]
struct Teardown {
    buffer: Arc<IngestBuffer>,
    queue: Arc<PlaybackQueue>,
    shutdown: ShutdownToken,
}

impl Teardown {
    fn trigger(&self) {
        self.shutdown.raise();
        self.buffer.close();
        self.queue.close();
    }
}

/// Tears the session down if a worker unwinds, so the other worker and the
/// transport are never left waiting on a stage that no longer exists.
struct PanicGuard {
    teardown: Teardown,
    stage: &'static str,
}

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("{} panicked, shutting the session down", self.stage);
            self.teardown.trigger();
        }
    }
}

pub struct Session {
    buffer: Arc<IngestBuffer>,
    queue: Arc<PlaybackQueue>,
    stats: Arc<PipelineStats>,
    teardown: Teardown,
    decoder_thread: Option<JoinHandle<()>>,
    playback_thread: Option<JoinHandle<Result<()>>>,
}

impl Session {
    /// Validate the config and spawn the decoder and playback threads.
    ///
    /// `open_output` runs on the playback thread; output devices such as cpal
    /// streams cannot move between threads. If it fails, the playback stage
    /// ends with that error.
    pub fn start<D, F, O>(config: &PipelineConfig, decoder: D, open_output: F) -> Result<Self>
    where
        D: StreamDecoder + 'static,
        F: FnOnce() -> Result<O> + Send + 'static,
        O: OutputDevice,
    {
        config.validate()?;

        let buffer = Arc::new(IngestBuffer::new());
        let queue = Arc::new(PlaybackQueue::new(
            config.prebuffer_chunks,
            config.queue_capacity(),
        ));
        let stats = Arc::new(PipelineStats::new());
        let shutdown = ShutdownToken::new();
        let teardown = Teardown {
            buffer: Arc::clone(&buffer),
            queue: Arc::clone(&queue),
            shutdown: shutdown.clone(),
        };

        let decoder_stage = DecoderStage::new(
            config,
            Arc::clone(&buffer),
            Arc::clone(&queue),
            decoder,
            Arc::clone(&stats),
        );
        let decoder_guard = PanicGuard {
            teardown: teardown.clone(),
            stage: "Decoder stage",
        };
        let decoder_thread = thread::Builder::new()
            .name("decoder-stage".to_string())
            .spawn(move || {
                let _guard = decoder_guard;
                decoder_stage.run();
            })
            .map_err(|e| Error::Worker(format!("Failed to spawn decoder thread: {}", e)))?;

        let playback_stage =
            PlaybackStage::new(Arc::clone(&queue), Arc::clone(&stats), shutdown);
        let playback_guard = PanicGuard {
            teardown: teardown.clone(),
            stage: "Playback stage",
        };
        let playback_spawn = thread::Builder::new()
            .name("playback-stage".to_string())
            .spawn(move || {
                let guard = playback_guard;
                let result = open_output()
                    .map_err(|e| {
                        error!("Failed to open audio output: {} - nothing will be played", e);
                        e
                    })
                    .and_then(|mut output| playback_stage.run(&mut output));

                // Nothing will drain the queue any more: stop the decoder and
                // refuse further input instead of buffering it forever
                if result.is_err() {
                    guard.teardown.trigger();
                }
                result
            });

        let mut session = Self {
            buffer,
            queue,
            stats,
            teardown,
            decoder_thread: Some(decoder_thread),
            playback_thread: None,
        };

        match playback_spawn {
            Ok(handle) => session.playback_thread = Some(handle),
            Err(e) => {
                // Dropping the session stops the decoder thread
                return Err(Error::Worker(format!(
                    "Failed to spawn playback thread: {}",
                    e
                )));
            }
        }

        info!(
            "Streaming session started (prebuffer={} chunks, chunk={}ms)",
            config.prebuffer_chunks, config.chunk_ms
        );
        Ok(session)
    }

    /// Entry point for the transport
    pub fn ingest(&self) -> IngestHandle {
        IngestHandle::new(Arc::clone(&self.buffer), Arc::clone(&self.stats))
    }

    /// Graceful end: decode what is left, play every queued chunk, then stop.
    pub fn finish_input(&self) {
        self.buffer.finish();
    }

    /// Immediate stop: wakes every wait and aborts the current render.
    pub fn shutdown(&self) {
        self.teardown.trigger();
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Chunks currently waiting for playback
    pub fn queued_chunks(&self) -> usize {
        self.queue.len()
    }

    /// Compressed bytes currently buffered
    pub fn buffered_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// True once both worker threads have exited
    pub fn is_finished(&self) -> bool {
        let decoder_done = self
            .decoder_thread
            .as_ref()
            .map_or(true, |h| h.is_finished());
        let playback_done = self
            .playback_thread
            .as_ref()
            .map_or(true, |h| h.is_finished());
        decoder_done && playback_done
    }

    /// Wait for both workers to exit.
    ///
    /// Returns the playback stage's fatal error or a worker panic, if any.
    /// Either one has already shut the rest of the session down, so this
    /// never blocks on a stage that cannot make progress.
    pub fn wait(mut self) -> Result<()> {
        self.join_workers()
    }

    fn join_workers(&mut self) -> Result<()> {
        let mut result = Ok(());

        if let Some(handle) = self.playback_thread.take() {
            result = match handle.join() {
                Ok(outcome) => outcome,
                Err(_) => Err(Error::Worker("Playback thread panicked".to_string())),
            };
            if result.is_err() {
                self.shutdown();
            }
        }

        if let Some(handle) = self.decoder_thread.take() {
            if handle.join().is_err() {
                warn!("Decoder thread panicked");
                if result.is_ok() {
                    result = Err(Error::Worker("Decoder thread panicked".to_string()));
                }
            }
        }

        let stats = self.stats.snapshot();
        info!(
            "Session ended: fragments={}, bytes={}, decode attempts={} (failed={}, empty={}), \
             chunks published={}, rendered={}",
            stats.fragments_received,
            stats.bytes_received,
            stats.decode_attempts,
            stats.decode_failures,
            stats.empty_decodes,
            stats.chunks_published,
            stats.chunks_rendered
        );

        result
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.decoder_thread.is_some() || self.playback_thread.is_some() {
            self.shutdown();
            let _ = self.join_workers();
        }
    }
}
