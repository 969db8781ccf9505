//! Pipeline counters
//!
//! Written by all three contexts with relaxed atomics; read as a copyable
//! snapshot for logging and tests.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PipelineStats {
    fragments_received: AtomicU64,
    bytes_received: AtomicU64,
    decode_attempts: AtomicU64,
    decode_failures: AtomicU64,
    empty_decodes: AtomicU64,
    chunks_published: AtomicU64,
    chunks_rendered: AtomicU64,
}

/// Point-in-time copy of `PipelineStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub fragments_received: u64,
    pub bytes_received: u64,
    pub decode_attempts: u64,
    pub decode_failures: u64,
    pub empty_decodes: u64,
    pub chunks_published: u64,
    pub chunks_rendered: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_fragment(&self, len: usize) {
        self.fragments_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_attempt(&self) {
        self.decode_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_empty(&self) {
        self.empty_decodes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_published(&self) {
        self.chunks_published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rendered(&self) {
        self.chunks_rendered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            fragments_received: self.fragments_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            decode_attempts: self.decode_attempts.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            empty_decodes: self.empty_decodes.load(Ordering::Relaxed),
            chunks_published: self.chunks_published.load(Ordering::Relaxed),
            chunks_rendered: self.chunks_rendered.load(Ordering::Relaxed),
        }
    }
}
