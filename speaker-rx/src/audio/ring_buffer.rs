/// Lock-Free Ring Buffer for Output Samples
///
/// Carries interleaved device-format samples from the playback thread to the
/// cpal audio callback.
///
/// Design:
/// - Producer (playback thread): pushes one rendered chunk at a time
/// - Consumer (audio callback): pops without any locks, outputs silence on underrun
/// - Counters are shared atomics so the producer can observe the drain level

use ringbuf::{traits::*, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Counters shared by both halves
#[derive(Debug, Default)]
struct RingCounters {
    /// Callback found buffer empty while audio was expected
    underruns: AtomicU64,
    /// Samples handed to the device
    consumed: AtomicU64,
    /// Set once the first sample has been pushed
    started: AtomicBool,
}

/// Lock-free single-producer single-consumer sample ring
pub struct SampleRing {
    buffer: HeapRb<f32>,
    counters: Arc<RingCounters>,
}

impl SampleRing {
    /// Create a ring holding `capacity` interleaved samples
    pub fn new(capacity: usize) -> Self {
        debug!("Creating output sample ring with capacity: {} samples", capacity);
        Self {
            buffer: HeapRb::new(capacity.max(1)),
            counters: Arc::new(RingCounters::default()),
        }
    }

    /// Split into producer and consumer halves
    pub fn split(self) -> (SampleProducer, SampleConsumer) {
        let (prod, cons) = self.buffer.split();
        (
            SampleProducer {
                producer: prod,
                counters: Arc::clone(&self.counters),
            },
            SampleConsumer {
                consumer: cons,
                counters: self.counters,
            },
        )
    }
}

/// Producer half (playback thread)
pub struct SampleProducer {
    producer: ringbuf::HeapProd<f32>,
    counters: Arc<RingCounters>,
}

impl SampleProducer {
    /// Push as many samples as fit; returns how many were taken.
    pub fn push_slice(&mut self, samples: &[f32]) -> usize {
        let pushed = self.producer.push_slice(samples);
        if pushed > 0 {
            self.counters.started.store(true, Ordering::Release);
        }
        pushed
    }

    /// Samples still waiting to be played
    pub fn occupied_len(&self) -> usize {
        self.producer.occupied_len()
    }

    pub fn capacity(&self) -> usize {
        self.producer.capacity().into()
    }

    pub fn stats(&self) -> RingBufferStats {
        RingBufferStats {
            underruns: self.counters.underruns.load(Ordering::Relaxed),
            consumed: self.counters.consumed.load(Ordering::Relaxed),
            occupied: self.occupied_len(),
            capacity: self.capacity(),
        }
    }
}

/// Consumer half (audio callback)
pub struct SampleConsumer {
    consumer: ringbuf::HeapCons<f32>,
    counters: Arc<RingCounters>,
}

impl SampleConsumer {
    /// Fill `out` from the ring, padding with silence on underrun.
    ///
    /// Returns the number of real samples written.
    pub fn fill(&mut self, out: &mut [f32]) -> usize {
        let popped = self.consumer.pop_slice(out);
        out[popped..].iter_mut().for_each(|s| *s = 0.0);

        self.counters
            .consumed
            .fetch_add(popped as u64, Ordering::Relaxed);

        if popped < out.len() && self.counters.started.load(Ordering::Acquire) {
            let count = self.counters.underruns.fetch_add(1, Ordering::Relaxed) + 1;
            // Log every 1000th underrun to avoid spam; gaps between chunks are expected
            if count % 1000 == 0 {
                trace!("Output ring underrun (total: {})", count);
            }
        }

        popped
    }
}

/// Ring buffer statistics
#[derive(Debug, Clone, Copy)]
pub struct RingBufferStats {
    /// Callbacks that found fewer samples than requested after start
    pub underruns: u64,

    /// Samples handed to the device so far
    pub consumed: u64,

    /// Samples still queued
    pub occupied: usize,

    /// Capacity in samples
    pub capacity: usize,
}
