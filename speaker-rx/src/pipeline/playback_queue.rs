//! FIFO of decoded chunks between the decoder stage and the playback stage
//!
//! Insertion order is presentation order: chunks are never reordered or
//! dropped once published, and the only way out is `take`.
//! When a capacity is set, `publish` blocks while the queue is full so a
//! stalled playback stage cannot make the queue grow without bound.

use crate::audio::types::DecodedChunk;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use tracing::debug;

#[derive(Debug, Default)]
struct QueueState {
    chunks: VecDeque<DecodedChunk>,
    /// No more chunks will be published
    end_of_stream: bool,
    /// Session shut down
    closed: bool,
}

/// Why `await_ready` returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueWait {
    /// At least one chunk can be taken
    Ready,
    /// Stream ended and every chunk has been taken
    Drained,
    /// Session is shutting down
    Shutdown,
}

#[derive(Debug)]
pub struct PlaybackQueue {
    state: Mutex<QueueState>,
    changed: Condvar,
    prebuffer_chunks: usize,
    capacity: Option<usize>,
}

impl PlaybackQueue {
    /// `prebuffer_chunks`: occupancy required before the first chunk plays.
    /// `capacity`: maximum queued chunks, `None` for unbounded.
    pub fn new(prebuffer_chunks: usize, capacity: Option<usize>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            changed: Condvar::new(),
            prebuffer_chunks: prebuffer_chunks.max(1),
            capacity,
        }
    }

    /// Append to the tail and wake waiters.
    ///
    /// Blocks while the queue is at capacity. Returns false only if the
    /// session shut down before the chunk could be queued.
    pub fn publish(&self, chunk: DecodedChunk) -> bool {
        let mut state = self.state.lock();
        if let Some(capacity) = self.capacity {
            self.changed
                .wait_while(&mut state, |s| !s.closed && s.chunks.len() >= capacity);
        }
        if state.closed {
            return false;
        }
        state.chunks.push_back(chunk);
        drop(state);

        self.changed.notify_all();
        true
    }

    /// Block until playback may take a chunk.
    ///
    /// Before playback has started this needs `prebuffer_chunks` queued;
    /// afterwards one is enough. Once the stream has ended any remaining
    /// chunk is ready so short streams still play out.
    pub fn await_ready(&self, started: bool) -> QueueWait {
        let needed = if started { 1 } else { self.prebuffer_chunks };

        let mut state = self.state.lock();
        self.changed.wait_while(&mut state, |s| {
            !s.closed && !s.end_of_stream && s.chunks.len() < needed
        });

        if state.closed {
            QueueWait::Shutdown
        } else if state.chunks.len() >= needed || (state.end_of_stream && !state.chunks.is_empty()) {
            QueueWait::Ready
        } else {
            QueueWait::Drained
        }
    }

    /// Remove and return the head chunk
    pub fn take(&self) -> Option<DecodedChunk> {
        let chunk = self.state.lock().chunks.pop_front();
        if chunk.is_some() {
            // Wake a publisher blocked on capacity
            self.changed.notify_all();
        }
        chunk
    }

    /// No more chunks will be published
    pub fn mark_end_of_stream(&self) {
        let mut state = self.state.lock();
        state.end_of_stream = true;
        debug!("Playback queue end of stream ({} chunks left)", state.chunks.len());
        drop(state);
        self.changed.notify_all();
    }

    /// Shut down: wakes every waiter; later publishes are refused
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.changed.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn prebuffer_chunks(&self) -> usize {
        self.prebuffer_chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn chunk(tag: f32) -> DecodedChunk {
        DecodedChunk::new(vec![tag; 4], 1000, 1)
    }

    #[test]
    fn test_fifo_order() {
        let queue = PlaybackQueue::new(1, None);
        for i in 0..5 {
            assert!(queue.publish(chunk(i as f32)));
        }
        for i in 0..5 {
            assert_eq!(queue.take().unwrap().samples()[0], i as f32);
        }
        assert!(queue.take().is_none());
    }

    #[test]
    fn test_prebuffer_wait_before_start() {
        let queue = Arc::new(PlaybackQueue::new(3, None));
        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.await_ready(false))
        };

        queue.publish(chunk(0.0));
        queue.publish(chunk(1.0));
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());

        queue.publish(chunk(2.0));
        assert_eq!(waiter.join().unwrap(), QueueWait::Ready);
    }

    #[test]
    fn test_single_chunk_enough_after_start() {
        let queue = PlaybackQueue::new(4, None);
        queue.publish(chunk(0.0));
        assert_eq!(queue.await_ready(true), QueueWait::Ready);
    }

    #[test]
    fn test_end_of_stream_flushes_short_tail() {
        let queue = PlaybackQueue::new(4, None);
        queue.publish(chunk(0.0));
        queue.mark_end_of_stream();

        assert_eq!(queue.await_ready(false), QueueWait::Ready);
        assert!(queue.take().is_some());
        assert_eq!(queue.await_ready(true), QueueWait::Drained);
    }

    #[test]
    fn test_publish_blocks_at_capacity() {
        let queue = Arc::new(PlaybackQueue::new(1, Some(2)));
        queue.publish(chunk(0.0));
        queue.publish(chunk(1.0));

        let publisher = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.publish(chunk(2.0)))
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!publisher.is_finished());
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.take().unwrap().samples()[0], 0.0);
        assert!(publisher.join().unwrap());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_close_releases_blocked_publisher_and_reader() {
        let queue = Arc::new(PlaybackQueue::new(2, Some(1)));
        queue.publish(chunk(0.0));

        let publisher = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.publish(chunk(1.0)))
        };
        let reader = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.await_ready(false))
        };

        thread::sleep(Duration::from_millis(20));
        queue.close();

        assert!(!publisher.join().unwrap());
        assert_eq!(reader.join().unwrap(), QueueWait::Shutdown);
    }
}
