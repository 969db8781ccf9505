//! Compressed byte accumulator between the transport and the decoder stage
//!
//! Two roles touch it: the ingest entry point appends, the decoder stage trims.
//! Every operation runs under one lock, so a trim can never interleave with an
//! append and lose or duplicate bytes. Waiters sleep on a single condition
//! variable that every state change notifies.

use parking_lot::{Condvar, Mutex};
use tracing::trace;

#[derive(Debug, Default)]
struct BufferState {
    bytes: Vec<u8>,
    /// Bytes ever appended (monotonic, survives trims)
    total_appended: u64,
    /// Transport reported end of input
    input_ended: bool,
    /// Session shut down
    closed: bool,
}

/// Why a wait on the buffer returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferWait {
    /// Predicate satisfied; carries the current length
    Ready(usize),
    /// Predicate not satisfied and no more input will arrive
    InputEnded,
    /// Session is shutting down
    Shutdown,
}

/// Immutable copy of the buffer taken for one decode attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub bytes: Vec<u8>,
    /// `total_appended` at the moment the copy was taken
    pub total_appended: u64,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Thread-safe growable byte store
#[derive(Debug, Default)]
pub struct IngestBuffer {
    state: Mutex<BufferState>,
    changed: Condvar,
}

impl IngestBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add bytes to the tail and wake all waiters. Ignored after shutdown.
    pub fn append(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }

        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.bytes.extend_from_slice(bytes);
        state.total_appended += bytes.len() as u64;
        trace!(
            "Appended {} bytes (buffered={})",
            bytes.len(),
            state.bytes.len()
        );
        drop(state);

        self.changed.notify_all();
    }

    /// Block until length >= `min_len`. `min_len` is compared, not consumed.
    pub fn await_min_size(&self, min_len: usize) -> BufferWait {
        let mut state = self.state.lock();
        self.changed.wait_while(&mut state, |s| {
            !s.closed && !s.input_ended && s.bytes.len() < min_len
        });
        Self::outcome(&state, state.bytes.len() >= min_len)
    }

    /// Block until length > `observed_len`, i.e. until genuinely new bytes arrive.
    pub fn await_growth(&self, observed_len: usize) -> BufferWait {
        let mut state = self.state.lock();
        self.changed.wait_while(&mut state, |s| {
            !s.closed && !s.input_ended && s.bytes.len() <= observed_len
        });
        Self::outcome(&state, state.bytes.len() > observed_len)
    }

    fn outcome(state: &BufferState, satisfied: bool) -> BufferWait {
        if state.closed {
            BufferWait::Shutdown
        } else if satisfied {
            BufferWait::Ready(state.bytes.len())
        } else {
            BufferWait::InputEnded
        }
    }

    /// Copy of the current contents; the buffer is not modified
    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.lock();
        Snapshot {
            bytes: state.bytes.clone(),
            total_appended: state.total_appended,
        }
    }

    /// Replace contents with the last `keep` bytes (unchanged if len <= keep)
    pub fn retain_tail(&self, keep: usize) {
        let mut state = self.state.lock();
        let len = state.bytes.len();
        if len > keep {
            state.bytes.drain(..len - keep);
        }
    }

    /// Drop the first `decoded_len` bytes except their last `keep`.
    ///
    /// Bytes appended after the decoded prefix was snapshotted are kept
    /// untouched, so nothing that has not been decoded is ever discarded.
    pub fn retain_decoded_tail(&self, decoded_len: usize, keep: usize) {
        let mut state = self.state.lock();
        let decoded_len = decoded_len.min(state.bytes.len());
        if decoded_len > keep {
            state.bytes.drain(..decoded_len - keep);
        }
    }

    /// Empty the buffer entirely
    pub fn clear(&self) {
        self.state.lock().bytes.clear();
    }

    /// Mark the end of input and wake waiters
    pub fn finish(&self) {
        self.state.lock().input_ended = true;
        self.changed.notify_all();
    }

    /// Shut down: every current and future wait returns `Shutdown`
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.changed.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes ever appended
    pub fn total_appended(&self) -> u64 {
        self.state.lock().total_appended
    }

    pub fn input_ended(&self) -> bool {
        self.state.lock().input_ended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_append_and_snapshot() {
        let buffer = IngestBuffer::new();
        buffer.append(b"abc");
        buffer.append(b"");
        buffer.append(b"de");

        let snap = buffer.snapshot();
        assert_eq!(snap.bytes, b"abcde");
        assert_eq!(snap.total_appended, 5);

        // Snapshot is a copy
        buffer.append(b"f");
        assert_eq!(snap.len(), 5);
        assert_eq!(buffer.len(), 6);
    }

    #[test]
    fn test_retain_tail() {
        let buffer = IngestBuffer::new();
        buffer.append(b"0123456789");

        buffer.retain_tail(20);
        assert_eq!(buffer.snapshot().bytes, b"0123456789");

        buffer.retain_tail(4);
        assert_eq!(buffer.snapshot().bytes, b"6789");
        assert_eq!(buffer.total_appended(), 10);

        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_retain_decoded_tail_keeps_new_bytes() {
        let buffer = IngestBuffer::new();
        buffer.append(b"0123456789");
        let snap = buffer.snapshot();

        // Arrived while the snapshot was being decoded
        buffer.append(b"abc");

        buffer.retain_decoded_tail(snap.len(), 3);
        assert_eq!(buffer.snapshot().bytes, b"789abc");
    }

    #[test]
    fn test_await_min_size_wakes_on_append() {
        let buffer = Arc::new(IngestBuffer::new());
        let waiter = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || buffer.await_min_size(8))
        };

        buffer.append(&[0; 4]);
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());

        buffer.append(&[0; 4]);
        assert_eq!(waiter.join().unwrap(), BufferWait::Ready(8));
    }

    #[test]
    fn test_await_growth_requires_new_bytes() {
        let buffer = Arc::new(IngestBuffer::new());
        buffer.append(&[1; 10]);

        let waiter = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || buffer.await_growth(10))
        };

        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());

        buffer.append(&[2]);
        assert_eq!(waiter.join().unwrap(), BufferWait::Ready(11));
    }

    #[test]
    fn test_finish_and_close_release_waiters() {
        let buffer = Arc::new(IngestBuffer::new());
        buffer.append(&[0; 3]);

        let waiter = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || buffer.await_min_size(100))
        };
        buffer.finish();
        assert_eq!(waiter.join().unwrap(), BufferWait::InputEnded);

        // Satisfied predicate still reports Ready after end of input
        assert_eq!(buffer.await_min_size(3), BufferWait::Ready(3));

        buffer.close();
        assert_eq!(buffer.await_min_size(1), BufferWait::Shutdown);
        buffer.append(&[1]);
        assert_eq!(buffer.len(), 3);
    }
}
