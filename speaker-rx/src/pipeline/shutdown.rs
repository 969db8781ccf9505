//! Session-wide shutdown signal
//!
//! Raising the token only flips the flag. The session pairs it with closing
//! the ingest buffer and playback queue so condition-variable waiters wake up;
//! code that sleeps outside those locks (the render call) polls `is_raised`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cloneable shutdown flag shared by every context of one session
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    raised: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Sleep for `duration` in short slices, returning early (false) if the
    /// token is raised meanwhile. Returns true when the full duration elapsed.
    pub fn sleep(&self, duration: Duration) -> bool {
        const SLICE: Duration = Duration::from_millis(5);

        let deadline = Instant::now() + duration;
        loop {
            if self.is_raised() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(SLICE));
        }
    }
}
