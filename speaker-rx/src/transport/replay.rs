//! Replay a captured compressed stream as notification-sized fragments

use crate::error::{Error, Result};
use crate::pipeline::IngestHandle;
use crate::transport::{notification_payload_size, TransportSummary};
use std::path::Path;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

pub struct ReplaySource {
    data: Vec<u8>,
    fragment_size: usize,
    fragment_interval: Duration,
}

impl ReplaySource {
    pub fn new(data: Vec<u8>, mtu: u16, fragment_interval: Duration) -> Self {
        Self {
            data,
            fragment_size: notification_payload_size(mtu),
            fragment_interval,
        }
    }

    /// Read the whole file up front; replay never touches the disk again.
    pub async fn open(path: &Path, mtu: u16, fragment_interval: Duration) -> Result<Self> {
        let data = tokio::fs::read(path).await.map_err(|e| {
            Error::Transport(format!("Failed to read {}: {}", path.display(), e))
        })?;
        debug!("Loaded {} bytes from {}", data.len(), path.display());
        Ok(Self::new(data, mtu, fragment_interval))
    }

    pub fn fragment_size(&self) -> usize {
        self.fragment_size
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Deliver every fragment in order, then finish the session input.
    pub async fn run(self, ingest: IngestHandle) -> TransportSummary {
        let mut summary = TransportSummary::default();

        if self.fragment_size == 0 {
            // The sender transmits nothing when the payload is 3 bytes or less
            warn!("MTU leaves too little room for payload, nothing will be sent");
            ingest.end_of_input();
            return summary;
        }

        info!(
            "Replaying {} bytes as {}-byte fragments every {:?}",
            self.data.len(),
            self.fragment_size,
            self.fragment_interval
        );

        let mut pacing = if self.fragment_interval.is_zero() {
            None
        } else {
            let mut ticker = interval(self.fragment_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Some(ticker)
        };

        for fragment in self.data.chunks(self.fragment_size) {
            if let Some(ticker) = pacing.as_mut() {
                ticker.tick().await;
            }
            ingest.on_fragment(fragment);
            summary.record(fragment.len());
        }

        ingest.end_of_input();
        info!(
            "Replay complete: {} fragments, {} bytes",
            summary.fragments, summary.bytes
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ingest_buffer::IngestBuffer;
    use crate::pipeline::stats::PipelineStats;
    use std::sync::Arc;

    fn handle() -> (IngestHandle, Arc<IngestBuffer>, Arc<PipelineStats>) {
        let buffer = Arc::new(IngestBuffer::new());
        let stats = Arc::new(PipelineStats::new());
        let ingest = IngestHandle::new(Arc::clone(&buffer), Arc::clone(&stats));
        (ingest, buffer, stats)
    }

    #[tokio::test]
    async fn test_replay_splits_by_mtu() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        let (ingest, buffer, stats) = handle();

        let summary = ReplaySource::new(data.clone(), 247, Duration::ZERO)
            .run(ingest)
            .await;

        // 4 full 244-byte fragments plus a 24-byte remainder
        assert_eq!(summary.fragments, 5);
        assert_eq!(summary.bytes, 1000);
        assert_eq!(stats.snapshot().fragments_received, 5);
        assert_eq!(buffer.snapshot().bytes, data);
        assert!(buffer.input_ended());
    }

    #[tokio::test]
    async fn test_replay_sends_nothing_for_tiny_mtu() {
        let (ingest, buffer, stats) = handle();

        // 6 - 3 leaves a 3-byte payload, below what the sender will transmit
        let summary = ReplaySource::new(vec![1, 2, 3, 4], 6, Duration::ZERO)
            .run(ingest)
            .await;

        assert_eq!(summary, TransportSummary::default());
        assert_eq!(stats.snapshot().bytes_received, 0);
        assert!(buffer.is_empty());
        assert!(buffer.input_ended());
    }

    #[tokio::test]
    async fn test_replay_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, &[7u8; 50]).unwrap();

        let source = ReplaySource::open(file.path(), 23, Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(source.len(), 50);
        assert_eq!(source.fragment_size(), 20);

        let (ingest, buffer, _) = handle();
        let summary = source.run(ingest).await;
        assert_eq!(summary.fragments, 3);
        assert_eq!(buffer.len(), 50);
    }

    #[tokio::test]
    async fn test_replay_missing_file() {
        let result =
            ReplaySource::open(Path::new("/nonexistent/stream.mp3"), 247, Duration::ZERO).await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }
}
