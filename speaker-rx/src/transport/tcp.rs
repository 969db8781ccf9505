//! Receive a compressed stream over a single TCP connection
//!
//! Each successful read becomes one fragment, so fragment sizes follow
//! whatever the sender and the kernel happen to produce. EOF ends the input.

use crate::error::{Error, Result};
use crate::pipeline::IngestHandle;
use crate::transport::TransportSummary;
use std::net::SocketAddr;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Read buffer size; a read returns at most this many bytes
const READ_BUFFER_BYTES: usize = 4096;

pub struct TcpSource {
    listener: TcpListener,
}

impl TcpSource {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Transport(format!("Failed to bind {}: {}", addr, e)))?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept one sender and forward its bytes until it disconnects.
    ///
    /// The session input is finished on EOF and also when the connection
    /// fails mid-stream, so whatever arrived is still played.
    pub async fn run(self, ingest: IngestHandle) -> Result<TransportSummary> {
        info!("Waiting for sender on {}", self.local_addr()?);

        let (mut stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(|e| Error::Transport(format!("Accept failed: {}", e)))?;
        info!("Sender connected from {}", peer);

        let mut summary = TransportSummary::default();
        let mut buf = vec![0u8; READ_BUFFER_BYTES];

        let outcome = loop {
            match stream.read(&mut buf).await {
                Ok(0) => {
                    debug!("Sender {} closed the connection", peer);
                    break Ok(());
                }
                Ok(n) => {
                    ingest.on_fragment(&buf[..n]);
                    summary.record(n);
                }
                Err(e) => {
                    warn!("Read from {} failed: {}", peer, e);
                    break Err(Error::Transport(format!("Read failed: {}", e)));
                }
            }
        };

        ingest.end_of_input();
        info!(
            "Connection ended: {} fragments, {} bytes",
            summary.fragments, summary.bytes
        );
        outcome.map(|_| summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ingest_buffer::IngestBuffer;
    use crate::pipeline::stats::PipelineStats;
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn test_forwards_bytes_until_eof() {
        let buffer = Arc::new(IngestBuffer::new());
        let stats = Arc::new(PipelineStats::new());
        let ingest = IngestHandle::new(Arc::clone(&buffer), Arc::clone(&stats));

        let source = TcpSource::bind("127.0.0.1:0").await.unwrap();
        let addr = source.local_addr().unwrap();
        let receiver = tokio::spawn(source.run(ingest));

        let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 256) as u8).collect();
        let mut sender = TcpStream::connect(addr).await.unwrap();
        for part in payload.chunks(300) {
            sender.write_all(part).await.unwrap();
        }
        sender.shutdown().await.unwrap();
        drop(sender);

        let summary = receiver.await.unwrap().unwrap();
        assert_eq!(summary.bytes, 10_000);
        assert!(summary.fragments >= 3);
        assert_eq!(stats.snapshot().bytes_received, 10_000);
        assert_eq!(buffer.snapshot().bytes, payload);
        assert!(buffer.input_ended());
    }

    #[tokio::test]
    async fn test_bind_failure_is_transport_error() {
        let result = TcpSource::bind("not-an-address").await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }
}
