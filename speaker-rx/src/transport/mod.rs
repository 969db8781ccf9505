//! Byte sources that feed a session
//!
//! Transports are thin adapters: they only call [`IngestHandle::on_fragment`]
//! and [`IngestHandle::end_of_input`]. Both run on the tokio runtime; the
//! pipeline itself runs on its own threads.
//!
//! [`IngestHandle::on_fragment`]: crate::pipeline::IngestHandle::on_fragment
//! [`IngestHandle::end_of_input`]: crate::pipeline::IngestHandle::end_of_input

pub mod replay;
pub mod tcp;

pub use replay::ReplaySource;
pub use tcp::TcpSource;

/// ATT header bytes carried by every notification
pub const ATT_HEADER_BYTES: usize = 3;

/// Payloads this small are never sent; the sender skips the whole buffer
pub const MIN_NOTIFICATION_PAYLOAD: usize = 4;

/// Payload bytes per notification for a negotiated MTU.
///
/// Returns 0 (nothing is sent) when `mtu - 3` leaves 3 bytes or fewer.
pub fn notification_payload_size(mtu: u16) -> usize {
    let payload = (mtu as usize).saturating_sub(ATT_HEADER_BYTES);
    if payload < MIN_NOTIFICATION_PAYLOAD {
        0
    } else {
        payload
    }
}

/// What a transport delivered before it finished
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportSummary {
    pub fragments: u64,
    pub bytes: u64,
}

impl TransportSummary {
    pub(crate) fn record(&mut self, len: usize) {
        self.fragments += 1;
        self.bytes += len as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_size_follows_mtu() {
        assert_eq!(notification_payload_size(247), 244);
        assert_eq!(notification_payload_size(23), 20);
        assert_eq!(notification_payload_size(7), 4);
    }

    #[test]
    fn test_tiny_mtu_sends_nothing() {
        for mtu in 0..=6 {
            assert_eq!(notification_payload_size(mtu), 0, "mtu {}", mtu);
        }
    }
}
