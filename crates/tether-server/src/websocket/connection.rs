//! Outbound queue for one WebSocket connection.

use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use tether_core::ConnectionId;
use tether_rpc::{FrameSink, Outbound, TransportError};
use tokio::sync::mpsc;
use tracing::warn;

use crate::metrics::WS_SEND_DROPS_TOTAL;

/// [`FrameSink`] over a bounded channel drained by the socket writer task.
///
/// Sending never waits: a full queue drops the frame and counts it.
pub struct ChannelSink {
    connection: ConnectionId,
    tx: mpsc::Sender<Outbound>,
    dropped: AtomicU64,
}

impl ChannelSink {
    /// Create a sink and the receiver its writer task drains.
    pub fn new(connection: ConnectionId, capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let sink = Self {
            connection,
            tx,
            dropped: AtomicU64::new(0),
        };
        (sink, rx)
    }

    /// Frames dropped because the queue was full.
    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ChannelSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSink")
            .field("connection", &self.connection)
            .field("dropped", &self.drop_count())
            .finish_non_exhaustive()
    }
}

impl FrameSink for ChannelSink {
    fn send(&self, frame: Outbound) -> Result<(), TransportError> {
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
                counter!(WS_SEND_DROPS_TOTAL).increment(1);
                warn!(connection = %self.connection, "send queue full, dropping frame");
                Err(TransportError::Full)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(TransportError::Closed),
        }
    }

    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn frames_arrive_in_order() {
        let (sink, mut rx) = ChannelSink::new(ConnectionId::new(), 8);
        for i in 0..5 {
            sink.send(Outbound::Text(format!("msg_{i}"))).unwrap();
        }
        for i in 0..5 {
            assert_eq!(rx.recv().await.unwrap(), Outbound::Text(format!("msg_{i}")));
        }
    }

    #[test]
    fn full_queue_drops_and_counts() {
        let (sink, _rx) = ChannelSink::new(ConnectionId::new(), 1);
        sink.send(Outbound::Text("first".into())).unwrap();
        assert_matches!(sink.send(Outbound::Text("second".into())), Err(TransportError::Full));
        assert_matches!(sink.send(Outbound::Binary(vec![1])), Err(TransportError::Full));
        assert_eq!(sink.drop_count(), 2);
        assert!(sink.is_open());
    }

    #[test]
    fn closed_receiver_is_closed() {
        let (sink, rx) = ChannelSink::new(ConnectionId::new(), 4);
        drop(rx);
        assert!(!sink.is_open());
        assert_matches!(sink.send(Outbound::Text("x".into())), Err(TransportError::Closed));
        assert_eq!(sink.drop_count(), 0);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let (sink, _rx) = ChannelSink::new(ConnectionId::new(), 0);
        sink.send(Outbound::Text("ok".into())).unwrap();
    }
}
