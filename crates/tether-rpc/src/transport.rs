//! Outbound side of the transport boundary.
//!
//! The dispatch layer never touches sockets. Each session owns a
//! [`FrameSink`] that queues frames for the connection's writer.

use parking_lot::Mutex;

/// A frame queued for a connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
}

/// Errors writing to a connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection has closed.
    #[error("connection closed")]
    Closed,
    /// The outbound queue is full and the frame was dropped.
    #[error("outbound queue full")]
    Full,
    /// The payload could not be serialized.
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Non-blocking writer for one connection.
pub trait FrameSink: Send + Sync {
    /// Queue a frame. Never waits for the socket.
    fn send(&self, frame: Outbound) -> Result<(), TransportError>;

    /// Whether the connection can still accept frames.
    fn is_open(&self) -> bool {
        true
    }
}

/// A sink that records frames in memory.
///
/// Used in place of a socket by tests and by embedders that drive sessions
/// without a network.
#[derive(Debug, Default)]
pub struct MemorySink {
    frames: Mutex<Vec<Outbound>>,
    closed: std::sync::atomic::AtomicBool,
}

impl MemorySink {
    /// Create an empty, open sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All frames written so far.
    pub fn frames(&self) -> Vec<Outbound> {
        self.frames.lock().clone()
    }

    /// Text frames written so far.
    pub fn texts(&self) -> Vec<String> {
        self.frames
            .lock()
            .iter()
            .filter_map(|f| match f {
                Outbound::Text(t) => Some(t.clone()),
                Outbound::Binary(_) => None,
            })
            .collect()
    }

    /// Text frames parsed as JSON.
    pub fn json_frames(&self) -> Vec<serde_json::Value> {
        self.texts()
            .iter()
            .filter_map(|t| serde_json::from_str(t).ok())
            .collect()
    }

    /// Remove and return all recorded frames.
    pub fn drain(&self) -> Vec<Outbound> {
        std::mem::take(&mut *self.frames.lock())
    }

    /// Reject all further writes.
    pub fn close(&self) {
        self.closed.store(true, std::sync::atomic::Ordering::Release);
    }
}

impl FrameSink for MemorySink {
    fn send(&self, frame: Outbound) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        self.frames.lock().push(frame);
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.closed.load(std::sync::atomic::Ordering::Acquire)
    }
}
