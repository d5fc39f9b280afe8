//! Per-connection socket loop.
//!
//! The reader handles inbound frames one at a time, in arrival order. A
//! writer task drains the outbound queue, pings the peer on an interval, and
//! closes the connection once the peer has been silent longer than the pong
//! timeout. Either side finishing stops the other.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, StreamExt};
use metrics::{counter, gauge};
use parking_lot::Mutex;
use tether_core::ConnectionId;
use tether_rpc::Outbound;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, trace};

use super::connection::ChannelSink;
use crate::config::ServerConfig;
use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};
use crate::service::Service;

/// Why a connection ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer sent Close or the stream ended.
    PeerClosed,
    /// Reading from the socket failed.
    ReadError,
    /// Writing to the socket failed.
    WriteError,
    /// Nothing heard from the peer within the pong timeout.
    Timeout,
    /// The server is shutting down.
    Shutdown,
    /// Every handle to the outbound queue was dropped.
    QueueClosed,
}

impl CloseReason {
    /// Label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PeerClosed => "peer_closed",
            Self::ReadError => "read_error",
            Self::WriteError => "write_error",
            Self::Timeout => "timeout",
            Self::Shutdown => "shutdown",
            Self::QueueClosed => "queue_closed",
        }
    }
}

/// Last time anything arrived from the peer.
#[derive(Debug)]
pub struct Liveness {
    last_seen: Mutex<Instant>,
}

impl Liveness {
    /// Start the clock now.
    pub fn new() -> Self {
        Self {
            last_seen: Mutex::new(Instant::now()),
        }
    }

    /// Record inbound activity.
    pub fn mark(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    /// Time since the last inbound activity.
    pub fn silent_for(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

/// Floor for the ping interval; `tokio::time::interval` rejects zero.
const MIN_PING_INTERVAL: Duration = Duration::from_millis(10);

/// Heartbeat settings for the writer.
#[derive(Clone, Copy, Debug)]
pub struct Heartbeat {
    /// Interval between pings.
    pub ping_interval: Duration,
    /// Close after this much silence.
    pub pong_timeout: Duration,
}

impl From<&ServerConfig> for Heartbeat {
    fn from(config: &ServerConfig) -> Self {
        Self {
            ping_interval: config.ping_interval,
            pong_timeout: config.pong_timeout,
        }
    }
}

/// Serve one upgraded socket for `service` until it closes.
pub async fn run_socket(
    socket: WebSocket,
    service: Arc<Service>,
    peer: Option<SocketAddr>,
    config: Arc<ServerConfig>,
    shutdown: CancellationToken,
) {
    let connection = ConnectionId::new();
    let span = info_span!("ws", service = %service.name(), connection = %connection);
    serve(socket, service, connection, peer, config, shutdown)
        .instrument(span)
        .await;
}

async fn serve(
    socket: WebSocket,
    service: Arc<Service>,
    connection: ConnectionId,
    peer: Option<SocketAddr>,
    config: Arc<ServerConfig>,
    shutdown: CancellationToken,
) {
    let (sink, rx) = ChannelSink::new(connection.clone(), config.send_queue_capacity);
    let _session = service.on_connect(connection.clone(), peer, Arc::new(sink));
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let (ws_tx, mut ws_rx) = socket.split();
    let liveness = Arc::new(Liveness::new());
    let stop = shutdown.child_token();

    let writer = {
        let liveness = liveness.clone();
        let stop = stop.clone();
        let heartbeat = Heartbeat::from(config.as_ref());
        tokio::spawn(
            async move {
                let reason = write_loop(ws_tx, rx, &liveness, heartbeat, &stop).await;
                stop.cancel();
                reason
            }
            .in_current_span(),
        )
    };

    let read_reason = loop {
        let next = tokio::select! {
            next = ws_rx.next() => next,
            () = stop.cancelled() => break None,
        };
        liveness.mark();
        match next {
            Some(Ok(Message::Text(text))) => {
                let _ = service.on_text(&connection, text.as_str().as_bytes()).await;
            }
            Some(Ok(Message::Binary(bytes))) => {
                let _ = service.on_binary(&connection, &bytes);
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => trace!("heartbeat"),
            Some(Ok(Message::Close(_))) | None => break Some(CloseReason::PeerClosed),
            Some(Err(e)) => {
                debug!(error = %e, "socket read failed");
                break Some(CloseReason::ReadError);
            }
        }
    };

    stop.cancel();
    let write_reason = writer.await.unwrap_or(CloseReason::WriteError);
    let reason = read_reason.unwrap_or(write_reason);

    let _ = service.on_disconnect(&connection);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    counter!(WS_DISCONNECTIONS_TOTAL, "reason" => reason.as_str()).increment(1);
    info!(reason = reason.as_str(), "connection closed");
}

/// Drain `rx` into `ws_tx` and keep the peer alive until `stop` fires.
pub async fn write_loop<S>(
    mut ws_tx: S,
    mut rx: mpsc::Receiver<Outbound>,
    liveness: &Liveness,
    heartbeat: Heartbeat,
    stop: &CancellationToken,
) -> CloseReason
where
    S: Sink<Message> + Unpin,
{
    let mut ping = tokio::time::interval(heartbeat.ping_interval.max(MIN_PING_INTERVAL));
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let _ = ping.tick().await;

    loop {
        tokio::select! {
            frame = rx.recv() => {
                let Some(frame) = frame else {
                    return CloseReason::QueueClosed;
                };
                if ws_tx.send(to_message(frame)).await.is_err() {
                    return CloseReason::WriteError;
                }
            }
            _ = ping.tick() => {
                if liveness.silent_for() > heartbeat.pong_timeout {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    return CloseReason::Timeout;
                }
                if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                    return CloseReason::WriteError;
                }
            }
            () = stop.cancelled() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                return CloseReason::Shutdown;
            }
        }
    }
}

fn to_message(frame: Outbound) -> Message {
    match frame {
        Outbound::Text(text) => Message::Text(text.into()),
        Outbound::Binary(bytes) => Message::Binary(bytes.into()),
    }
}
