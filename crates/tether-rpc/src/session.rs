//! Per-connection session state.
//!
//! A [`Session`] lives exactly as long as its connection. The owning service
//! creates it on connect and removes it on disconnect; handlers only ever see
//! a borrowed `&Session`.
//!
//! State machine: `Anonymous` ⇄ `Authenticated`, then `Disconnected`
//! (terminal). The `sid` is fixed at construction and survives any number of
//! login/logout cycles.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tether_core::{ConnectionId, Epoch, SessionId};
use tracing::debug;

use crate::errors::RpcError;
use crate::pending::{PendingCall, PendingCalls};
use crate::transport::{FrameSink, Outbound, TransportError};
use crate::types::RpcRequest;

/// Authenticated identity attached to a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// Numeric user id, always positive.
    pub uid: i64,
    /// Identity string the tokens are bound to.
    pub name: String,
    /// Access token issued at login.
    pub token: String,
}

/// Lifecycle state of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Connected, no identity (uid 0).
    Anonymous,
    /// Connected with an identity (uid > 0).
    Authenticated,
    /// Connection gone; the session accepts no more work.
    Disconnected,
}

/// State for one live connection.
pub struct Session {
    sid: SessionId,
    connection: ConnectionId,
    service: Arc<str>,
    peer: Option<SocketAddr>,
    connected_at: Epoch,
    epoch: AtomicI64,
    identity: RwLock<Option<Identity>>,
    closed: AtomicBool,
    sink: Arc<dyn FrameSink>,
    pending: PendingCalls,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("sid", &self.sid)
            .field("connection", &self.connection)
            .field("service", &self.service)
            .field("uid", &self.uid())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create an anonymous session with a fresh `sid`.
    pub fn new(
        connection: ConnectionId,
        service: Arc<str>,
        peer: Option<SocketAddr>,
        sink: Arc<dyn FrameSink>,
    ) -> Self {
        let now = Epoch::now();
        Self {
            sid: SessionId::new(),
            connection,
            service,
            peer,
            connected_at: now,
            epoch: AtomicI64::new(now.as_millis()),
            identity: RwLock::new(None),
            closed: AtomicBool::new(false),
            sink,
            pending: PendingCalls::new(),
        }
    }

    /// Process-local session identifier.
    pub fn sid(&self) -> &SessionId {
        &self.sid
    }

    /// Transport connection this session is bound to.
    pub fn connection(&self) -> &ConnectionId {
        &self.connection
    }

    /// Name of the owning service.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Remote address, when the transport knows it.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// When the connection was accepted.
    pub fn connected_at(&self) -> Epoch {
        self.connected_at
    }

    // ── Activity ────────────────────────────────────────────────────

    /// Record activity now and return the new epoch.
    pub fn touch(&self) -> Epoch {
        let now = Epoch::now();
        let _ = self.epoch.fetch_max(now.as_millis(), Ordering::AcqRel);
        now
    }

    /// Last recorded activity.
    pub fn epoch(&self) -> Epoch {
        Epoch::from_millis(self.epoch.load(Ordering::Acquire))
    }

    // ── Authentication ──────────────────────────────────────────────

    /// Authenticated user id, or 0 when anonymous.
    pub fn uid(&self) -> i64 {
        self.identity.read().as_ref().map_or(0, |id| id.uid)
    }

    /// Current identity, if authenticated.
    pub fn identity(&self) -> Option<Identity> {
        self.identity.read().clone()
    }

    /// Whether a user is logged in on this session.
    pub fn is_authenticated(&self) -> bool {
        self.identity.read().is_some()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        if self.is_closed() {
            SessionState::Disconnected
        } else if self.is_authenticated() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        }
    }

    /// Move to `Authenticated`. Replaces any previous identity.
    pub fn authenticate(&self, uid: i64, name: &str, token: &str) -> Result<(), RpcError> {
        if uid <= 0 {
            return Err(RpcError::InvalidParams {
                message: format!("uid must be positive, got {uid}"),
            });
        }
        if self.is_closed() {
            return Err(RpcError::Internal {
                message: format!("session {} is disconnected", self.sid),
            });
        }
        *self.identity.write() = Some(Identity {
            uid,
            name: name.to_string(),
            token: token.to_string(),
        });
        debug!(sid = %self.sid, uid, "session authenticated");
        Ok(())
    }

    /// Return to `Anonymous`. Returns the identity that was cleared.
    pub fn logout(&self) -> Option<Identity> {
        let previous = self.identity.write().take();
        if let Some(ref id) = previous {
            debug!(sid = %self.sid, uid = id.uid, "session logged out");
        }
        previous
    }

    /// The authenticated uid, or an access-denied error.
    pub fn require_auth(&self) -> Result<i64, RpcError> {
        match self.uid() {
            0 => Err(RpcError::access_denied()),
            uid => Ok(uid),
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Mark the session disconnected. Idempotent.
    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Whether the session has been disconnected.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    // ── Outbound ────────────────────────────────────────────────────

    /// Queue a text frame.
    pub fn send_text(&self, text: String) -> Result<(), TransportError> {
        self.send(Outbound::Text(text))
    }

    /// Queue a binary frame.
    pub fn send_binary(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        self.send(Outbound::Binary(bytes))
    }

    /// Serialize `value` and queue it as a text frame.
    pub fn send_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), TransportError> {
        let text = serde_json::to_string(value)?;
        self.send_text(text)
    }

    fn send(&self, frame: Outbound) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.sink.send(frame)
    }

    /// Send a request to the peer and track it until the reply arrives.
    ///
    /// Returns the correlation id. A reply carrying this id is routed to the
    /// response handler registered for `method` even if it omits `method`.
    pub fn call(&self, method: &str, params: Value) -> Result<i64, TransportError> {
        let id = self.pending.register(method);
        let request = RpcRequest::new(id, method, params);
        if let Err(e) = self.send_json(&request) {
            let _ = self.pending.take(id);
            return Err(e);
        }
        Ok(id)
    }

    /// Outstanding outbound calls.
    pub fn pending(&self) -> &PendingCalls {
        &self.pending
    }

    /// Remove the outstanding call with `id`, if any.
    pub fn resolve_pending(&self, id: i64) -> Option<PendingCall> {
        self.pending.take(id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
