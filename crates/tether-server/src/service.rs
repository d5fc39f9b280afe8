//! A named RPC service bound to a transport.
//!
//! A [`Service`] owns its method table, dispatcher, live sessions, and
//! middleware chains. The transport adapter drives it through four lifecycle
//! callbacks: [`on_connect`](Service::on_connect),
//! [`on_text`](Service::on_text), [`on_binary`](Service::on_binary) and
//! [`on_disconnect`](Service::on_disconnect).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use metrics::{counter, gauge};
use parking_lot::RwLock;
use serde_json::Value;
use tether_core::{ConnectionId, SessionId};
use tether_rpc::{
    DEFAULT_HANDLER_TIMEOUT, Dispatch, Dispatcher, FrameSink, MethodHandler, MethodTable,
    Middleware, RegistryError, ResponseHandler, Session,
};
use tracing::{debug, info, warn};

use crate::errors::ServiceError;
use crate::metrics::{SESSIONS_ACTIVE, SESSIONS_OPENED_TOTAL};

/// Options applied when a service is registered.
#[derive(Clone, Debug)]
pub struct ServiceOptions {
    /// Deadline for each handler call.
    pub handler_timeout: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            handler_timeout: DEFAULT_HANDLER_TIMEOUT,
        }
    }
}

type Chain = RwLock<Vec<Arc<dyn Middleware>>>;

/// One named endpoint with its own handlers and sessions.
pub struct Service {
    name: Arc<str>,
    dispatcher: Dispatcher,
    sessions: DashMap<ConnectionId, Arc<Session>>,
    text_middleware: Chain,
    binary_middleware: Chain,
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("sessions", &self.sessions.len())
            .field("table", self.table())
            .finish_non_exhaustive()
    }
}

impl Service {
    /// Create a service with an empty method table.
    pub fn new(name: &str, options: ServiceOptions) -> Self {
        let name: Arc<str> = Arc::from(name);
        let table = Arc::new(MethodTable::new());
        Self {
            dispatcher: Dispatcher::new(name.clone(), table, options.handler_timeout),
            name,
            sessions: DashMap::new(),
            text_middleware: RwLock::new(Vec::new()),
            binary_middleware: RwLock::new(Vec::new()),
        }
    }

    /// Service name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The service's method table.
    pub fn table(&self) -> &Arc<MethodTable> {
        self.dispatcher.table()
    }

    /// The service's dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    // ── Registration ────────────────────────────────────────────────

    /// Register a request handler.
    pub fn register_method(
        &self,
        name: &str,
        handler: impl MethodHandler + 'static,
    ) -> Result<(), RegistryError> {
        self.table().register_method(name, handler)
    }

    /// Register a response handler.
    pub fn register_response_handler(
        &self,
        name: &str,
        handler: impl ResponseHandler + 'static,
    ) -> Result<(), RegistryError> {
        self.table().register_response_handler(name, handler)
    }

    /// Append to the text middleware chain.
    pub fn use_text_middleware(
        &self,
        middleware: impl Middleware + 'static,
    ) -> Result<(), RegistryError> {
        push_middleware(&self.text_middleware, self.table(), Arc::new(middleware))
    }

    /// Append to the binary middleware chain.
    pub fn use_binary_middleware(
        &self,
        middleware: impl Middleware + 'static,
    ) -> Result<(), RegistryError> {
        push_middleware(&self.binary_middleware, self.table(), Arc::new(middleware))
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// A connection opened: create its anonymous session.
    pub fn on_connect(
        &self,
        connection: ConnectionId,
        peer: Option<SocketAddr>,
        sink: Arc<dyn FrameSink>,
    ) -> Arc<Session> {
        let session = Arc::new(Session::new(
            connection.clone(),
            self.name.clone(),
            peer,
            sink,
        ));
        let _ = self.sessions.insert(connection, session.clone());

        counter!(SESSIONS_OPENED_TOTAL, "service" => self.name.to_string()).increment(1);
        gauge!(SESSIONS_ACTIVE, "service" => self.name.to_string()).increment(1.0);
        info!(
            service = %self.name,
            sid = %session.sid(),
            connection = %session.connection(),
            peer = ?peer,
            "session opened"
        );
        session
    }

    /// A connection closed: retire its session. Idempotent.
    pub fn on_disconnect(&self, connection: &ConnectionId) -> Option<Arc<Session>> {
        let (_, session) = self.sessions.remove(connection)?;
        session.mark_closed();
        gauge!(SESSIONS_ACTIVE, "service" => self.name.to_string()).decrement(1.0);
        info!(
            service = %self.name,
            sid = %session.sid(),
            connection = %connection,
            uid = session.uid(),
            outstanding_calls = session.pending().len(),
            "session closed"
        );
        Some(session)
    }

    /// Handle one inbound text frame.
    ///
    /// Returns `None` when the connection has no session. Any reply is
    /// written to the session's sink before returning. If the reply cannot be
    /// serialized, the inbound frame is echoed back instead.
    pub async fn on_text(&self, connection: &ConnectionId, frame: &[u8]) -> Option<Dispatch> {
        let Some(session) = self.session(connection) else {
            debug!(service = %self.name, connection = %connection, "text frame for unknown connection");
            return None;
        };
        self.table().seal();
        let _ = session.touch();

        let chain = self.text_middleware.read().clone();
        for middleware in &chain {
            middleware.observe(&session, frame);
        }

        let dispatch = self.dispatcher.dispatch(&session, frame).await;
        if let Some(reply) = dispatch.reply() {
            let written = match serde_json::to_string(reply) {
                Ok(text) => session.send_text(text),
                Err(e) => {
                    warn!(service = %self.name, sid = %session.sid(), error = %e, "reply serialization failed; echoing frame");
                    session.send_text(String::from_utf8_lossy(frame).into_owned())
                }
            };
            if let Err(e) = written {
                warn!(service = %self.name, sid = %session.sid(), error = %e, "failed to write reply");
            }
        }
        Some(dispatch)
    }

    /// Handle one inbound binary frame: run the binary chain, then echo it.
    ///
    /// Returns `false` when the connection has no session.
    pub fn on_binary(&self, connection: &ConnectionId, frame: &[u8]) -> bool {
        let Some(session) = self.session(connection) else {
            return false;
        };
        let _ = session.touch();

        let chain = self.binary_middleware.read().clone();
        for middleware in &chain {
            middleware.observe(&session, frame);
        }

        if let Err(e) = session.send_binary(frame.to_vec()) {
            warn!(service = %self.name, sid = %session.sid(), error = %e, "failed to echo binary frame");
        }
        true
    }

    // ── Lookup ──────────────────────────────────────────────────────

    /// Session for a connection.
    pub fn session(&self, connection: &ConnectionId) -> Option<Arc<Session>> {
        self.sessions.get(connection).map(|e| e.value().clone())
    }

    /// Session by its `sid`.
    pub fn session_by_sid(&self, sid: &SessionId) -> Option<Arc<Session>> {
        self.sessions
            .iter()
            .find(|e| e.value().sid() == sid)
            .map(|e| e.value().clone())
    }

    /// All sessions authenticated as `uid`.
    pub fn sessions_for_uid(&self, uid: i64) -> Vec<Arc<Session>> {
        if uid <= 0 {
            return Vec::new();
        }
        self.sessions
            .iter()
            .filter(|e| e.value().uid() == uid)
            .map(|e| e.value().clone())
            .collect()
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Send a server-initiated request on a connection.
    ///
    /// Returns the correlation id of the outstanding call.
    pub fn call(
        &self,
        connection: &ConnectionId,
        method: &str,
        params: Value,
    ) -> Result<i64, ServiceError> {
        let session = self
            .session(connection)
            .ok_or_else(|| ServiceError::UnknownConnection(connection.to_string()))?;
        Ok(session.call(method, params)?)
    }
}

fn push_middleware(
    chain: &Chain,
    table: &MethodTable,
    middleware: Arc<dyn Middleware>,
) -> Result<(), RegistryError> {
    let mut guard = chain.write();
    if table.is_sealed() {
        return Err(RegistryError::Sealed("middleware".into()));
    }
    guard.push(middleware);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
