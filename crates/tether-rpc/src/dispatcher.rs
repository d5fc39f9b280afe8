//! Frame classification, handler routing, and reply shaping.
//!
//! Each text frame is decoded once into a [`Frame`]:
//!
//! - **Requests** are routed to the method handler of the same name, run
//!   under a deadline, and always answered with a reply envelope (including
//!   for unknown methods and timeouts).
//! - **Responses** are routed to a response handler by `method`, or by the
//!   correlation id of an outstanding server-sent call when `method` is
//!   empty. They are never answered.
//! - Frames that cannot be classified are logged and dropped.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tracing::{debug, error, info, warn};

use crate::errors::{FrameError, RpcError};
use crate::outcome::RpcOutcome;
use crate::registry::MethodTable;
use crate::session::Session;
use crate::types::{Frame, RpcRequest, RpcResponse};

/// Default deadline for a single handler invocation.
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

/// Handler calls slower than this are logged.
const SLOW_HANDLER: Duration = Duration::from_secs(5);

/// What happened to one inbound frame.
#[derive(Debug)]
pub enum Dispatch {
    /// A request was handled; this reply must be written back.
    Reply(RpcResponse),
    /// A response was delivered to the handler for `method`.
    Routed {
        /// The response handler that ran.
        method: String,
    },
    /// The frame was discarded without a reply.
    Dropped(DropReason),
}

impl Dispatch {
    /// The reply to write back, if any.
    pub fn reply(&self) -> Option<&RpcResponse> {
        match self {
            Self::Reply(r) => Some(r),
            _ => None,
        }
    }

    /// Consume and return the reply, if any.
    pub fn into_reply(self) -> Option<RpcResponse> {
        match self {
            Self::Reply(r) => Some(r),
            _ => None,
        }
    }
}

/// Why a frame produced no reply and reached no handler.
#[derive(Debug)]
pub enum DropReason {
    /// The frame could not be decoded or classified.
    Invalid(FrameError),
    /// Empty `method` and an id matching no outstanding call.
    Uncorrelated {
        /// The unmatched correlation id.
        id: i64,
    },
    /// No response handler registered for the method.
    NoResponder {
        /// The method the response was routed to.
        method: String,
    },
    /// The response handler exceeded its deadline.
    ResponderTimeout {
        /// The method whose handler timed out.
        method: String,
    },
}

/// Routes frames for one service.
pub struct Dispatcher {
    service: Arc<str>,
    table: Arc<MethodTable>,
    handler_timeout: Duration,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("service", &self.service)
            .field("handler_timeout", &self.handler_timeout)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher over `table`.
    pub fn new(service: Arc<str>, table: Arc<MethodTable>, handler_timeout: Duration) -> Self {
        Self {
            service,
            table,
            handler_timeout,
        }
    }

    /// The table this dispatcher reads.
    pub fn table(&self) -> &Arc<MethodTable> {
        &self.table
    }

    /// Deadline applied to each handler call.
    pub fn handler_timeout(&self) -> Duration {
        self.handler_timeout
    }

    /// Classify and route one raw frame.
    pub async fn dispatch(&self, session: &Session, raw: &[u8]) -> Dispatch {
        match Frame::decode(raw) {
            Ok(Frame::Request(request)) => {
                Dispatch::Reply(self.dispatch_request(session, &request).await)
            }
            Ok(Frame::Response(response)) => self.route_response(session, response).await,
            Err(err) => {
                counter!(
                    "rpc_frames_dropped_total",
                    "service" => self.service.to_string(),
                    "reason" => err.kind()
                )
                .increment(1);
                warn!(
                    service = %self.service,
                    sid = %session.sid(),
                    error = %err,
                    "dropping undecodable frame"
                );
                Dispatch::Dropped(DropReason::Invalid(err))
            }
        }
    }

    /// Run a decoded request and build its reply.
    pub async fn dispatch_request(&self, session: &Session, request: &RpcRequest) -> RpcResponse {
        self.invoke(session, request)
            .await
            .into_response(&request.jsonrpc, request.id)
    }

    async fn invoke(&self, session: &Session, request: &RpcRequest) -> RpcOutcome {
        let method = request.method.as_str();
        let service = self.service.to_string();
        counter!("rpc_requests_total", "service" => service.clone(), "method" => method.to_owned())
            .increment(1);

        let Some(handler) = self.table.method(method) else {
            counter!(
                "rpc_errors_total",
                "service" => service,
                "method" => method.to_owned(),
                "error_type" => "method_not_found"
            )
            .increment(1);
            info!(service = %self.service, sid = %session.sid(), method, "method not found");
            return RpcOutcome::Failure(RpcError::MethodNotFound {
                method: method.to_owned(),
            });
        };

        debug!(
            service = %self.service,
            sid = %session.sid(),
            uid = session.uid(),
            method,
            id = request.id,
            "dispatching request"
        );

        let start = Instant::now();
        let result = tokio::time::timeout(self.handler_timeout, handler.handle(session, request)).await;

        let outcome = match result {
            Ok(Ok(value)) => {
                let _ = session.touch();
                RpcOutcome::Success(value)
            }
            Ok(Err(err)) => {
                counter!(
                    "rpc_errors_total",
                    "service" => service.clone(),
                    "method" => method.to_owned(),
                    "error_type" => err.kind()
                )
                .increment(1);
                if let RpcError::Internal { message } = &err {
                    error!(service = %self.service, method, %message, "handler failed");
                } else {
                    debug!(service = %self.service, method, error = %err, "handler returned error");
                }
                RpcOutcome::Failure(err)
            }
            Err(_elapsed) => {
                counter!(
                    "rpc_errors_total",
                    "service" => service.clone(),
                    "method" => method.to_owned(),
                    "error_type" => "timeout"
                )
                .increment(1);
                error!(
                    service = %self.service,
                    method,
                    "handler timed out after {:?}",
                    self.handler_timeout
                );
                RpcOutcome::Failure(RpcError::Timeout {
                    method: method.to_owned(),
                    after: self.handler_timeout,
                })
            }
        };

        let duration = start.elapsed();
        histogram!(
            "rpc_request_duration_seconds",
            "service" => service,
            "method" => method.to_owned()
        )
        .record(duration.as_secs_f64());

        if duration >= SLOW_HANDLER {
            warn!(
                service = %self.service,
                method,
                duration_secs = duration.as_secs_f64(),
                "slow RPC request"
            );
        }

        outcome
    }

    async fn route_response(&self, session: &Session, mut response: RpcResponse) -> Dispatch {
        let named = response.method_name().map(str::to_owned);
        let method = if let Some(name) = named {
            let _ = session.pending().take_matching(response.id, &name);
            name
        } else if let Some(call) = session.resolve_pending(response.id) {
            response.method = Some(call.method.clone());
            call.method
        } else {
            info!(
                service = %self.service,
                sid = %session.sid(),
                id = response.id,
                "response without method matches no outstanding call"
            );
            return Dispatch::Dropped(DropReason::Uncorrelated { id: response.id });
        };

        let Some(handler) = self.table.response_handler(&method) else {
            info!(
                service = %self.service,
                sid = %session.sid(),
                method = %method,
                "no response handler registered"
            );
            return Dispatch::Dropped(DropReason::NoResponder { method });
        };

        counter!(
            "rpc_responses_total",
            "service" => self.service.to_string(),
            "method" => method.clone()
        )
        .increment(1);

        match tokio::time::timeout(self.handler_timeout, handler.handle(session, &response)).await {
            Ok(()) => Dispatch::Routed { method },
            Err(_elapsed) => {
                error!(
                    service = %self.service,
                    method = %method,
                    "response handler timed out after {:?}",
                    self.handler_timeout
                );
                Dispatch::Dropped(DropReason::ResponderTimeout { method })
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{self, RpcError};
    use crate::registry::{MethodHandler, ResponseHandler};
    use crate::session::tests::make_session;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use proptest::prelude::*;
    use serde_json::{Value, json};

    // ── Test handler implementations ────────────────────────────────

    struct EchoHandler;

    #[async_trait]
    impl MethodHandler for EchoHandler {
        async fn handle(&self, _s: &Session, r: &RpcRequest) -> Result<Value, RpcError> {
            Ok(r.params.clone().unwrap_or(Value::Null))
        }
    }

    struct TagHandler(String);

    #[async_trait]
    impl MethodHandler for TagHandler {
        async fn handle(&self, _s: &Session, _r: &RpcRequest) -> Result<Value, RpcError> {
            Ok(json!(self.0))
        }
    }

    struct FailHandler;

    #[async_trait]
    impl MethodHandler for FailHandler {
        async fn handle(&self, _s: &Session, _r: &RpcRequest) -> Result<Value, RpcError> {
            Err(RpcError::Internal {
                message: "boom at /secret/path".into(),
            })
        }
    }

    struct PrivateHandler;

    #[async_trait]
    impl MethodHandler for PrivateHandler {
        async fn handle(&self, s: &Session, _r: &RpcRequest) -> Result<Value, RpcError> {
            let uid = s.require_auth()?;
            Ok(json!({ "uid": uid }))
        }
    }

    struct SlowHandler;

    #[async_trait]
    impl MethodHandler for SlowHandler {
        async fn handle(&self, _s: &Session, _r: &RpcRequest) -> Result<Value, RpcError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Value::Null)
        }
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<RpcResponse>>,
    }

    #[async_trait]
    impl ResponseHandler for Arc<Recorder> {
        async fn handle(&self, _s: &Session, r: &RpcResponse) {
            self.seen.lock().push(r.clone());
        }
    }

    fn dispatcher(table: MethodTable) -> Dispatcher {
        Dispatcher::new(Arc::from("test"), Arc::new(table), Duration::from_secs(1))
    }

    fn raw(v: &Value) -> Vec<u8> {
        v.to_string().into_bytes()
    }

    // ── Requests ────────────────────────────────────────────────────

    #[tokio::test]
    async fn request_routes_to_handler() {
        let table = MethodTable::new();
        table.register_method("echo", EchoHandler).unwrap();
        let d = dispatcher(table);
        let (session, _) = make_session();

        let out = d
            .dispatch(&session, &raw(&json!({"jsonrpc": "2.0", "id": 5, "method": "echo", "params": {"x": 1}})))
            .await;
        let reply = out.into_reply().unwrap();
        assert_eq!(reply.id, 5);
        assert_eq!(reply.jsonrpc, "2.0");
        assert_eq!(reply.result, Some(json!({"x": 1})));
        assert!(reply.error.is_none());
    }

    #[tokio::test]
    async fn unknown_method_replies_method_not_found() {
        let d = dispatcher(MethodTable::new());
        let (session, _) = make_session();

        let out = d
            .dispatch(&session, &raw(&json!({"jsonrpc": "2.0", "id": 1, "method": "nope", "params": {}})))
            .await;
        let reply = out.into_reply().unwrap();
        assert_eq!(reply.id, 1);
        let err = reply.error.unwrap();
        assert_eq!(err.code, -32601);
        assert!(err.message.contains("nope"));
    }

    #[tokio::test]
    async fn handler_errors_are_coded_and_sanitized() {
        let table = MethodTable::new();
        table.register_method("fail", FailHandler).unwrap();
        let d = dispatcher(table);
        let (session, _) = make_session();

        let reply = d
            .dispatch(&session, &raw(&json!({"jsonrpc": "2.0", "id": 2, "method": "fail", "params": []})))
            .await
            .into_reply()
            .unwrap();
        let err = reply.error.unwrap();
        assert_eq!(err.code, errors::INTERNAL_ERROR);
        assert_eq!(err.message, "Internal error");
    }

    #[tokio::test]
    async fn anonymous_session_gets_unauthorized() {
        let table = MethodTable::new();
        table.register_method("private", PrivateHandler).unwrap();
        let d = dispatcher(table);
        let (session, _) = make_session();
        let frame = raw(&json!({"jsonrpc": "2.0", "id": 3, "method": "private", "params": {}}));

        let reply = d.dispatch(&session, &frame).await.into_reply().unwrap();
        assert_eq!(reply.error.unwrap().code, errors::UNAUTHORIZED);

        session.authenticate(42, "alice", "tok").unwrap();
        let reply = d.dispatch(&session, &frame).await.into_reply().unwrap();
        assert_eq!(reply.result, Some(json!({"uid": 42})));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_handler_times_out() {
        let table = MethodTable::new();
        table.register_method("slow", SlowHandler).unwrap();
        let d = dispatcher(table);
        let (session, _) = make_session();

        let reply = d
            .dispatch(&session, &raw(&json!({"jsonrpc": "2.0", "id": 9, "method": "slow", "params": {}})))
            .await
            .into_reply()
            .unwrap();
        assert_eq!(reply.id, 9);
        assert_eq!(reply.error.unwrap().code, errors::TIMEOUT);
    }

    #[tokio::test]
    async fn successful_request_refreshes_epoch() {
        let table = MethodTable::new();
        table.register_method("echo", EchoHandler).unwrap();
        let d = dispatcher(table);
        let (session, _) = make_session();
        let before = session.epoch();

        let _ = d
            .dispatch(&session, &raw(&json!({"jsonrpc": "2.0", "id": 1, "method": "echo", "params": {}})))
            .await;
        assert!(session.epoch() >= before);
    }

    // ── Invalid frames ──────────────────────────────────────────────

    #[tokio::test]
    async fn garbage_is_dropped_without_reply() {
        let d = dispatcher(MethodTable::new());
        let (session, sink) = make_session();

        let out = d.dispatch(&session, b"{{{not json").await;
        assert_matches!(out, Dispatch::Dropped(DropReason::Invalid(FrameError::Parse(_))));
        assert!(out.reply().is_none());
        assert!(sink.frames().is_empty());
    }

    #[tokio::test]
    async fn missing_protocol_is_dropped() {
        let d = dispatcher(MethodTable::new());
        let (session, _) = make_session();
        let out = d
            .dispatch(&session, &raw(&json!({"id": 1, "method": "echo", "params": {}})))
            .await;
        assert_matches!(out, Dispatch::Dropped(DropReason::Invalid(FrameError::MissingProtocol)));
    }

    #[tokio::test]
    async fn response_without_outcome_is_dropped() {
        let d = dispatcher(MethodTable::new());
        let (session, _) = make_session();
        let out = d
            .dispatch(&session, &raw(&json!({"jsonrpc": "2.0", "id": 1, "result": null})))
            .await;
        assert_matches!(out, Dispatch::Dropped(DropReason::Invalid(FrameError::MalformedResponse)));
    }

    // ── Responses ───────────────────────────────────────────────────

    #[tokio::test]
    async fn named_response_without_handler_is_dropped() {
        let d = dispatcher(MethodTable::new());
        let (session, sink) = make_session();
        let out = d
            .dispatch(&session, &raw(&json!({"jsonrpc": "2.0", "id": 2, "method": "unknown", "result": {"x": 1}})))
            .await;
        assert_matches!(out, Dispatch::Dropped(DropReason::NoResponder { method }) if method == "unknown");
        assert!(sink.frames().is_empty());
    }

    #[tokio::test]
    async fn named_response_routes_to_handler() {
        let recorder = Arc::new(Recorder::default());
        let table = MethodTable::new();
        table.register_response_handler("ping", recorder.clone()).unwrap();
        let d = dispatcher(table);
        let (session, sink) = make_session();

        let out = d
            .dispatch(&session, &raw(&json!({"jsonrpc": "2.0", "id": 4, "method": "ping", "result": "pong"})))
            .await;
        assert_matches!(out, Dispatch::Routed { method } if method == "ping");
        assert_eq!(recorder.seen.lock()[0].result, Some(json!("pong")));
        assert!(sink.frames().is_empty());
    }

    #[tokio::test]
    async fn anonymous_response_correlates_by_pending_id() {
        let recorder = Arc::new(Recorder::default());
        let table = MethodTable::new();
        table.register_response_handler("ping", recorder.clone()).unwrap();
        let d = dispatcher(table);
        let (session, _) = make_session();

        let id = session.call("ping", json!({})).unwrap();
        let out = d
            .dispatch(&session, &raw(&json!({"jsonrpc": "2.0", "id": id, "result": "pong"})))
            .await;
        assert_matches!(out, Dispatch::Routed { method } if method == "ping");
        assert!(session.pending().is_empty());
        assert_eq!(recorder.seen.lock()[0].method.as_deref(), Some("ping"));

        // A second reply with the same id has nothing left to match.
        let out = d
            .dispatch(&session, &raw(&json!({"jsonrpc": "2.0", "id": id, "result": "again"})))
            .await;
        assert_matches!(out, Dispatch::Dropped(DropReason::Uncorrelated { .. }));
    }

    #[tokio::test]
    async fn anonymous_error_response_correlates_too() {
        let recorder = Arc::new(Recorder::default());
        let table = MethodTable::new();
        table.register_response_handler("ping", recorder.clone()).unwrap();
        let d = dispatcher(table);
        let (session, _) = make_session();

        let id = session.call("ping", json!({})).unwrap();
        let out = d
            .dispatch(&session, &raw(&json!({
                "jsonrpc": "2.0", "id": id,
                "error": {"code": -1, "message": "busy", "epoch": 0, "data": null}
            })))
            .await;
        assert_matches!(out, Dispatch::Routed { .. });
        assert!(recorder.seen.lock()[0].is_error());
    }

    #[tokio::test]
    async fn named_response_clears_matching_pending() {
        let recorder = Arc::new(Recorder::default());
        let table = MethodTable::new();
        table.register_response_handler("ping", recorder).unwrap();
        let d = dispatcher(table);
        let (session, _) = make_session();

        let id = session.call("ping", json!({})).unwrap();
        let _ = d
            .dispatch(&session, &raw(&json!({"jsonrpc": "2.0", "id": id, "method": "ping", "result": 1})))
            .await;
        assert!(session.pending().is_empty());
    }

    #[tokio::test]
    async fn uncorrelated_response_is_dropped() {
        let d = dispatcher(MethodTable::new());
        let (session, _) = make_session();
        let out = d
            .dispatch(&session, &raw(&json!({"jsonrpc": "2.0", "id": 77, "result": 1})))
            .await;
        assert_matches!(out, Dispatch::Dropped(DropReason::Uncorrelated { id: 77 }));
    }

    // ── Properties ──────────────────────────────────────────────────

    proptest! {
        #[test]
        fn distinct_methods_route_to_their_own_handler(
            names in proptest::collection::hash_set("[a-z][a-z0-9_.]{0,15}", 2..8)
        ) {
            let table = MethodTable::new();
            for name in &names {
                table.register_method(name, TagHandler(name.clone())).unwrap();
            }
            let d = dispatcher(table);
            let (session, _) = make_session();
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();

            for name in &names {
                let frame = raw(&json!({"jsonrpc": "2.0", "id": 1, "method": name, "params": {}}));
                let reply = rt.block_on(d.dispatch(&session, &frame)).into_reply().unwrap();
                prop_assert_eq!(reply.result, Some(json!(name)));
            }
        }
    }
}
