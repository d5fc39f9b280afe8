//! # tether-rpc
//!
//! Bidirectional JSON-RPC dispatch over message-oriented connections.
//!
//! - **Envelopes**: `RpcRequest`, `RpcResponse`, `RpcErrorObject`, and
//!   two-stage [`Frame`] decoding that separates requests from responses
//! - **Session**: per-connection identity, activity epoch, outbound sink,
//!   and outstanding server-to-client calls
//! - **Method table**: per-service handler registration, sealed once
//!   dispatch starts
//! - **Dispatcher**: routing, per-call deadlines, uniform error shaping
//! - **Middleware**: pre-dispatch observers such as [`AuditLog`]

#![deny(unsafe_code)]

pub mod dispatcher;
pub mod errors;
pub mod middleware;
pub mod outcome;
pub mod pending;
pub mod registry;
pub mod session;
pub mod transport;
pub mod types;
pub mod validation;

pub use dispatcher::{DEFAULT_HANDLER_TIMEOUT, Dispatch, Dispatcher, DropReason};
pub use errors::{FrameError, RegistryError, RpcError};
pub use middleware::{AuditLog, Middleware};
pub use outcome::RpcOutcome;
pub use registry::{MethodHandler, MethodTable, ResponseHandler};
pub use session::{Identity, Session, SessionState};
pub use transport::{FrameSink, MemorySink, Outbound, TransportError};
pub use types::{Frame, JSONRPC_VERSION, RpcErrorObject, RpcRequest, RpcResponse};
