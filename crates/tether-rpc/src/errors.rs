//! RPC error codes and error types.

use std::time::Duration;

use serde_json::Value;
use tether_core::Epoch;

use crate::types::RpcErrorObject;

// ── Error code constants ────────────────────────────────────────────

/// Frame is not valid JSON.
pub const PARSE_ERROR: i32 = -32700;
/// Frame is JSON but not a valid envelope.
pub const INVALID_REQUEST: i32 = -32600;
/// No handler registered for the method.
pub const METHOD_NOT_FOUND: i32 = -32601;
/// Invalid or missing parameters.
pub const INVALID_PARAMS: i32 = -32602;
/// Unexpected internal error.
pub const INTERNAL_ERROR: i32 = -32603;
/// Session is anonymous or credentials were rejected.
pub const UNAUTHORIZED: i32 = -32001;
/// Handler did not finish before its deadline.
pub const TIMEOUT: i32 = -32002;
/// Requested resource does not exist.
pub const NOT_FOUND: i32 = -32004;

/// Failure returned by a method handler, or produced by the dispatcher.
///
/// Every variant maps to a numeric wire code via [`RpcError::code`].
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// No handler registered under this name.
    #[error("Method not found: {method}")]
    MethodNotFound {
        /// The requested method name.
        method: String,
    },

    /// Required parameter missing or wrong type.
    #[error("{message}")]
    InvalidParams {
        /// Description of what is wrong.
        message: String,
    },

    /// Caller is not allowed to invoke this method.
    #[error("{message}")]
    Unauthorized {
        /// Human-readable message.
        message: String,
    },

    /// Requested resource not found.
    #[error("{message}")]
    NotFound {
        /// Human-readable message.
        message: String,
    },

    /// Internal server error.
    #[error("{message}")]
    Internal {
        /// Description (logged, never sent to the peer).
        message: String,
    },

    /// Handler exceeded its deadline.
    #[error("Handler for '{method}' timed out after {after:?}")]
    Timeout {
        /// The method that timed out.
        method: String,
        /// The deadline that was exceeded.
        after: Duration,
    },

    /// Domain-specific error with an arbitrary code.
    #[error("{message}")]
    Custom {
        /// Numeric code.
        code: i32,
        /// Human-readable message.
        message: String,
        /// Optional structured details.
        data: Option<Value>,
    },
}

impl RpcError {
    /// Access-denied error for anonymous sessions.
    pub fn access_denied() -> Self {
        Self::Unauthorized {
            message: "Access denied".into(),
        }
    }

    /// Numeric wire code for this variant.
    pub fn code(&self) -> i32 {
        match self {
            Self::MethodNotFound { .. } => METHOD_NOT_FOUND,
            Self::InvalidParams { .. } => INVALID_PARAMS,
            Self::Unauthorized { .. } => UNAUTHORIZED,
            Self::NotFound { .. } => NOT_FOUND,
            Self::Internal { .. } => INTERNAL_ERROR,
            Self::Timeout { .. } => TIMEOUT,
            Self::Custom { code, .. } => *code,
        }
    }

    /// Short label used as a metrics dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MethodNotFound { .. } => "method_not_found",
            Self::InvalidParams { .. } => "invalid_params",
            Self::Unauthorized { .. } => "unauthorized",
            Self::NotFound { .. } => "not_found",
            Self::Internal { .. } => "internal",
            Self::Timeout { .. } => "timeout",
            Self::Custom { .. } => "custom",
        }
    }

    /// Message safe to send to the peer.
    ///
    /// Internal errors are reduced to a generic message; everything else is
    /// passed through.
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal { .. } => "Internal error".to_string(),
            other => other.to_string(),
        }
    }

    /// Convert to the wire-format error object, stamped with `epoch`.
    pub fn to_error_object(&self, epoch: Epoch) -> RpcErrorObject {
        RpcErrorObject {
            epoch: epoch.as_millis(),
            code: self.code(),
            message: self.public_message(),
            data: match self {
                Self::Custom { data, .. } => data.clone().unwrap_or(Value::Null),
                _ => Value::Null,
            },
        }
    }
}

/// Errors from method/response table registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Method name is empty.
    #[error("invalid registration: {0}")]
    InvalidArgument(String),
    /// A handler is already registered under this name.
    #[error("method '{0}' is already registered")]
    AlreadyRegistered(String),
    /// The table has started dispatching and accepts no more registrations.
    #[error("method table is sealed; cannot register '{0}'")]
    Sealed(String),
}

/// Reasons an inbound frame cannot be classified.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Not valid JSON, or a field has the wrong type.
    #[error("malformed frame: {0}")]
    Parse(#[from] serde_json::Error),
    /// The `jsonrpc` protocol tag is absent or empty.
    #[error("missing jsonrpc protocol tag")]
    MissingProtocol,
    /// A response frame with neither `result` nor `error`.
    #[error("response carries neither result nor error")]
    MalformedResponse,
}

impl FrameError {
    /// Short label used as a metrics dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parse",
            Self::MissingProtocol => "missing_protocol",
            Self::MalformedResponse => "malformed_response",
        }
    }
}
