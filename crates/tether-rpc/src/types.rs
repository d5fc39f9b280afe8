//! JSON-RPC wire envelopes and frame classification.
//!
//! One envelope shape travels both ways over a connection: a peer may send
//! requests to the server, and the server may send requests to the peer whose
//! replies come back as response frames. [`Frame::decode`] tells the two apart
//! in two stages. A [`FrameHeader`] reads only the discriminating fields, then
//! the full variant is decoded.

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::FrameError;

/// Protocol tag written on every outbound envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// A method invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Protocol tag, echoed on the reply.
    pub jsonrpc: String,
    /// Correlation id. Absent ids decode as 0.
    #[serde(default)]
    pub id: i64,
    /// Method name.
    #[serde(default)]
    pub method: String,
    /// Parameters, decoded by the handler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcRequest {
    /// Build a request with the current protocol tag.
    pub fn new(id: i64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params: Some(params),
        }
    }
}

/// A reply, or a notification routed to a response handler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Protocol tag.
    pub jsonrpc: String,
    /// Correlation id.
    #[serde(default)]
    pub id: i64,
    /// Method the response belongs to, used to pick a response handler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Success payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

impl RpcResponse {
    /// Build a success response.
    pub fn success(jsonrpc: impl Into<String>, id: i64, result: Value) -> Self {
        Self {
            jsonrpc: jsonrpc.into(),
            id,
            method: None,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response.
    pub fn error(jsonrpc: impl Into<String>, id: i64, error: RpcErrorObject) -> Self {
        Self {
            jsonrpc: jsonrpc.into(),
            id,
            method: None,
            result: None,
            error: Some(error),
        }
    }

    /// Attach the method name.
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Method name, if present and non-empty.
    pub fn method_name(&self) -> Option<&str> {
        self.method.as_deref().filter(|m| !m.is_empty())
    }

    /// Whether this is an error response.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Structured error inside an [`RpcResponse`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    /// Millisecond timestamp at which the error was produced.
    #[serde(default)]
    pub epoch: i64,
    /// Numeric error code.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
    /// Arbitrary structured details.
    #[serde(default)]
    pub data: Value,
}

/// The discriminating fields of an inbound envelope.
///
/// Payloads are skipped, not decoded; only their presence matters. A field
/// holding JSON `null` counts as absent.
#[derive(Debug, Default, Deserialize)]
pub struct FrameHeader {
    /// Protocol tag.
    #[serde(default)]
    pub jsonrpc: Option<String>,
    /// Method name.
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    params: Option<IgnoredAny>,
    #[serde(default)]
    result: Option<IgnoredAny>,
    #[serde(default)]
    error: Option<IgnoredAny>,
}

impl FrameHeader {
    /// Read the header from raw bytes.
    pub fn read(raw: &[u8]) -> Result<Self, FrameError> {
        Ok(serde_json::from_slice(raw)?)
    }

    /// Whether `params` is present and non-null.
    pub fn has_params(&self) -> bool {
        self.params.is_some()
    }

    /// Whether `result` or `error` is present and non-null.
    pub fn has_outcome(&self) -> bool {
        self.result.is_some() || self.error.is_some()
    }

    fn has_method(&self) -> bool {
        self.method.as_deref().is_some_and(|m| !m.is_empty())
    }

    /// Classify the frame.
    ///
    /// A frame is a request when it carries `params`, or when it names a
    /// method and carries no outcome. It is a response when it has no
    /// `params` and carries a `result` or an `error`. Anything else is
    /// malformed.
    pub fn kind(&self) -> Result<FrameKind, FrameError> {
        if self.jsonrpc.as_deref().is_none_or(str::is_empty) {
            return Err(FrameError::MissingProtocol);
        }
        if self.has_params() || (self.has_method() && !self.has_outcome()) {
            Ok(FrameKind::Request)
        } else if self.has_outcome() {
            Ok(FrameKind::Response)
        } else {
            Err(FrameError::MalformedResponse)
        }
    }
}

/// Classification of an inbound frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// Invocation of a server method.
    Request,
    /// Reply to a server-sent request, or a notification.
    Response,
}

/// A fully decoded inbound frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    /// Invocation of a server method.
    Request(RpcRequest),
    /// Reply to a server-sent request, or a notification.
    Response(RpcResponse),
}

impl Frame {
    /// Classify and decode a raw frame.
    pub fn decode(raw: &[u8]) -> Result<Self, FrameError> {
        match FrameHeader::read(raw)?.kind()? {
            FrameKind::Request => Ok(Self::Request(serde_json::from_slice(raw)?)),
            FrameKind::Response => Ok(Self::Response(serde_json::from_slice(raw)?)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
