//! Uniform shaping of handler results into reply envelopes.

use serde_json::Value;
use tether_core::Epoch;

use crate::errors::RpcError;
use crate::types::RpcResponse;

/// Closed result of one method invocation.
///
/// Every handler result, including dispatcher-produced failures such as an
/// unknown method or a timeout, is converted into this type before a reply
/// is built, so every error reaches the peer with a numeric code.
#[derive(Debug)]
pub enum RpcOutcome {
    /// Handler succeeded with this payload.
    Success(Value),
    /// Handler, or the dispatcher on its behalf, failed.
    Failure(RpcError),
}

impl RpcOutcome {
    /// Whether this is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Build the reply envelope for a request with tag `jsonrpc` and `id`.
    pub fn into_response(self, jsonrpc: &str, id: i64) -> RpcResponse {
        match self {
            Self::Success(result) => RpcResponse::success(jsonrpc, id, result),
            Self::Failure(err) => RpcResponse::error(jsonrpc, id, err.to_error_object(Epoch::now())),
        }
    }
}

impl From<Result<Value, RpcError>> for RpcOutcome {
    fn from(result: Result<Value, RpcError>) -> Self {
        match result {
            Ok(v) => Self::Success(v),
            Err(e) => Self::Failure(e),
        }
    }
}

impl From<RpcError> for RpcOutcome {
    fn from(err: RpcError) -> Self {
        Self::Failure(err)
    }
}
