//! Parameter decoding helpers for method handlers.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::RpcError;
use crate::types::RpcRequest;

/// Maximum general string parameter length (8 KB).
pub const MAX_PARAM_LENGTH: usize = 8_192;

/// Decode the request's `params` into `T`.
///
/// Missing params decode as an empty object, so `T` with all-default fields
/// accepts a bare invocation.
pub fn parse_params<T: DeserializeOwned>(request: &RpcRequest) -> Result<T, RpcError> {
    let params = request
        .params
        .clone()
        .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
    serde_json::from_value(params).map_err(|e| RpcError::InvalidParams {
        message: format!("Invalid params for '{}': {e}", request.method),
    })
}

/// Read a required, non-empty string parameter.
pub fn require_string_param<'a>(params: &'a Value, name: &str) -> Result<&'a str, RpcError> {
    let value = params
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| RpcError::InvalidParams {
            message: format!("Missing required parameter '{name}'"),
        })?;
    validate_string_param(value, name, MAX_PARAM_LENGTH)?;
    Ok(value)
}

/// Validate that a string parameter does not exceed `max_len` bytes.
pub fn validate_string_param(value: &str, name: &str, max_len: usize) -> Result<(), RpcError> {
    if value.len() > max_len {
        return Err(RpcError::InvalidParams {
            message: format!(
                "Parameter '{name}' exceeds maximum length ({} > {max_len})",
                value.len()
            ),
        });
    }
    Ok(())
}
