//! Introspection methods: `version`, `methods`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tether_rpc::{MethodHandler, MethodTable, RpcError, RpcRequest, Session};

/// Wire protocol revision reported by `version`.
pub const PROTOCOL_VERSION: u32 = 1;

/// `version`: server name, version, and protocol. No auth required.
pub struct VersionHandler;

#[async_trait]
impl MethodHandler for VersionHandler {
    async fn handle(&self, _session: &Session, _request: &RpcRequest) -> Result<Value, RpcError> {
        Ok(json!({
            "server": "tether",
            "server_version": env!("CARGO_PKG_VERSION"),
            "protocol": PROTOCOL_VERSION,
        }))
    }
}

/// `methods`: sorted names of every method this service answers.
pub struct MethodsHandler {
    table: Arc<MethodTable>,
}

impl MethodsHandler {
    /// List the methods of `table`.
    pub fn new(table: Arc<MethodTable>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl MethodHandler for MethodsHandler {
    async fn handle(&self, _session: &Session, _request: &RpcRequest) -> Result<Value, RpcError> {
        Ok(json!(self.table.methods()))
    }
}
