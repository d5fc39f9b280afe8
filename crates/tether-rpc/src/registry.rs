//! Per-service method and response handler tables.
//!
//! Registration happens during bootstrap; dispatch reads the tables on every
//! frame. Each table sits behind its own `RwLock`, and a registration checks
//! for a duplicate and inserts under one write guard, so two concurrent
//! registrations can never both claim a name or lose each other's insert.
//! Once [`MethodTable::seal`] has run, registration fails.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::errors::{RegistryError, RpcError};
use crate::session::Session;
use crate::types::{RpcRequest, RpcResponse};

/// Handler for one request method.
///
/// Handlers authorize themselves by inspecting the session (see
/// [`Session::require_auth`]).
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Execute the method for `session`.
    async fn handle(&self, session: &Session, request: &RpcRequest) -> Result<Value, RpcError>;
}

/// Callback for responses (or notifications) sent by the peer.
#[async_trait]
pub trait ResponseHandler: Send + Sync {
    /// Consume the response. Side effects are the only result.
    async fn handle(&self, session: &Session, response: &RpcResponse);
}

/// Method name → handler and method name → response handler.
pub struct MethodTable {
    methods: RwLock<HashMap<String, Arc<dyn MethodHandler>>>,
    responders: RwLock<HashMap<String, Arc<dyn ResponseHandler>>>,
    sealed: AtomicBool,
}

impl std::fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodTable")
            .field("methods", &self.methods())
            .field("responders", &self.responders())
            .field("sealed", &self.is_sealed())
            .finish()
    }
}

impl MethodTable {
    /// Create an empty, unsealed table.
    pub fn new() -> Self {
        Self {
            methods: RwLock::new(HashMap::new()),
            responders: RwLock::new(HashMap::new()),
            sealed: AtomicBool::new(false),
        }
    }

    /// Register a request handler under `name`.
    ///
    /// Fails with `InvalidArgument` for an empty name, `AlreadyRegistered` if
    /// the name is taken (the existing handler is kept), and `Sealed` once
    /// dispatch has begun.
    pub fn register_method(
        &self,
        name: &str,
        handler: impl MethodHandler + 'static,
    ) -> Result<(), RegistryError> {
        self.register_method_arc(name, Arc::new(handler))
    }

    /// Register a shared request handler under `name`.
    pub fn register_method_arc(
        &self,
        name: &str,
        handler: Arc<dyn MethodHandler>,
    ) -> Result<(), RegistryError> {
        insert_unique(&self.methods, &self.sealed, name, handler)?;
        debug!(method = name, "registered method");
        Ok(())
    }

    /// Register a response handler under `name`. Same contract as
    /// [`register_method`](Self::register_method).
    pub fn register_response_handler(
        &self,
        name: &str,
        handler: impl ResponseHandler + 'static,
    ) -> Result<(), RegistryError> {
        let handler: Arc<dyn ResponseHandler> = Arc::new(handler);
        insert_unique(&self.responders, &self.sealed, name, handler)?;
        debug!(method = name, "registered response handler");
        Ok(())
    }

    /// Look up a request handler.
    pub fn method(&self, name: &str) -> Option<Arc<dyn MethodHandler>> {
        self.methods.read().get(name).cloned()
    }

    /// Look up a response handler.
    pub fn response_handler(&self, name: &str) -> Option<Arc<dyn ResponseHandler>> {
        self.responders.read().get(name).cloned()
    }

    /// Check whether a method is registered.
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.read().contains_key(name)
    }

    /// List all registered method names (sorted).
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// List all registered response handler names (sorted).
    pub fn responders(&self) -> Vec<String> {
        let mut names: Vec<String> = self.responders.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Refuse all further registrations. Idempotent.
    ///
    /// Takes both write locks, so a registration already holding one
    /// completes before the seal lands.
    pub fn seal(&self) {
        if self.is_sealed() {
            return;
        }
        let _methods = self.methods.write();
        let _responders = self.responders.write();
        self.sealed.store(true, Ordering::Release);
        debug!("method table sealed");
    }

    /// Whether registrations are closed.
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }
}

impl Default for MethodTable {
    fn default() -> Self {
        Self::new()
    }
}

fn insert_unique<H: ?Sized>(
    table: &RwLock<HashMap<String, Arc<H>>>,
    sealed: &AtomicBool,
    name: &str,
    handler: Arc<H>,
) -> Result<(), RegistryError> {
    if name.is_empty() {
        return Err(RegistryError::InvalidArgument(
            "method name must not be empty".into(),
        ));
    }
    let mut guard = table.write();
    if sealed.load(Ordering::Acquire) {
        return Err(RegistryError::Sealed(name.to_string()));
    }
    if guard.contains_key(name) {
        return Err(RegistryError::AlreadyRegistered(name.to_string()));
    }
    let _ = guard.insert(name.to_string(), handler);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
