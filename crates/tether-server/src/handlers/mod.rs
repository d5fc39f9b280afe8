//! Built-in methods every service can expose.
//!
//! | Method    | Auth | Result |
//! |-----------|------|--------|
//! | `version` | no   | server name, version, protocol |
//! | `login`   | no   | uid, tokens; session becomes authenticated |
//! | `logout`  | no   | `"success"`; session becomes anonymous |
//! | `session` | no   | session summary |
//! | `token`   | yes  | fresh access and refresh tokens |
//! | `refresh` | no   | new access token for a refresh token |
//! | `methods` | no   | sorted method names |
//!
//! Plus a `ping` response handler for answers to server-sent pings.

pub mod directory;
pub mod ping;
pub mod session;
pub mod system;

use std::sync::Arc;

use tether_auth::TokenIssuer;
use tether_rpc::RegistryError;

pub use directory::{StaticDirectory, UserDirectory, UserRecord, hash_password};

use crate::service::Service;

/// Collaborators the built-in session methods need.
#[derive(Clone)]
pub struct BuiltinDeps {
    /// Mints and verifies tokens.
    pub issuer: Arc<TokenIssuer>,
    /// Credential and user lookup.
    pub directory: Arc<dyn UserDirectory>,
}

/// Register the built-in methods and the `ping` responder on `service`.
pub fn register_builtin(service: &Service, deps: &BuiltinDeps) -> Result<(), RegistryError> {
    service.register_method("version", system::VersionHandler)?;
    service.register_method("login", session::LoginHandler::new(deps.clone()))?;
    service.register_method("logout", session::LogoutHandler)?;
    service.register_method("session", session::SessionInfoHandler::new(deps.clone()))?;
    service.register_method("token", session::TokenHandler::new(deps.clone()))?;
    service.register_method("refresh", session::RefreshHandler::new(deps.clone()))?;
    service.register_method("methods", system::MethodsHandler::new(service.table().clone()))?;
    service.register_response_handler("ping", ping::PingResponder)?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
