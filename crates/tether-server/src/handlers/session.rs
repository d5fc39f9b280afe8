//! Session methods: `login`, `logout`, `session`, `token`, `refresh`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tether_auth::{AuthError, TokenKind};
use tether_core::Epoch;
use tether_rpc::validation::{MAX_PARAM_LENGTH, parse_params, validate_string_param};
use tether_rpc::{MethodHandler, RpcError, RpcRequest, Session};
use tracing::{info, instrument};

use super::BuiltinDeps;

fn auth_error(err: AuthError) -> RpcError {
    match err {
        AuthError::Unauthorized => RpcError::access_denied(),
        other => RpcError::Internal {
            message: other.to_string(),
        },
    }
}

#[derive(Deserialize)]
struct LoginParams {
    user: String,
    password: String,
}

/// `login`: check credentials and bind the identity to the session.
pub struct LoginHandler {
    deps: BuiltinDeps,
}

impl LoginHandler {
    /// Create the handler.
    pub fn new(deps: BuiltinDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl MethodHandler for LoginHandler {
    #[instrument(skip_all, fields(method = "login", sid = %session.sid()))]
    async fn handle(&self, session: &Session, request: &RpcRequest) -> Result<Value, RpcError> {
        let params: LoginParams = parse_params(request)?;
        validate_string_param(&params.user, "user", MAX_PARAM_LENGTH)?;
        validate_string_param(&params.password, "password", MAX_PARAM_LENGTH)?;

        let Some(user) = self
            .deps
            .directory
            .authenticate(&params.user, &params.password)
            .await
        else {
            info!(user = %params.user, "login rejected");
            return Err(RpcError::Unauthorized {
                message: "Wrong username or password".into(),
            });
        };

        let access = self
            .deps
            .issuer
            .issue_short_lived(&user.identity)
            .map_err(auth_error)?;
        let refresh = self
            .deps
            .issuer
            .issue_refresh(&user.identity)
            .map_err(auth_error)?;
        session.authenticate(user.uid, &user.identity, &access)?;
        info!(uid = user.uid, "login succeeded");

        Ok(json!({
            "id": user.uid,
            "username": user.login,
            "ulid": user.identity,
            "access_token": access,
            "refresh_token": refresh,
        }))
    }
}

/// `logout`: return the session to anonymous.
pub struct LogoutHandler;

#[async_trait]
impl MethodHandler for LogoutHandler {
    async fn handle(&self, session: &Session, _request: &RpcRequest) -> Result<Value, RpcError> {
        let _ = session.logout();
        Ok(json!("success"))
    }
}

/// `session`: describe the caller's session.
pub struct SessionInfoHandler {
    deps: BuiltinDeps,
}

impl SessionInfoHandler {
    /// Create the handler.
    pub fn new(deps: BuiltinDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl MethodHandler for SessionInfoHandler {
    async fn handle(&self, session: &Session, _request: &RpcRequest) -> Result<Value, RpcError> {
        let epoch = Epoch::now().as_millis();
        let Some(identity) = session.identity() else {
            return Ok(json!({ "epoch": epoch, "uid": 0 }));
        };
        // A user missing from the directory reports the token identity.
        let username = self
            .deps
            .directory
            .find_by_uid(identity.uid)
            .await
            .map_or(identity.name, |user| user.login);
        Ok(json!({
            "epoch": epoch,
            "session_id": session.sid().as_str(),
            "uid": identity.uid,
            "username": username,
        }))
    }
}

/// `token`: issue a fresh access and refresh token pair. Requires auth.
pub struct TokenHandler {
    deps: BuiltinDeps,
}

impl TokenHandler {
    /// Create the handler.
    pub fn new(deps: BuiltinDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl MethodHandler for TokenHandler {
    #[instrument(skip_all, fields(method = "token", sid = %session.sid()))]
    async fn handle(&self, session: &Session, _request: &RpcRequest) -> Result<Value, RpcError> {
        let uid = session.require_auth()?;
        let user = self
            .deps
            .directory
            .find_by_uid(uid)
            .await
            .ok_or_else(|| RpcError::NotFound {
                message: format!("User {uid} does not exist"),
            })?;

        let access = self
            .deps
            .issuer
            .issue_short_lived(&user.identity)
            .map_err(auth_error)?;
        let refresh = self
            .deps
            .issuer
            .issue_refresh(&user.identity)
            .map_err(auth_error)?;
        session.authenticate(uid, &user.identity, &access)?;

        Ok(json!({
            "epoch": Epoch::now().as_millis(),
            "uid": uid,
            "ulid": user.identity,
            "login": user.login,
            "token": access,
            "refresh_token": refresh,
        }))
    }
}

#[derive(Deserialize)]
struct RefreshParams {
    refresh_token: String,
}

/// `refresh`: trade a refresh token for a new access token.
pub struct RefreshHandler {
    deps: BuiltinDeps,
}

impl RefreshHandler {
    /// Create the handler.
    pub fn new(deps: BuiltinDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl MethodHandler for RefreshHandler {
    #[instrument(skip_all, fields(method = "refresh", sid = %session.sid()))]
    async fn handle(&self, session: &Session, request: &RpcRequest) -> Result<Value, RpcError> {
        let params: RefreshParams = parse_params(request)?;
        validate_string_param(&params.refresh_token, "refresh_token", MAX_PARAM_LENGTH)?;

        let claims = self
            .deps
            .issuer
            .verify_kind(&params.refresh_token, TokenKind::Refresh)
            .map_err(auth_error)?;
        let access = self
            .deps
            .issuer
            .issue_short_lived(&claims.sub)
            .map_err(auth_error)?;

        Ok(json!({
            "epoch": Epoch::now().as_millis(),
            "ulid": claims.sub,
            "access_token": access,
        }))
    }
}
