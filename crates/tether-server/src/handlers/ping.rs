//! Response handler for server-sent `ping` calls.

use async_trait::async_trait;
use tether_rpc::{ResponseHandler, RpcResponse, Session};
use tracing::info;

/// Logs the peer's answer to a `ping` call.
pub struct PingResponder;

#[async_trait]
impl ResponseHandler for PingResponder {
    async fn handle(&self, session: &Session, response: &RpcResponse) {
        match (&response.result, &response.error) {
            (_, Some(error)) => info!(
                sid = %session.sid(),
                id = response.id,
                code = error.code,
                message = %error.message,
                "ping answered with error"
            ),
            (Some(result), None) => info!(sid = %session.sid(), id = response.id, %result, "ping answered"),
            (None, None) => info!(sid = %session.sid(), id = response.id, "ping response carries no outcome"),
        }
    }
}
