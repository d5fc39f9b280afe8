//! Stop signal shared by the listener and every socket task.
//!
//! Firing the token stops `axum::serve` from accepting, and each socket
//! writer sends Close and returns [`CloseReason::Shutdown`]. `tetherd` then
//! waits a bounded time for the serve task to finish.
//!
//! [`CloseReason::Shutdown`]: crate::websocket::socket::CloseReason::Shutdown

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long `tetherd` waits for open connections to close.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns the server-wide cancellation token.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// A coordinator that has not fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for the listener or a socket task.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Fire the stop signal. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Fire the stop signal, then wait up to `timeout` for the serve task.
    ///
    /// Returns `false` when the task was still running at the deadline.
    pub async fn drain(&self, serve: JoinHandle<()>, timeout: Duration) -> bool {
        self.shutdown();
        info!(timeout_ms = timeout.as_millis(), "draining connections");
        match tokio::time::timeout(timeout, serve).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "serve task failed during shutdown");
                true
            }
            Err(_) => {
                warn!("connections still open after {timeout:?}");
                false
            }
        }
    }
}
