//! Server configuration.

use std::time::Duration;

use tether_auth::TokenConfig;
use tether_settings::{AuthSettings, ServerSettings};

/// Configuration for the tether server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Outbound frames buffered per connection.
    pub send_queue_capacity: usize,
    /// Interval between server pings.
    pub ping_interval: Duration,
    /// Close a connection that has been silent this long.
    pub pong_timeout: Duration,
    /// Deadline for a single handler call.
    pub handler_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_message_size: 4096,
            send_queue_capacity: 256,
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(60),
            handler_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(s: &ServerSettings) -> Self {
        Self {
            host: s.host.clone(),
            port: s.port,
            max_message_size: s.max_message_size,
            send_queue_capacity: s.send_queue_capacity,
            ping_interval: Duration::from_millis(s.ping_interval_ms),
            pong_timeout: Duration::from_millis(s.pong_timeout_ms),
            handler_timeout: Duration::from_millis(s.handler_timeout_ms),
        }
    }
}

/// Build the token issuer config from auth settings.
///
/// `None` when no secret is configured.
pub fn token_config(auth: &AuthSettings) -> Option<TokenConfig> {
    let secret = auth.secret.as_deref().filter(|s| !s.is_empty())?;
    let mut config = TokenConfig::new(secret, auth.audience.clone());
    config.issuer.clone_from(&auth.issuer);
    config.short_lived_ttl = Duration::from_secs(auth.short_lived_ttl_secs);
    config.refresh_ttl = Duration::from_secs(auth.refresh_ttl_secs);
    Some(config)
}
