//! Network, transport, and logging settings.

use serde::{Deserialize, Serialize};
use tether_core::LogFormat;

/// Listener and per-connection transport settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port (0 picks a free port).
    pub port: u16,
    /// Largest inbound frame accepted, in bytes.
    pub max_message_size: usize,
    /// Outbound frames buffered per connection before new ones are dropped.
    pub send_queue_capacity: usize,
    /// Interval between server-sent WebSocket pings.
    pub ping_interval_ms: u64,
    /// A connection silent for longer than this is closed.
    pub pong_timeout_ms: u64,
    /// Deadline for a single handler invocation.
    pub handler_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8765,
            max_message_size: 4096,
            send_queue_capacity: 256,
            ping_interval_ms: 30_000,
            pong_timeout_ms: 60_000,
            handler_timeout_ms: 30_000,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level, or a full `EnvFilter` directive.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults() {
        let s = ServerSettings::default();
        assert_eq!(s.host, "127.0.0.1");
        assert_eq!(s.port, 8765);
        assert_eq!(s.max_message_size, 4096);
        assert_eq!(s.handler_timeout_ms, 30_000);
    }

    #[test]
    fn server_camel_case_partial() {
        let s: ServerSettings =
            serde_json::from_str(r#"{"maxMessageSize": 8192, "port": 9000}"#).unwrap();
        assert_eq!(s.max_message_size, 8192);
        assert_eq!(s.port, 9000);
        assert_eq!(s.ping_interval_ms, 30_000);
    }

    #[test]
    fn logging_format_lowercase() {
        let l: LoggingSettings = serde_json::from_str(r#"{"format": "json"}"#).unwrap();
        assert_eq!(l.format, LogFormat::Json);
        assert_eq!(l.level, "info");
    }
}
