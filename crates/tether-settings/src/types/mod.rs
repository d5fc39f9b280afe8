//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]`. Each type implements
//! [`Default`] with production default values, and `#[serde(default)]`
//! allows partial JSON where missing fields take their default.

mod auth;
mod server;

pub use auth::*;
pub use server::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for tether.
///
/// Loaded from `~/.tether/settings.json` with defaults applied for
/// missing fields. Environment variables can override specific values.
///
/// # JSON Format
///
/// ```json
/// {
///   "server": { "port": 9000 },
///   "auth": { "secret": "...", "audience": "tether" },
///   "services": ["rpc"],
///   "users": [{ "uid": 1, "login": "alice", "passwordSha256": "..." }]
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TetherSettings {
    /// Listener and transport settings.
    pub server: ServerSettings,
    /// Token issuer settings.
    pub auth: AuthSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
    /// Names of the services exposed at `/ws/{name}`.
    pub services: Vec<String>,
    /// Static user directory backing the `login` method.
    pub users: Vec<UserEntry>,
}

impl Default for TetherSettings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            auth: AuthSettings::default(),
            logging: LoggingSettings::default(),
            services: vec!["rpc".to_string()],
            users: Vec::new(),
        }
    }
}

impl TetherSettings {
    /// Check cross-field constraints that serde cannot express.
    ///
    /// The signing secret is not checked here; callers that need a token
    /// issuer check for it when building one.
    pub fn validate(&self) -> Result<()> {
        if self.server.max_message_size == 0 {
            return Err(SettingsError::InvalidValue(
                "server.maxMessageSize must be positive".into(),
            ));
        }
        if self.server.send_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.sendQueueCapacity must be positive".into(),
            ));
        }
        if self.server.handler_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "server.handlerTimeoutMs must be positive".into(),
            ));
        }
        if self.server.ping_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "server.pingIntervalMs must be positive".into(),
            ));
        }
        if self.server.pong_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "server.pongTimeoutMs must be positive".into(),
            ));
        }
        if self.auth.audience.trim().is_empty() {
            return Err(SettingsError::InvalidValue("auth.audience is empty".into()));
        }
        if self.auth.short_lived_ttl_secs == 0 || self.auth.refresh_ttl_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "auth token lifetimes must be positive".into(),
            ));
        }
        if self.auth.secret.as_deref().is_some_and(str::is_empty) {
            return Err(SettingsError::InvalidValue("auth.secret is empty".into()));
        }

        let mut seen = std::collections::HashSet::new();
        for name in &self.services {
            if name.is_empty() || !seen.insert(name.as_str()) {
                return Err(SettingsError::InvalidValue(format!(
                    "service name {name:?} is empty or duplicated"
                )));
            }
        }

        let mut uids = std::collections::HashSet::new();
        for user in &self.users {
            if user.uid <= 0 {
                return Err(SettingsError::InvalidValue(format!(
                    "user {} has non-positive uid {}",
                    user.login, user.uid
                )));
            }
            if !uids.insert(user.uid) {
                return Err(SettingsError::InvalidValue(format!(
                    "duplicate uid {}",
                    user.uid
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn user(uid: i64, login: &str) -> UserEntry {
        UserEntry {
            uid,
            login: login.to_string(),
            identity: None,
            password_sha256: String::new(),
        }
    }

    #[test]
    fn defaults_are_valid() {
        let settings = TetherSettings::default();
        assert_eq!(settings.services, vec!["rpc".to_string()]);
        assert!(settings.users.is_empty());
        settings.validate().unwrap();
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(TetherSettings::default()).unwrap();
        assert!(json["server"].get("maxMessageSize").is_some());
        assert!(json["auth"].get("refreshTtlSecs").is_some());
        assert!(json["auth"].get("secret").is_none());
    }

    #[test]
    fn rejects_empty_audience() {
        let mut settings = TetherSettings::default();
        settings.auth.audience = "  ".into();
        assert_matches!(settings.validate(), Err(SettingsError::InvalidValue(_)));
    }

    #[test]
    fn rejects_zero_ttl() {
        let mut settings = TetherSettings::default();
        settings.auth.refresh_ttl_secs = 0;
        assert_matches!(settings.validate(), Err(SettingsError::InvalidValue(_)));
    }

    #[test]
    fn rejects_zero_message_size() {
        let mut settings = TetherSettings::default();
        settings.server.max_message_size = 0;
        assert_matches!(settings.validate(), Err(SettingsError::InvalidValue(_)));
    }

    #[test]
    fn rejects_zero_ping_interval() {
        let settings: TetherSettings =
            serde_json::from_value(serde_json::json!({"server": {"pingIntervalMs": 0}})).unwrap();
        assert_matches!(settings.validate(), Err(SettingsError::InvalidValue(msg)) if msg.contains("pingIntervalMs"));
    }

    #[test]
    fn rejects_zero_pong_timeout() {
        let mut settings = TetherSettings::default();
        settings.server.pong_timeout_ms = 0;
        assert_matches!(settings.validate(), Err(SettingsError::InvalidValue(msg)) if msg.contains("pongTimeoutMs"));
    }

    #[test]
    fn rejects_empty_secret() {
        let mut settings = TetherSettings::default();
        settings.auth.secret = Some(String::new());
        assert_matches!(settings.validate(), Err(SettingsError::InvalidValue(_)));
    }

    #[test]
    fn rejects_duplicate_services() {
        let mut settings = TetherSettings::default();
        settings.services = vec!["rpc".into(), "rpc".into()];
        assert_matches!(settings.validate(), Err(SettingsError::InvalidValue(_)));
    }

    #[test]
    fn rejects_bad_uids() {
        let mut settings = TetherSettings::default();
        settings.users = vec![user(0, "root")];
        assert_matches!(settings.validate(), Err(SettingsError::InvalidValue(_)));

        settings.users = vec![user(1, "a"), user(1, "b")];
        assert_matches!(settings.validate(), Err(SettingsError::InvalidValue(_)));

        settings.users = vec![user(1, "a"), user(2, "b")];
        settings.validate().unwrap();
    }
}
