//! Token signing and user directory settings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Token issuer configuration.
///
/// `secret` has no default. A deployment must provide it either in the
/// settings file or through `TETHER_AUTH_SECRET`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// Shared HMAC signing secret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// `aud` claim placed in, and required of, every token.
    pub audience: String,
    /// `iss` claim placed in every token.
    pub issuer: String,
    /// Lifetime of short-lived access tokens, in seconds.
    pub short_lived_ttl_secs: u64,
    /// Lifetime of refresh tokens, in seconds.
    pub refresh_ttl_secs: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            secret: None,
            audience: "tether".to_string(),
            issuer: "tether".to_string(),
            short_lived_ttl_secs: 180 * 24 * 60 * 60,
            refresh_ttl_secs: 24 * 60 * 60,
        }
    }
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("audience", &self.audience)
            .field("issuer", &self.issuer)
            .field("short_lived_ttl_secs", &self.short_lived_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish()
    }
}

/// One account in the static user directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntry {
    /// Numeric user ID (must be positive).
    pub uid: i64,
    /// Login name.
    pub login: String,
    /// Identity string bound into issued tokens. Defaults to the login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    /// Lowercase hex SHA-256 of the password.
    pub password_sha256: String,
}

impl UserEntry {
    /// Identity bound into tokens for this user.
    pub fn identity(&self) -> &str {
        self.identity.as_deref().unwrap_or(&self.login)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secret() {
        let auth = AuthSettings {
            secret: Some("hunter2".to_string()),
            ..AuthSettings::default()
        };
        let dbg = format!("{auth:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("REDACTED"));
    }

    #[test]
    fn default_ttls() {
        let auth = AuthSettings::default();
        assert_eq!(auth.refresh_ttl_secs, 86_400);
        assert_eq!(auth.short_lived_ttl_secs, 15_552_000);
        assert!(auth.secret.is_none());
    }

    #[test]
    fn user_identity_falls_back_to_login() {
        let user: UserEntry = serde_json::from_str(
            r#"{"uid": 7, "login": "alice", "passwordSha256": "ab"}"#,
        )
        .unwrap();
        assert_eq!(user.identity(), "alice");

        let user = UserEntry {
            identity: Some("alice@example.com".to_string()),
            ..user
        };
        assert_eq!(user.identity(), "alice@example.com");
    }
}
