//! User lookup behind the `login` and `token` methods.

use std::collections::HashMap;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tether_settings::UserEntry;

/// A user as seen by the session handlers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRecord {
    /// Numeric user id (positive).
    pub uid: i64,
    /// Login name.
    pub login: String,
    /// Identity string bound into tokens.
    pub identity: String,
}

/// Source of truth for credentials and user records.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Check credentials. `None` for an unknown login or a wrong password.
    async fn authenticate(&self, login: &str, password: &str) -> Option<UserRecord>;

    /// Look up a user by id.
    async fn find_by_uid(&self, uid: i64) -> Option<UserRecord>;
}

/// Fixed directory built from settings. Passwords are stored as SHA-256 hex.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    by_login: HashMap<String, (UserRecord, String)>,
}

impl StaticDirectory {
    /// Build from settings entries. Later duplicates of a login are ignored.
    pub fn new(entries: &[UserEntry]) -> Self {
        let mut by_login = HashMap::with_capacity(entries.len());
        for entry in entries {
            let record = UserRecord {
                uid: entry.uid,
                login: entry.login.clone(),
                identity: entry.identity().to_string(),
            };
            let _ = by_login
                .entry(entry.login.clone())
                .or_insert_with(|| (record, entry.password_sha256.to_ascii_lowercase()));
        }
        Self { by_login }
    }

    /// Number of users.
    pub fn len(&self) -> usize {
        self.by_login.len()
    }

    /// Whether the directory has no users.
    pub fn is_empty(&self) -> bool {
        self.by_login.is_empty()
    }
}

/// Lowercase hex SHA-256 of `password`.
pub fn hash_password(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn authenticate(&self, login: &str, password: &str) -> Option<UserRecord> {
        let (record, digest) = self.by_login.get(login)?;
        (hash_password(password) == *digest).then(|| record.clone())
    }

    async fn find_by_uid(&self, uid: i64) -> Option<UserRecord> {
        self.by_login
            .values()
            .find(|(record, _)| record.uid == uid)
            .map(|(record, _)| record.clone())
    }
}
