//! Branded ID newtypes for type safety.
//!
//! Sessions and transport connections each get a distinct ID type, a newtype
//! around `String`, so a connection key can never be passed where a session
//! ID is expected.
//!
//! IDs are a short type prefix followed by a UUID v7 generated via
//! [`uuid::Uuid::now_v7`]. Within one process successive IDs of the same type
//! compare in generation order, both as strings and as UUIDs.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Generate a new prefixed UUID v7 string (time-ordered).
fn new_v7(prefix: &str) -> String {
    format!("{prefix}{}", Uuid::now_v7())
}

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Prefix carried by every generated value of this type.
            pub const PREFIX: &'static str = $prefix;

            /// Create a new ID (UUID v7, time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(new_v7($prefix))
            }

            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }

            /// Decode the embedded UUID, if this ID was generated (not imported).
            pub fn uuid(&self) -> Option<Uuid> {
                self.0
                    .strip_prefix($prefix)
                    .and_then(|raw| Uuid::parse_str(raw).ok())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Process-local session identifier, assigned once when a client connects.
    SessionId, "sess_"
}

branded_id! {
    /// Key of one live transport connection inside a service's session table.
    ConnectionId, "conn_"
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
