//! Token claim set.

use serde::{Deserialize, Serialize};

/// Issuance class of a token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Medium-lived access token.
    ShortLived,
    /// Short-lived token used only to obtain a new access token.
    Refresh,
    /// Token without an expiry.
    Permanent,
}

impl TokenKind {
    /// Wire name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ShortLived => "short_lived",
            Self::Refresh => "refresh",
            Self::Permanent => "permanent",
        }
    }
}

/// Claims carried by every issued token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Audience the token is valid for.
    pub aud: String,
    /// Bound identity.
    pub sub: String,
    /// Issuer name.
    pub iss: String,
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Expiry, Unix seconds. Absent on permanent tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Issuance class. Absent on tokens minted by other issuers.
    #[serde(rename = "typ", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TokenKind>,
}

impl Claims {
    /// Whether the token has expired at `now`.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp.is_some_and(|exp| now >= exp)
    }
}
