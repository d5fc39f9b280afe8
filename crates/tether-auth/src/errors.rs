//! Auth error types.

/// Errors that can occur while issuing or verifying tokens.
///
/// Verification failures of every kind collapse into [`AuthError::Unauthorized`]
/// so a caller cannot learn which check rejected a token.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Token is missing, malformed, badly signed, expired, or for another audience.
    #[error("unauthorized access")]
    Unauthorized,

    /// Signing a token failed.
    #[error("token signing failed: {0}")]
    Signing(String),

    /// The issuer was constructed without a usable secret or audience.
    #[error("invalid token configuration: {0}")]
    InvalidConfig(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
