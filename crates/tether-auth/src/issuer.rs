//! HMAC-signed token issuance and verification.
//!
//! Tokens are JWTs signed with HS256 over a shared secret. Verification
//! accepts any algorithm of the HMAC family (HS256/384/512) and rejects all
//! others. Expiry is checked against an injected [`Clock`], not the system
//! time, so lifetimes are testable.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::claims::{Claims, TokenKind};
use crate::clock::{Clock, SystemClock};
use crate::errors::AuthError;

/// Tolerated clock skew for `iat` values ahead of the verifier's clock.
const IAT_SKEW_SECS: i64 = 60;

/// Issuer configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct TokenConfig {
    /// Shared HMAC secret.
    pub secret: SecretString,
    /// Audience placed in, and required of, every token.
    pub audience: String,
    /// Issuer name placed in every token.
    pub issuer: String,
    /// Lifetime of short-lived tokens.
    pub short_lived_ttl: Duration,
    /// Lifetime of refresh tokens.
    pub refresh_ttl: Duration,
}

impl TokenConfig {
    /// Config with default issuer and lifetimes (180 days / 24 hours).
    pub fn new(secret: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            secret: SecretString::from(secret.into()),
            audience: audience.into(),
            issuer: "tether".to_string(),
            short_lived_ttl: Duration::from_secs(180 * 24 * 60 * 60),
            refresh_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Mints and validates identity tokens.
///
/// Stateless apart from the fixed keys, so one instance is shared by every
/// connection for the life of the process.
#[derive(Clone)]
pub struct TokenIssuer {
    audience: String,
    issuer: String,
    short_lived_ttl: i64,
    refresh_ttl: i64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("audience", &self.audience)
            .field("issuer", &self.issuer)
            .field("short_lived_ttl", &self.short_lived_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Build an issuer on the system clock.
    pub fn new(config: TokenConfig) -> Result<Self, AuthError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build an issuer on a custom clock.
    pub fn with_clock(config: TokenConfig, clock: Arc<dyn Clock>) -> Result<Self, AuthError> {
        let secret = config.secret.expose_secret().as_bytes();
        if secret.is_empty() {
            return Err(AuthError::InvalidConfig("signing secret is empty".into()));
        }
        if config.audience.is_empty() {
            return Err(AuthError::InvalidConfig("audience is empty".into()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.set_required_spec_claims(&["sub", "aud"]);
        validation.set_audience(&[config.audience.as_str()]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            short_lived_ttl: ttl_secs(config.short_lived_ttl),
            refresh_ttl: ttl_secs(config.refresh_ttl),
            audience: config.audience,
            issuer: config.issuer,
            validation,
            clock,
        })
    }

    /// Audience this issuer signs for.
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Issue a medium-lived access token.
    pub fn issue_short_lived(&self, identity: &str) -> Result<String, AuthError> {
        self.issue(identity, TokenKind::ShortLived)
    }

    /// Issue a refresh token.
    pub fn issue_refresh(&self, identity: &str) -> Result<String, AuthError> {
        self.issue(identity, TokenKind::Refresh)
    }

    /// Issue a token with no expiry.
    pub fn issue_permanent(&self, identity: &str) -> Result<String, AuthError> {
        self.issue(identity, TokenKind::Permanent)
    }

    /// Issue a token of the given kind for `identity`.
    pub fn issue(&self, identity: &str, kind: TokenKind) -> Result<String, AuthError> {
        let iat = self.clock.now();
        let exp = match kind {
            TokenKind::ShortLived => Some(iat.saturating_add(self.short_lived_ttl)),
            TokenKind::Refresh => Some(iat.saturating_add(self.refresh_ttl)),
            TokenKind::Permanent => None,
        };
        let claims = Claims {
            aud: self.audience.clone(),
            sub: identity.to_string(),
            iss: self.issuer.clone(),
            iat,
            exp,
            kind: Some(kind),
        };
        self.sign_claims(&claims)
    }

    /// Sign an arbitrary claim set with HS256.
    pub fn sign_claims(&self, claims: &Claims) -> Result<String, AuthError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Verify a token and return its bound identity.
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        self.verify_claims(token).map(|claims| claims.sub)
    }

    /// Verify a token and return all of its claims.
    pub fn verify_claims(&self, token: &str) -> Result<Claims, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                debug!(error = %e, "token rejected");
                AuthError::Unauthorized
            })?;
        let claims = data.claims;

        let now = self.clock.now();
        if claims.is_expired_at(now) {
            debug!(sub = %claims.sub, exp = ?claims.exp, now, "token expired");
            return Err(AuthError::Unauthorized);
        }
        if claims.iat > now.saturating_add(IAT_SKEW_SECS) {
            debug!(sub = %claims.sub, iat = claims.iat, now, "token issued in the future");
            return Err(AuthError::Unauthorized);
        }
        Ok(claims)
    }

    /// Verify a token and require it to be of `kind`.
    pub fn verify_kind(&self, token: &str, kind: TokenKind) -> Result<Claims, AuthError> {
        let claims = self.verify_claims(token)?;
        if claims.kind != Some(kind) {
            debug!(sub = %claims.sub, expected = kind.as_str(), "token kind mismatch");
            return Err(AuthError::Unauthorized);
        }
        Ok(claims)
    }
}

fn ttl_secs(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
