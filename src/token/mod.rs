// Tokens are stateless: one stays valid until its `exp` even if the user is
// deleted or renamed.

pub mod jwt;
pub mod paseto;

use crate::clock::Clock;
use crate::models::{Claims, Identity};
use chrono::Duration;
use thiserror::Error;

pub use jwt::JwtTokenService;
pub use paseto::PasetoTokenService;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Malformed token, wrong algorithm, or bad signature. Deliberately one variant.
    #[error("invalid token")]
    Invalid,

    #[error("token has expired")]
    Expired,

    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Issue and verify bearer tokens.
pub trait TokenService: Send + Sync {
    /// Mint a token for `identity` that expires `ttl` from now.
    fn issue(&self, identity: &Identity, ttl: Duration) -> Result<String, TokenError>;

    /// Check signature and expiry, returning the embedded claims.
    fn verify(&self, token: &str) -> Result<Claims, TokenError>;
}

pub(crate) fn new_claims(
    identity: &Identity,
    ttl: Duration,
    clock: &dyn Clock,
) -> Result<Claims, TokenError> {
    let now = clock.now();
    let exp = now
        .checked_add_signed(ttl)
        .ok_or_else(|| TokenError::Signing(format!("token lifetime {} is out of range", ttl)))?;

    Ok(Claims {
        sub: identity.id.clone(),
        username: identity.username.clone(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    })
}

/// A token is live only while `now < exp`.
pub(crate) fn ensure_unexpired(claims: Claims, clock: &dyn Clock) -> Result<Claims, TokenError> {
    if clock.now().timestamp() >= claims.exp {
        return Err(TokenError::Expired);
    }
    Ok(claims)
}
