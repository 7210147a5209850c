use super::{ensure_unexpired, new_claims, TokenError, TokenService};
use crate::clock::{Clock, SystemClock};
use crate::models::{Claims, Identity};
use chrono::Duration;
use jsonwebtoken::{
    decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use std::sync::Arc;
use tracing::debug;

/// The only algorithm this service signs with or accepts.
pub const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

/// HS256 JSON Web Tokens.
pub struct JwtTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl JwtTokenService {
    pub fn new(secret: &str) -> Self {
        Self::with_clock(secret, Arc::new(SystemClock))
    }

    pub fn with_clock(secret: &str, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(JWT_ALGORITHM);
        // Expiry is checked against the injected clock by `ensure_unexpired`.
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            clock,
        }
    }
}

impl TokenService for JwtTokenService {
    fn issue(&self, identity: &Identity, ttl: Duration) -> Result<String, TokenError> {
        let claims = new_claims(identity, ttl, self.clock.as_ref())?;

        encode(&Header::new(JWT_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let header = decode_header(token).map_err(|e| {
            debug!("rejecting jwt with unreadable header: {}", e);
            TokenError::Invalid
        })?;

        if header.alg != JWT_ALGORITHM {
            debug!("rejecting jwt signed with {:?}", header.alg);
            return Err(TokenError::Invalid);
        }

        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            debug!("rejecting jwt: {}", e);
            TokenError::Invalid
        })?;

        ensure_unexpired(data.claims, self.clock.as_ref())
    }
}
