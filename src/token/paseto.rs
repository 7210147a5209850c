use super::{ensure_unexpired, new_claims, TokenError, TokenService};
use crate::clock::{Clock, SystemClock};
use crate::models::{Claims, Identity};
use chrono::Duration;
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::version4::{LocalToken, V4};
use pasetors::Local;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

/// PASETO `v4.local` tokens: encrypted and authenticated with a symmetric key.
///
/// The key is the SHA-256 digest of the configured secret, so any secret
/// length is accepted. The version and purpose are fixed by the token type;
/// anything that is not `v4.local` fails to parse.
pub struct PasetoTokenService {
    key: SymmetricKey<V4>,
    clock: Arc<dyn Clock>,
}

impl PasetoTokenService {
    pub fn new(secret: &str) -> Result<Self, TokenError> {
        Self::with_clock(secret, Arc::new(SystemClock))
    }

    pub fn with_clock(secret: &str, clock: Arc<dyn Clock>) -> Result<Self, TokenError> {
        let digest = Sha256::digest(secret.as_bytes());
        let key = SymmetricKey::<V4>::from(digest.as_slice())
            .map_err(|e| TokenError::Signing(format!("invalid paseto key: {:?}", e)))?;

        Ok(Self { key, clock })
    }
}

impl TokenService for PasetoTokenService {
    fn issue(&self, identity: &Identity, ttl: Duration) -> Result<String, TokenError> {
        let claims = new_claims(identity, ttl, self.clock.as_ref())?;
        let payload =
            serde_json::to_vec(&claims).map_err(|e| TokenError::Signing(e.to_string()))?;

        LocalToken::encrypt(&self.key, &payload, None, None)
            .map_err(|e| TokenError::Signing(format!("{:?}", e)))
    }

    fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let untrusted = UntrustedToken::<Local, V4>::try_from(token).map_err(|e| {
            debug!("rejecting paseto that is not v4.local: {:?}", e);
            TokenError::Invalid
        })?;

        let trusted = LocalToken::decrypt(&self.key, &untrusted, None, None).map_err(|e| {
            debug!("rejecting paseto: {:?}", e);
            TokenError::Invalid
        })?;

        let claims: Claims = serde_json::from_str(trusted.payload()).map_err(|e| {
            debug!("rejecting paseto with unreadable claims: {}", e);
            TokenError::Invalid
        })?;

        ensure_unexpired(claims, self.clock.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};

    fn identity() -> Identity {
        Identity {
            id: "u1".to_string(),
            username: "alice".to_string(),
        }
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn issued_token_is_v4_local_and_verifies() {
        let service = PasetoTokenService::with_clock("paseto-secret", clock()).unwrap();

        let token = service.issue(&identity(), Duration::hours(72)).unwrap();
        assert!(token.starts_with("v4.local."));

        let claims = service.verify(&token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.exp - claims.iat, 72 * 3600);
    }

    #[test]
    fn token_expires_exactly_at_ttl() {
        let clock = clock();
        let service = PasetoTokenService::with_clock("paseto-secret", clock.clone()).unwrap();
        let token = service.issue(&identity(), Duration::seconds(1)).unwrap();

        assert!(service.verify(&token).is_ok());

        clock.advance(Duration::seconds(1));
        assert_eq!(service.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn different_secret_is_invalid() {
        let clock = clock();
        let issuer = PasetoTokenService::with_clock("secret1", clock.clone()).unwrap();
        let verifier = PasetoTokenService::with_clock("secret2", clock).unwrap();

        let token = issuer.issue(&identity(), Duration::hours(1)).unwrap();
        assert_eq!(verifier.verify(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn other_versions_and_purposes_are_rejected() {
        let service = PasetoTokenService::with_clock("paseto-secret", clock()).unwrap();
        let token = service.issue(&identity(), Duration::hours(1)).unwrap();
        let body = token.trim_start_matches("v4.local.");

        for header in ["v3.local.", "v4.public.", "v2.local."] {
            let swapped = format!("{}{}", header, body);
            assert_eq!(service.verify(&swapped), Err(TokenError::Invalid), "{}", header);
        }
    }

    #[test]
    fn malformed_and_jwt_shaped_tokens_are_invalid() {
        let service = PasetoTokenService::with_clock("paseto-secret", clock()).unwrap();

        for token in ["", "v4.local.", "invalid.token.here", "v4.local.!!!"] {
            assert_eq!(service.verify(token), Err(TokenError::Invalid), "{:?}", token);
        }
    }
}
