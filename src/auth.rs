use crate::db::UserStore;
use crate::error::AuthError;
use crate::models::{Claims, User};
use crate::password::{hash_password, verify_password, PasswordError};
use crate::token::TokenService;
use crate::AppState;
use actix_web::dev::{Payload, ServiceRequest};
use actix_web::{web, Error, FromRequest, HttpMessage, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use chrono::Duration;
use std::future::{ready, Ready};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Login and token checks on top of a user store and a token backend.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn TokenService>,
    token_ttl: Duration,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn TokenService>,
        token_ttl: Duration,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            users,
            tokens,
            token_ttl,
            bcrypt_cost,
        }
    }

    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// Check a username/email and password and mint a token for that user.
    pub async fn login(&self, login: &str, password: &str) -> Result<String, AuthError> {
        let user = match self.users.find_by_login(login).await {
            Some(user) => user,
            None => {
                warn!("Failed login attempt: unknown user {}", login);
                return Err(AuthError::InvalidCredentials);
            }
        };

        match self.check_password(&user, password).await {
            Ok(()) => {}
            Err(PasswordError::Mismatch | PasswordError::TooLong) => {
                warn!("Failed login attempt: wrong password for {}", user.username);
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(AuthError::Internal(e.to_string())),
        }

        let token = self.tokens.issue(&user.identity(), self.token_ttl)?;
        info!("Login successful: {} ({})", user.username, user.id);
        Ok(token)
    }

    /// Verify a bearer token and return its claims.
    pub fn authorize(&self, token: &str) -> Result<Claims, AuthError> {
        self.tokens.verify(token).map_err(|e| {
            debug!("Rejected bearer token: {}", e);
            AuthError::from(e)
        })
    }

    /// Hash a new password with the configured bcrypt cost, off the async workers.
    pub async fn hash_password(&self, plaintext: &str) -> Result<String, AuthError> {
        let plaintext = plaintext.to_string();
        let cost = self.bcrypt_cost;

        tokio::task::spawn_blocking(move || hash_password(&plaintext, cost))
            .await
            .map_err(|e| AuthError::Internal(format!("task join error: {}", e)))?
            .map_err(|e| AuthError::Internal(e.to_string()))
    }

    async fn check_password(&self, user: &User, password: &str) -> Result<(), PasswordError> {
        let plaintext = password.to_string();
        let stored = user.password_hash.clone();

        tokio::task::spawn_blocking(move || verify_password(&plaintext, &stored))
            .await
            .map_err(|e| PasswordError::Hashing(format!("task join error: {}", e)))?
    }
}

/// Bearer validator for `HttpAuthentication::bearer`.
///
/// On success the token's [`Claims`] are stored in the request extensions for
/// [`AuthenticatedUser`]; on failure the request stops here with a 401.
pub async fn validator(
    req: ServiceRequest,
    credentials: BearerAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    let state = match req.app_data::<web::Data<AppState>>().cloned() {
        Some(state) => state,
        None => {
            let err = AuthError::Internal("app state is not registered".to_string());
            return Err((err.into(), req));
        }
    };

    match state.auth.authorize(credentials.token()) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            Ok(req)
        }
        Err(e) => Err((e.into(), req)),
    }
}

/// Claims of the caller, available to handlers behind the gate.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Claims);

impl FromRequest for AuthenticatedUser {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Claims>()
                .cloned()
                .map(AuthenticatedUser)
                .ok_or(AuthError::InvalidToken),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::db::InMemoryUserStore;
    use crate::token::JwtTokenService;
    use actix_web::test::TestRequest;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    async fn service_with_user(clock: Arc<ManualClock>) -> (AuthService, User) {
        let store = Arc::new(InMemoryUserStore::new());
        let tokens = Arc::new(JwtTokenService::with_clock("auth-test-secret", clock));
        let auth = AuthService::new(store.clone(), tokens, Duration::hours(72), 4);

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: auth.hash_password("correct horse").await.unwrap(),
            created_at: now,
            updated_at: now,
        };
        let user = store.insert(user).await.unwrap();
        (auth, user)
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        ))
    }

    #[tokio::test]
    async fn login_issues_token_for_user() {
        let (auth, user) = service_with_user(clock()).await;

        let token = auth.login("alice", "correct horse").await.unwrap();
        let claims = auth.authorize(&token).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.exp - claims.iat, 72 * 3600);

        let by_email = auth.login("alice@example.com", "correct horse").await;
        assert!(by_email.is_ok());
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_look_the_same() {
        let (auth, _) = service_with_user(clock()).await;

        let wrong_password = auth.login("alice", "correct horsf").await.unwrap_err();
        let unknown_user = auth.login("mallory", "correct horse").await.unwrap_err();

        assert_eq!(wrong_password, AuthError::InvalidCredentials);
        assert_eq!(unknown_user, AuthError::InvalidCredentials);
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }

    #[tokio::test]
    async fn corrupt_stored_hash_is_internal() {
        let store = Arc::new(InMemoryUserStore::new());
        let tokens = Arc::new(JwtTokenService::with_clock("auth-test-secret", clock()));
        let auth = AuthService::new(store.clone(), tokens, Duration::hours(1), 4);

        let now = Utc::now();
        store
            .insert(User {
                id: Uuid::new_v4(),
                username: "broken".to_string(),
                email: "broken@example.com".to_string(),
                password_hash: "plaintext-oops".to_string(),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        assert!(matches!(
            auth.login("broken", "anything").await,
            Err(AuthError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn authorize_reports_expiry_separately() {
        let clock = clock();
        let (auth, _) = service_with_user(clock.clone()).await;
        let token = auth.login("alice", "correct horse").await.unwrap();

        assert_eq!(auth.authorize("garbage"), Err(AuthError::InvalidToken));

        clock.advance(Duration::hours(72));
        assert_eq!(auth.authorize(&token), Err(AuthError::ExpiredToken));
    }

    #[actix_web::test]
    async fn extractor_requires_claims_in_extensions() {
        let req = TestRequest::default().to_http_request();
        let missing = AuthenticatedUser::extract(&req).await;
        assert_eq!(missing.unwrap_err(), AuthError::InvalidToken);

        let claims = Claims {
            sub: "u1".to_string(),
            username: "alice".to_string(),
            iat: 0,
            exp: 60,
        };
        let req = TestRequest::default().to_http_request();
        req.extensions_mut().insert(claims.clone());

        let user = AuthenticatedUser::extract(&req).await.unwrap();
        assert_eq!(user.0, claims);
    }
}
