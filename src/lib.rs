pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod password;
pub mod token;
pub mod user_handlers;

use crate::auth::AuthService;
use crate::config::{AppConfig, TokenBackend};
use crate::db::UserStore;
use crate::token::{JwtTokenService, PasetoTokenService, TokenError, TokenService};
use actix_cors::Cors;
use actix_web::http::Method;
use actix_web::{guard, web};
use actix_web_httpauth::middleware::HttpAuthentication;
use std::sync::Arc;
use tracing::debug;

/// Shared by every actix worker.
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub auth: AuthService,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn TokenService>,
        config: &AppConfig,
    ) -> Self {
        let auth = AuthService::new(
            users.clone(),
            tokens,
            config.token_ttl,
            config.bcrypt_cost,
        );
        Self { users, auth }
    }

    /// Build the state with the token backend named in `config`.
    pub fn from_config(users: Arc<dyn UserStore>, config: &AppConfig) -> Result<Self, TokenError> {
        let tokens: Arc<dyn TokenService> = match config.token_backend {
            TokenBackend::Jwt => Arc::new(JwtTokenService::new(&config.jwt_secret)),
            TokenBackend::Paseto => Arc::new(PasetoTokenService::new(&config.jwt_secret)?),
        };
        Ok(Self::new(users, tokens, config))
    }
}

/// CORS policy for browser clients. An empty origin list allows any origin.
pub fn cors(allowed_origins: &[String]) -> Cors {
    let mut cors = Cors::default();

    if allowed_origins.is_empty() {
        cors = cors.allow_any_origin();
        debug!("CORS: allowing any origin");
    } else {
        for origin in allowed_origins {
            cors = cors.allowed_origin(origin);
        }
        debug!("CORS: allowed origins {:?}", allowed_origins);
    }

    cors.allowed_methods(vec![
        Method::GET,
        Method::POST,
        Method::HEAD,
        Method::PUT,
        Method::DELETE,
        Method::PATCH,
    ])
    .allow_any_header()
    .max_age(3600)
}

/// Register every route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    let gate = HttpAuthentication::bearer(auth::validator);

    cfg.service(user_handlers::health).service(
        web::scope("/api")
            .service(user_handlers::login)
            .service(
                web::resource("/user")
                    .guard(guard::Post())
                    .to(user_handlers::create_user),
            )
            .service(
                web::scope("/user")
                    .wrap(gate)
                    .route("", web::get().to(user_handlers::get_all_users))
                    .route("/login/restricted", web::get().to(user_handlers::restricted))
                    .route("/{id}", web::get().to(user_handlers::get_single_user))
                    .route("/{id}", web::put().to(user_handlers::update_user))
                    .route("/{id}", web::delete().to(user_handlers::delete_user)),
            ),
    );
}
