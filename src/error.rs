use crate::db::StoreError;
use crate::token::TokenError;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Failures of login and token checks, as seen by the HTTP layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown user or wrong password. The two are never told apart.
    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("token signing failed: {0}")]
    TokenSigningFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    fn public_message(&self) -> String {
        match self {
            AuthError::TokenSigningFailed(_) | AuthError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Invalid => AuthError::InvalidToken,
            TokenError::Expired => AuthError::ExpiredToken,
            TokenError::Signing(msg) => AuthError::TokenSigningFailed(msg),
        }
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials | AuthError::InvalidToken | AuthError::ExpiredToken => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::TokenSigningFailed(_) | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "status": "error",
            "message": self.public_message(),
        }))
    }
}

/// Errors returned by the user endpoints.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ApiError::NotFound("User not found".to_string()),
            StoreError::Duplicate(field) => {
                ApiError::Conflict(format!("A user with this {} already exists", field))
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Auth(e) => e.status_code(),
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ApiError::Auth(e) => e.error_response(),
            ApiError::Internal(_) => HttpResponse::InternalServerError().json(json!({
                "status": "error",
                "message": "Internal server error",
            })),
            other => HttpResponse::build(other.status_code()).json(json!({
                "status": "error",
                "message": other.to_string(),
            })),
        }
    }
}
