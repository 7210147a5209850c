use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::password::MAX_PASSWORD_BYTES;
use crate::models::{
    CreateUserRequest, Envelope, LoginRequest, LoginResponse, UpdateUserRequest, User,
};
use crate::AppState;
use actix_web::{get, post, web, HttpResponse, Responder};
use chrono::Utc;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

/// POST /api/auth
#[post("/auth")]
pub async fn login(
    state: web::Data<AppState>,
    data: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let token = state.auth.login(&data.login, &data.password).await?;

    Ok(HttpResponse::Ok().json(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: state.auth.token_ttl().num_seconds(),
    }))
}

/// POST /api/user
pub async fn create_user(
    state: web::Data<AppState>,
    data: web::Json<CreateUserRequest>,
) -> Result<HttpResponse, ApiError> {
    let data = data.into_inner();
    let username = data.username.trim();
    let email = data.email.trim();

    if username.is_empty() {
        return Err(ApiError::BadRequest("username is required".to_string()));
    }
    if !email.contains('@') {
        return Err(ApiError::BadRequest("a valid email is required".to_string()));
    }
    if data.password.is_empty() {
        return Err(ApiError::BadRequest("password is required".to_string()));
    }
    if data.password.len() > MAX_PASSWORD_BYTES {
        return Err(ApiError::BadRequest(format!(
            "password must be at most {} bytes",
            MAX_PASSWORD_BYTES
        )));
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: email.to_string(),
        password_hash: state.auth.hash_password(&data.password).await?,
        created_at: now,
        updated_at: now,
    };

    let user = state.users.insert(user).await?;
    info!("Created user {} ({})", user.username, user.id);

    Ok(HttpResponse::Created().json(Envelope::success("User has been created", user)))
}

/// GET /api/user
pub async fn get_all_users(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let users = state.users.list().await;
    if users.is_empty() {
        return Err(ApiError::NotFound("Users not found".to_string()));
    }

    Ok(HttpResponse::Ok().json(Envelope::success("Users found", users)))
}

/// GET /api/user/{id}
pub async fn get_single_user(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&path)?;
    let user = state
        .users
        .find_by_id(id)
        .await
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(HttpResponse::Ok().json(Envelope::success("User found", user)))
}

/// PUT /api/user/{id}
pub async fn update_user(
    state: web::Data<AppState>,
    path: web::Path<String>,
    data: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&path)?;
    let data = data.into_inner();

    let username = data.username.map(|u| u.trim().to_string());
    let email = data.email.map(|e| e.trim().to_string());
    if username.as_deref() == Some("") {
        return Err(ApiError::BadRequest("username must not be empty".to_string()));
    }
    if email.as_deref().is_some_and(|e| !e.contains('@')) {
        return Err(ApiError::BadRequest("a valid email is required".to_string()));
    }

    let user = state.users.update(id, username, email).await?;
    info!("Updated user {} ({})", user.username, user.id);

    Ok(HttpResponse::Ok().json(Envelope::success("User updated", user)))
}

/// DELETE /api/user/{id}
pub async fn delete_user(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&path)?;
    state.users.delete(id).await?;
    info!("Deleted user {}", id);

    Ok(HttpResponse::Ok().json(Envelope::message("User deleted")))
}

/// GET /api/user/login/restricted
pub async fn restricted(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let claims = caller.0;
    // The token outlives the record, so the user may be gone by now.
    let user = match Uuid::parse_str(&claims.sub) {
        Ok(id) => state.users.find_by_id(id).await,
        Err(_) => None,
    };

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Accessible",
        "data": {
            "sub": claims.sub,
            "username": claims.username,
            "expires_at": claims.exp,
            "user": user,
        }
    })))
}

#[get("/health")]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().body("OK")
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound("User not found".to_string()))
}
