//! Login and identity endpoints.
//!
//! - POST `/login` - Exchange username/password for a bearer token
//! - GET `/user/info` - Identity of the caller (authenticated)
//! - GET `/admin/hello` - Requires `ROLE_ADMIN`

use axum::{
    Json, Router,
    extract::State,
    middleware,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Map;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::error::ApiError;
use crate::auth::{Admin, RequireAuth, RequireAuthority};
use crate::credentials::CredentialVerifier;
use crate::jwt::TokenCodec;
use crate::rate_limit::{RateLimitConfig, rate_limit_login};

#[derive(Clone)]
pub struct AuthState {
    pub codec: Arc<TokenCodec>,
    pub credentials: Arc<dyn CredentialVerifier>,
    pub token_lifetime: Duration,
}

pub fn router(state: AuthState, rate_limit: RateLimitConfig) -> Router {
    let login_routes = Router::new()
        .route("/login", post(login))
        .route_layer(middleware::from_fn_with_state(rate_limit, rate_limit_login))
        .with_state(state);

    Router::new()
        .route("/user/info", get(user_info))
        .route("/admin/hello", get(admin_hello))
        .merge(login_routes)
}

#[derive(Deserialize)]
struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    token_type: &'static str,
    expires_at: u64,
    expires_in: u64,
}

async fn login(
    State(state): State<AuthState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let (Some(username), Some(password)) = (req.username, req.password) else {
        return Err(ApiError::bad_request("Username and password are required"));
    };
    if username.is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("Username and password are required"));
    }

    if !state.credentials.verify(&username, &password) {
        info!(username = %username, "Login failed");
        return Err(ApiError::unauthorized("Invalid username or password"));
    }

    let issued = state
        .codec
        .issue(&username, state.token_lifetime, Map::new())
        .map_err(|e| ApiError::token_error("Failed to issue token", e))?;

    info!(username = %username, jti = %issued.jti, "Token issued");

    Ok(Json(LoginResponse {
        token: issued.token,
        token_type: "Bearer",
        expires_at: issued.expires_at,
        expires_in: issued.expires_at - issued.issued_at,
    }))
}

#[derive(Serialize)]
struct UserInfoResponse {
    username: String,
    authorities: Vec<String>,
}

async fn user_info(RequireAuth(identity): RequireAuth) -> Json<UserInfoResponse> {
    Json(UserInfoResponse {
        username: identity.subject,
        authorities: identity.authorities.into_iter().collect(),
    })
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

async fn admin_hello(admin: RequireAuthority<Admin>) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: format!("Hello, administrator {}", admin.identity().subject),
    })
}
