mod auth;
mod error;
mod public;

use axum::Router;

use crate::rate_limit::RateLimitConfig;

pub use auth::AuthState;
pub use error::ApiError;

/// Create the API router.
pub fn create_api_router(auth_state: AuthState, rate_limit: RateLimitConfig) -> Router {
    Router::new()
        .merge(auth::router(auth_state, rate_limit))
        .nest("/public", public::router())
}
