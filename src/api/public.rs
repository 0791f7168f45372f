//! Endpoints reachable without a token.

use axum::{Json, Router, routing::get};
use serde::Serialize;

pub fn router() -> Router {
    Router::new().route("/hello", get(hello))
}

#[derive(Serialize)]
struct HelloResponse {
    message: &'static str,
}

async fn hello() -> Json<HelloResponse> {
    Json(HelloResponse {
        message: "This is a public endpoint, no token required",
    })
}
