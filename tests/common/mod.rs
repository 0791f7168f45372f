#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use governor::Quota;
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokengate::{
    ServerConfig, clock::FixedClock, create_app, credentials::StaticCredentials, jwt::TokenCodec,
    rate_limit::RateLimitConfig,
};

pub const JWT_SECRET: &[u8] = b"integration-test-secret-0123456789abcdef";
pub const START: u64 = 1_700_000_000;

pub struct TestApp {
    pub app: Router,
    pub codec: TokenCodec,
    pub clock: Arc<FixedClock>,
}

/// Build the app with a pinned clock and two users: alice/wonderland and
/// root/toor. Tokens carry roles from the `roles` claim.
pub fn test_app() -> TestApp {
    test_app_with(|_| {})
}

pub fn test_app_with(customize: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let clock = Arc::new(FixedClock::new(START));
    let mut config = ServerConfig::new(JWT_SECRET);
    config.clock = clock.clone();
    config.roles_claim = Some("roles".into());
    config.credentials = Arc::new(
        StaticCredentials::new()
            .with_user("alice", "wonderland")
            .with_user("root", "toor"),
    );
    // All oneshot requests share one bucket; keep it out of the way.
    let generous = NonZeroU32::new(1000).unwrap();
    config.rate_limit = RateLimitConfig::with_quota(Quota::per_second(generous));
    customize(&mut config);

    let codec = config.codec().expect("Failed to build codec");
    let app = create_app(&config).expect("Failed to build app");
    TestApp { app, codec, clock }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn get_with_bearer(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
