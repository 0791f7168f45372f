//! Tests for the login endpoint and the tokens it hands out.
//!
//! Tests cover:
//! - Successful login and use of the returned token
//! - Missing and empty fields
//! - Wrong credentials
//! - Login rate limiting

mod common;

use axum::http::StatusCode;
use common::{START, get_with_bearer, json_body, post_json, test_app, test_app_with};
use governor::Quota;
use serde_json::json;
use std::num::NonZeroU32;
use std::time::Duration;
use tokengate::jwt::VerificationOutcome;
use tokengate::rate_limit::RateLimitConfig;
use tower::ServiceExt;

#[tokio::test]
async fn test_login_returns_bearer_token() {
    let t = test_app();

    let response = t
        .app
        .clone()
        .oneshot(post_json(
            "/api/login",
            &json!({"username": "alice", "password": "wonderland"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 7200);
    assert_eq!(body["expires_at"], START + 7200);

    let token = body["token"].as_str().unwrap();
    let claims = match t.codec.verify(token) {
        VerificationOutcome::Valid(claims) => claims,
        other => panic!("Expected a valid token, got {}", other),
    };
    assert_eq!(claims.subject, "alice");
    assert!(claims.token_id.is_some());

    let response = t
        .app
        .oneshot(get_with_bearer("/api/user/info", token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["username"], "alice");
}

#[tokio::test]
async fn test_login_token_expires() {
    let t = test_app_with(|config| config.token_lifetime = Duration::from_secs(30));

    let response = t
        .app
        .clone()
        .oneshot(post_json(
            "/api/login",
            &json!({"username": "alice", "password": "wonderland"}),
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    let token = body["token"].as_str().unwrap().to_string();

    t.clock.advance(Duration::from_secs(29));
    let response = t
        .app
        .clone()
        .oneshot(get_with_bearer("/api/user/info", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    t.clock.advance(Duration::from_secs(1));
    let response = t
        .app
        .oneshot(get_with_bearer("/api/user/info", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_missing_fields() {
    let t = test_app();

    for body in [
        json!({}),
        json!({"username": "alice"}),
        json!({"password": "wonderland"}),
        json!({"username": "", "password": "wonderland"}),
        json!({"username": "alice", "password": ""}),
    ] {
        let response = t
            .app
            .clone()
            .oneshot(post_json("/api/login", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
    }
}

#[tokio::test]
async fn test_login_wrong_credentials() {
    let t = test_app();

    for body in [
        json!({"username": "alice", "password": "looking-glass"}),
        json!({"username": "bob", "password": "wonderland"}),
    ] {
        let response = t
            .app
            .clone()
            .oneshot(post_json("/api/login", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Invalid username or password");
    }
}

#[tokio::test]
async fn test_login_ignores_stale_token() {
    let t = test_app();

    // Login is exempt, so a garbage bearer header must not get in the way.
    let mut request = post_json(
        "/api/login",
        &json!({"username": "root", "password": "toor"}),
    );
    request
        .headers_mut()
        .insert("authorization", "Bearer expired.or.garbage".parse().unwrap());

    let response = t.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_rate_limited() {
    let t = test_app_with(|config| {
        config.rate_limit = RateLimitConfig::with_quota(
            Quota::per_hour(NonZeroU32::new(1).unwrap()).allow_burst(NonZeroU32::new(2).unwrap()),
        );
    });
    let body = json!({"username": "alice", "password": "nope"});

    for _ in 0..2 {
        let response = t
            .app
            .clone()
            .oneshot(post_json("/api/login", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = t
        .app
        .oneshot(post_json("/api/login", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}
