mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{body_json, spawn_app};
use http_body_util::BodyExt;
use serde_json::json;

#[tokio::test]
async fn test_health_is_public() {
    let app = spawn_app().await;

    let (status, body) = app.get("/api/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["database"], true);
    assert_eq!(body["data"]["billingConfigured"], true);
}

#[tokio::test]
async fn test_protected_routes_require_credentials() {
    let app = spawn_app().await;

    for uri in [
        "/api/tokens",
        "/api/content",
        "/api/user/profile",
        "/api/subscription",
    ] {
        let (status, body) = app.get(uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["success"], false);
    }
}

#[tokio::test]
async fn test_invalid_bearer_token_is_rejected() {
    let app = spawn_app().await;

    let response = app
        .send(
            Request::builder()
                .uri("/api/tokens")
                .header("Authorization", "Bearer not-a-real-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_cookie_authenticates_until_logout() {
    let app = spawn_app().await;

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/auth/session")
                .header("Content-Type", "application/json")
                .body(Body::from(json!({ "accessToken": "token-alice" }).to_string()))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .expect("session cookie")
        .to_string();
    let body = body_json(response).await;
    assert_eq!(body["data"]["userId"], "alice");
    assert_eq!(body["data"]["email"], "alice@example.com");

    let with_cookie = |uri: &str, method: &str| {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, cookie.clone())
            .body(Body::empty())
            .unwrap()
    };

    let response = app.send(with_cookie("/api/tokens", "GET")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.send(with_cookie("/api/auth/logout", "POST")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.send(with_cookie("/api/tokens", "GET")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_requires_a_valid_token() {
    let app = spawn_app().await;

    let (status, _) = app
        .post("/api/auth/session", None, json!({ "accessToken": "nope" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.post("/api/auth/session", None, json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_tokens_are_seeded_on_first_read() {
    let app = spawn_app().await;

    let (status, body) = app.get("/api/tokens", Some("alice")).await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["tokensRemaining"], 50);
    assert_eq!(data["tokensUsed"], 0);
    assert_eq!(data["tier"], "FREE");
    assert_eq!(data["monthlyAllowance"], 50);
    assert!(data["resetDate"].is_string());
}

#[tokio::test]
async fn test_tokens_reflect_paid_tier() {
    let app = spawn_app().await;
    app.set_tier("pro", repurposely::domain::SubscriptionTier::Pro)
        .await;

    let (_, body) = app.get("/api/tokens", Some("pro")).await;

    assert_eq!(body["data"]["tier"], "PRO");
    assert_eq!(body["data"]["tokensRemaining"], 1_000);
}

#[tokio::test]
async fn test_init_tokens_is_idempotent() {
    let app = spawn_app().await;

    let (status, first) = app.post("/api/init-tokens", Some("alice"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["data"]["created"], true);
    assert_eq!(first["data"]["tokens"]["tokens_remaining"], 50);
    assert_eq!(first["data"]["subscription"]["subscription_tier"], "FREE");

    app.set_balance("alice", 12).await;

    let (_, second) = app.post("/api/init-tokens", Some("alice"), json!({})).await;
    assert_eq!(second["data"]["created"], false);
    assert_eq!(second["data"]["tokens"]["tokens_remaining"], 12);
    assert_eq!(
        app.count(
            "alice",
            repurposely::domain::TransactionType::AccountInitialization
        )
        .await,
        1
    );
}

#[tokio::test]
async fn test_token_history_validates_limit() {
    let app = spawn_app().await;

    let (status, body) = app.get("/api/tokens/history?limit=5", Some("alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].is_array());

    let (status, _) = app.get("/api/tokens/history?limit=0", Some("alice")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/api/tokens/history?limit=500", Some("alice")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_token_debug_reports_and_repairs() {
    let app = spawn_app().await;

    let (status, body) = app.get("/api/token-debug", Some("alice")).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["userId"], "alice");
    assert_eq!(data["effectiveTier"], "FREE");
    assert_eq!(data["canGenerateImages"], false);
    assert_eq!(data["imageCost"], 10);
    assert_eq!(data["repurposeCost"], 1);
    assert!(data.get("initialized").is_none_or(|v| v.is_null()));

    let (status, body) = app.post("/api/token-debug", Some("alice"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    // The GET above already seeded the balance; the subscription row is new.
    assert_eq!(body["data"]["initialized"], true);
    assert_eq!(body["data"]["tokens"]["tokensRemaining"], 50);

    let (_, body) = app.post("/api/token-debug", Some("alice"), json!({})).await;
    assert_eq!(body["data"]["initialized"], false);
}

#[tokio::test]
async fn test_metrics_without_recorder() {
    let app = spawn_app().await;

    let response = app
        .send(
            Request::builder()
                .uri("/api/metrics")
                .header("Authorization", common::bearer("alice"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&bytes).contains("Metrics not enabled"));
}

#[tokio::test]
async fn test_body_user_id_must_match_caller() {
    let app = spawn_app().await;

    let (status, body) = app
        .post(
            "/api/repurpose",
            Some("alice"),
            json!({
                "originalContent": "Rust 2024 shipped.",
                "outputFormat": "tweet",
                "tone": "casual",
                "userId": "mallory"
            }),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
    assert_eq!(app.text.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_responses_carry_request_id_and_security_headers() {
    let app = spawn_app().await;

    let response = app
        .send(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
}

#[tokio::test]
async fn test_caller_request_id_is_echoed() {
    let app = spawn_app().await;

    let response = app
        .send(
            Request::builder()
                .uri("/api/tokens")
                .header("Authorization", common::bearer("alice"))
                .header("x-request-id", "lb-7f3a")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-request-id").unwrap(), "lb-7f3a");
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-store"
    );
}
