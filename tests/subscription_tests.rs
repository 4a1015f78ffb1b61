mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{ADMIN_ID, ENTERPRISE_PRICE, PRO_PRICE, body_json, spawn_app};
use repurposely::db::SubscriptionChange;
use repurposely::domain::{SubscriptionTier, TransactionType};
use serde_json::json;

async fn subscribe(app: &common::TestApp, user: &str, tier: SubscriptionTier) {
    app.set_subscription(
        user,
        SubscriptionChange {
            tier: Some(tier),
            is_active: Some(true),
            stripe_customer_id: Some(format!("cus_{user}")),
            stripe_subscription_id: Some(Some(format!("sub_{user}"))),
            ..Default::default()
        },
    )
    .await;
}

// ============================================================================
// Checkout, cancellation and portal
// ============================================================================

#[tokio::test]
async fn test_checkout_creates_customer_once() {
    let app = spawn_app().await;

    let (status, body) = app
        .post("/api/stripe/create-checkout", Some("alice"), json!({ "tier": "pro" }))
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["sessionId"], "cs_test_1");
    assert_eq!(body["data"]["url"], "https://checkout.stripe.test/cs_test_1");

    let stored = app.store().get_subscription("alice").await.unwrap().unwrap();
    assert_eq!(stored.stripe_customer_id.as_deref(), Some("cus_alice"));
    assert_eq!(stored.subscription_tier, SubscriptionTier::Free);

    let request = app.billing.last_checkout.lock().unwrap().clone().unwrap();
    assert_eq!(request.price_id, PRO_PRICE);
    assert_eq!(request.user_id, "alice");
    assert_eq!(request.tier, "PRO");
    assert!(request.success_url.starts_with("https://app.test/dashboard?checkout=success"));
    assert!(request.cancel_url.starts_with("https://app.test/pricing"));

    let (status, _) = app
        .post(
            "/api/stripe/create-checkout",
            Some("alice"),
            json!({ "tier": "ENTERPRISE" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        app.billing
            .last_checkout
            .lock()
            .unwrap()
            .as_ref()
            .unwrap()
            .price_id,
        ENTERPRISE_PRICE
    );

    let customers = app
        .billing
        .calls()
        .into_iter()
        .filter(|c| c == "create_customer")
        .count();
    assert_eq!(customers, 1);
}

#[tokio::test]
async fn test_checkout_rejects_unpurchasable_tiers() {
    let app = spawn_app().await;

    for tier in ["free", "gold", ""] {
        let (status, _) = app
            .post("/api/stripe/create-checkout", Some("alice"), json!({ "tier": tier }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{tier}");
    }
    assert!(app.billing.calls().is_empty());
}

#[tokio::test]
async fn test_checkout_while_subscribed_is_conflict() {
    let app = spawn_app().await;
    subscribe(&app, "alice", SubscriptionTier::Pro).await;

    let (status, body) = app
        .post(
            "/api/stripe/create-checkout",
            Some("alice"),
            json!({ "tier": "enterprise" }),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert!(app.billing.calls().is_empty());
}

#[tokio::test]
async fn test_checkout_without_billing_config_is_unavailable() {
    let mut config = common::test_config();
    config.stripe.secret_key.clear();
    let app = common::spawn_app_with(config).await;

    let (status, _) = app
        .post("/api/stripe/create-checkout", Some("alice"), json!({ "tier": "pro" }))
        .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(app.billing.calls().is_empty());
}

#[tokio::test]
async fn test_cancel_without_subscription_is_404() {
    let app = spawn_app().await;

    let (status, body) = app
        .post("/api/stripe/cancel-subscription", Some("alice"), json!({}))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert!(app.billing.calls().is_empty());
}

#[tokio::test]
async fn test_cancel_schedules_at_period_end() {
    let app = spawn_app().await;
    subscribe(&app, "alice", SubscriptionTier::Pro).await;

    let (status, body) = app
        .post("/api/stripe/cancel-subscription", Some("alice"), json!({}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["subscriptionId"], "sub_alice");
    assert!(body["cancelDate"].as_str().unwrap().starts_with("2030-03-17"));
    assert!(body.get("data").is_none());

    let stored = app.store().get_subscription("alice").await.unwrap().unwrap();
    assert!(stored.is_active);
    assert!(stored.cancel_at_period_end);
    assert_eq!(stored.subscription_tier, SubscriptionTier::Pro);
    assert_eq!(app.billing.calls(), vec!["schedule_cancellation"]);
}

#[tokio::test]
async fn test_portal_requires_customer() {
    let app = spawn_app().await;

    let (status, _) = app
        .post("/api/stripe/create-portal", Some("alice"), json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.billing.calls().is_empty());

    subscribe(&app, "alice", SubscriptionTier::Pro).await;
    let (status, body) = app
        .post("/api/stripe/create-portal", Some("alice"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let url = body["data"]["url"].as_str().unwrap();
    assert!(url.starts_with("https://billing.stripe.test/cus_alice"));
    assert!(url.contains("https://app.test/dashboard/billing"));
}

#[tokio::test]
async fn test_payment_history() {
    let app = spawn_app().await;

    let (status, body) = app.get("/api/stripe/payment-history", Some("alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
    assert!(app.billing.calls().is_empty());

    subscribe(&app, "alice", SubscriptionTier::Pro).await;
    let (_, body) = app.get("/api/stripe/payment-history", Some("alice")).await;
    let payments = body["data"].as_array().unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0]["id"], "in_cus_alice");
    assert_eq!(payments[0]["amount"], 1900);
    assert_eq!(payments[0]["currency"], "usd");
}

#[tokio::test]
async fn test_subscription_defaults_to_implicit_free() {
    let app = spawn_app().await;

    let (status, body) = app.get("/api/subscription", Some("alice")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["subscription_tier"], "FREE");
    assert_eq!(body["data"]["is_active"], true);
    assert!(body["data"]["stripe_customer_id"].is_null());
}

// ============================================================================
// Webhooks
// ============================================================================

#[tokio::test]
async fn test_webhook_rejects_bad_signatures() {
    let app = spawn_app().await;
    let payload = json!({ "id": "evt_1", "type": "invoice.paid", "data": { "object": {} } });

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/stripe/webhook")
                .header(
                    "Stripe-Signature",
                    format!("t={},v1=deadbeef", chrono::Utc::now().timestamp()),
                )
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/stripe/webhook")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("Stripe-Signature"));
}

#[tokio::test]
async fn test_webhook_rejects_stale_timestamp() {
    let app = spawn_app().await;
    let payload = json!({ "id": "evt_1", "type": "invoice.paid", "data": { "object": {} } })
        .to_string();
    let stale = chrono::Utc::now().timestamp() - 3_600;
    let signature = repurposely::clients::stripe::compute_signature(
        payload.as_bytes(),
        common::WEBHOOK_SECRET,
        stale,
    );

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/stripe/webhook")
                .header("Stripe-Signature", format!("t={stale},v1={signature}"))
                .body(Body::from(payload))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_checkout_completed_activates_plan() {
    let app = spawn_app().await;
    app.set_balance("alice", 3).await;

    let (status, body) = app
        .webhook(&json!({
            "id": "evt_checkout",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_test_1",
                "customer": "cus_alice",
                "subscription": "sub_alice",
                "metadata": { "user_id": "alice" }
            }}
        }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
    assert_eq!(body["handled"], true);
    assert_eq!(body["event_type"], "checkout.session.completed");

    let stored = app.store().get_subscription("alice").await.unwrap().unwrap();
    assert_eq!(stored.subscription_tier, SubscriptionTier::Pro);
    assert!(stored.is_active);
    assert_eq!(stored.stripe_customer_id.as_deref(), Some("cus_alice"));
    assert_eq!(stored.stripe_subscription_id.as_deref(), Some("sub_alice"));
    assert_eq!(
        stored.subscription_end_date.map(|d| d.timestamp()),
        Some(common::PERIOD_END)
    );

    assert_eq!(app.remaining("alice").await, 1_000);
    assert_eq!(app.count("alice", TransactionType::SubscriptionGrant).await, 1);
}

#[tokio::test]
async fn test_checkout_completed_for_unknown_user_is_acknowledged() {
    let app = spawn_app().await;

    let (status, body) = app
        .webhook(&json!({
            "id": "evt_orphan",
            "type": "checkout.session.completed",
            "data": { "object": { "customer": "cus_nobody" } }
        }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["handled"], false);
}

#[tokio::test]
async fn test_subscription_updated_to_new_tier_grants_allowance() {
    let app = spawn_app().await;
    subscribe(&app, "alice", SubscriptionTier::Pro).await;
    app.set_balance("alice", 10).await;

    let (status, body) = app
        .webhook(&json!({
            "id": "evt_upgrade",
            "type": "customer.subscription.updated",
            "data": { "object": {
                "id": "sub_alice",
                "customer": "cus_alice",
                "status": "active",
                "current_period_end": common::PERIOD_END,
                "items": { "data": [ { "price": { "id": ENTERPRISE_PRICE } } ] }
            }}
        }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["handled"], true);

    let stored = app.store().get_subscription("alice").await.unwrap().unwrap();
    assert_eq!(stored.subscription_tier, SubscriptionTier::Enterprise);
    assert_eq!(app.remaining("alice").await, 5_000);
}

#[tokio::test]
async fn test_subscription_updated_same_tier_keeps_balance() {
    let app = spawn_app().await;
    subscribe(&app, "alice", SubscriptionTier::Pro).await;
    app.set_balance("alice", 10).await;

    let (_, body) = app
        .webhook(&json!({
            "id": "evt_same",
            "type": "customer.subscription.updated",
            "data": { "object": {
                "id": "sub_alice",
                "customer": "cus_alice",
                "status": "active",
                "cancel_at_period_end": true,
                "items": { "data": [ { "price": { "id": PRO_PRICE } } ] }
            }}
        }))
        .await;

    assert_eq!(body["handled"], true);
    assert_eq!(app.remaining("alice").await, 10);
    let stored = app.store().get_subscription("alice").await.unwrap().unwrap();
    assert!(stored.cancel_at_period_end);
}

#[tokio::test]
async fn test_subscription_deleted_moves_user_to_free() {
    let app = spawn_app().await;
    subscribe(&app, "alice", SubscriptionTier::Pro).await;

    let (status, body) = app
        .webhook(&json!({
            "id": "evt_deleted",
            "type": "customer.subscription.deleted",
            "data": { "object": {
                "id": "sub_alice",
                "customer": "cus_alice",
                "status": "canceled",
                "ended_at": 1_800_000_000
            }}
        }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["handled"], true);

    let stored = app.store().get_subscription("alice").await.unwrap().unwrap();
    assert_eq!(stored.subscription_tier, SubscriptionTier::Free);
    assert!(!stored.is_active);
    assert!(stored.stripe_subscription_id.is_none());
    assert_eq!(stored.stripe_customer_id.as_deref(), Some("cus_alice"));
    assert_eq!(
        stored.subscription_end_date.map(|d| d.timestamp()),
        Some(1_800_000_000)
    );
}

#[tokio::test]
async fn test_events_for_a_replaced_subscription_are_ignored() {
    let app = spawn_app().await;
    subscribe(&app, "alice", SubscriptionTier::Enterprise).await;
    app.set_balance("alice", 4_200).await;

    let (status, body) = app
        .webhook(&json!({
            "id": "evt_old_deleted",
            "type": "customer.subscription.deleted",
            "data": { "object": {
                "id": "sub_old",
                "customer": "cus_alice",
                "status": "canceled",
                "ended_at": 1_800_000_000
            }}
        }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["handled"], false);

    let (status, body) = app
        .webhook(&json!({
            "id": "evt_old_updated",
            "type": "customer.subscription.updated",
            "data": { "object": {
                "id": "sub_old",
                "customer": "cus_alice",
                "status": "past_due",
                "items": { "data": [ { "price": { "id": PRO_PRICE } } ] }
            }}
        }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["handled"], false);

    let stored = app.store().get_subscription("alice").await.unwrap().unwrap();
    assert_eq!(stored.subscription_tier, SubscriptionTier::Enterprise);
    assert!(stored.is_active);
    assert_eq!(stored.stripe_subscription_id.as_deref(), Some("sub_alice"));
    assert_eq!(app.remaining("alice").await, 4_200);
}

#[tokio::test]
async fn test_renewal_invoice_refills_allowance() {
    let app = spawn_app().await;
    subscribe(&app, "alice", SubscriptionTier::Pro).await;
    app.set_balance("alice", 7).await;

    let (_, body) = app
        .webhook(&json!({
            "id": "evt_renewal",
            "type": "invoice.payment_succeeded",
            "data": { "object": {
                "customer": "cus_alice",
                "subscription": "sub_alice",
                "billing_reason": "subscription_cycle"
            }}
        }))
        .await;
    assert_eq!(body["handled"], true);
    assert_eq!(app.remaining("alice").await, 1_000);

    let (_, body) = app
        .webhook(&json!({
            "id": "evt_first_invoice",
            "type": "invoice.payment_succeeded",
            "data": { "object": {
                "customer": "cus_alice",
                "billing_reason": "subscription_create"
            }}
        }))
        .await;
    assert_eq!(body["handled"], false);
}

#[tokio::test]
async fn test_unknown_event_is_acknowledged_but_not_handled() {
    let app = spawn_app().await;

    let (status, body) = app
        .webhook(&json!({
            "id": "evt_other",
            "type": "customer.created",
            "data": { "object": { "id": "cus_1" } }
        }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
    assert_eq!(body["handled"], false);
}

#[tokio::test]
async fn test_malformed_event_payload_is_400() {
    let app = spawn_app().await;

    let (status, _) = app
        .webhook(&json!({ "id": "evt_bad", "type": "checkout.session.completed" }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Repair
// ============================================================================

#[tokio::test]
async fn test_fix_subscription_requires_admin_even_for_self() {
    let app = spawn_app().await;

    let (status, body) = app
        .get("/api/fix-subscription?tier=enterprise", Some("mallory"))
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
    assert!(app.store().get_subscription("mallory").await.unwrap().is_none());
    assert_eq!(app.count("mallory", TransactionType::AdminAdjustment).await, 0);

    let (status, _) = app.get("/api/tokens", Some("mallory")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.remaining("mallory").await, 50);
}

#[tokio::test]
async fn test_fix_subscription_for_admin_defaults_to_pro() {
    let app = spawn_app().await;

    let (status, body) = app.get("/api/fix-subscription", Some(ADMIN_ID)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["subscription"]["user_id"], ADMIN_ID);
    assert_eq!(body["data"]["subscription"]["subscription_tier"], "PRO");
    assert_eq!(body["data"]["tokens"]["tokens_remaining"], 1_000);
    assert_eq!(body["data"]["created"], true);
    assert_eq!(app.count(ADMIN_ID, TransactionType::AdminAdjustment).await, 1);
}

#[tokio::test]
async fn test_fix_subscription_for_others() {
    let app = spawn_app().await;

    let (status, _) = app
        .get("/api/fix-subscription?userId=bob&tier=enterprise", Some("alice"))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(app.store().get_subscription("bob").await.unwrap().is_none());

    let (status, body) = app
        .get("/api/fix-subscription?userId=bob&tier=enterprise", Some(ADMIN_ID))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["subscription"]["user_id"], "bob");
    assert_eq!(body["data"]["subscription"]["subscription_tier"], "ENTERPRISE");
    assert_eq!(app.remaining("bob").await, 5_000);

    let (status, _) = app
        .get("/api/fix-subscription?tier=platinum", Some(ADMIN_ID))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
