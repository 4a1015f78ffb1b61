#![allow(dead_code)]

use anyhow::{Result, bail};
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Utc;
use http_body_util::BodyExt;
use repurposely::clients::stripe::{
    CheckoutRequest, CheckoutSession, Invoice, Price, StripeSubscription, SubscriptionItem,
    SubscriptionItems, compute_signature,
};
use repurposely::clients::{
    AudioUpload, AuthProvider, AuthenticatedUser, BillingProvider, GeneratedImage,
    ImageGenerator, ImageRequest, TextGenerator, TextRequest, Transcriber, TranscriptFetcher,
};
use repurposely::config::Config;
use repurposely::db::{Store, SubscriptionChange};
use repurposely::domain::{SubscriptionTier, TransactionType, UserId, next_reset_date};
use repurposely::services::GenerationProviders;
use repurposely::state::{Providers, SharedState};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const PRO_PRICE: &str = "price_pro_monthly";
pub const ENTERPRISE_PRICE: &str = "price_enterprise_monthly";
pub const PERIOD_END: i64 = 1_900_000_000;
pub const ADMIN_ID: &str = "admin-1";

// ============================================================================
// Fake providers
// ============================================================================

/// Accepts `token-<user id>` and rejects everything else.
#[derive(Default)]
pub struct FakeAuth {
    pub deleted: Mutex<Vec<String>>,
}

#[async_trait]
impl AuthProvider for FakeAuth {
    async fn verify_token(&self, token: &str) -> Result<Option<AuthenticatedUser>> {
        Ok(token
            .strip_prefix("token-")
            .filter(|id| !id.is_empty())
            .map(|id| AuthenticatedUser {
                id: UserId::new(id),
                email: Some(format!("{id}@example.com")),
            }))
    }

    async fn delete_user(&self, user_id: &UserId) -> Result<()> {
        self.deleted.lock().unwrap().push(user_id.to_string());
        Ok(())
    }
}

/// Records every call by name so tests can assert that none happened.
#[derive(Default)]
pub struct FakeBilling {
    pub calls: Mutex<Vec<String>>,
    pub last_checkout: Mutex<Option<CheckoutRequest>>,
}

impl FakeBilling {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

pub fn stripe_subscription(id: &str, customer: &str, price: &str, status: &str) -> StripeSubscription {
    StripeSubscription {
        id: id.to_string(),
        customer: customer.to_string(),
        status: status.to_string(),
        current_period_end: Some(PERIOD_END),
        items: SubscriptionItems {
            data: vec![SubscriptionItem {
                price: Price {
                    id: price.to_string(),
                },
                current_period_end: None,
            }],
        },
        ..Default::default()
    }
}

#[async_trait]
impl BillingProvider for FakeBilling {
    async fn create_customer(&self, user_id: &str, _email: Option<&str>) -> Result<String> {
        self.record("create_customer");
        Ok(format!("cus_{user_id}"))
    }

    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        self.record("create_checkout_session");
        *self.last_checkout.lock().unwrap() = Some(request.clone());
        Ok(CheckoutSession {
            id: "cs_test_1".to_string(),
            url: Some("https://checkout.stripe.test/cs_test_1".to_string()),
        })
    }

    async fn schedule_cancellation(&self, subscription_id: &str) -> Result<StripeSubscription> {
        self.record("schedule_cancellation");
        let mut subscription = stripe_subscription(subscription_id, "cus_x", PRO_PRICE, "active");
        subscription.cancel_at_period_end = true;
        Ok(subscription)
    }

    async fn cancel_immediately(&self, _subscription_id: &str) -> Result<()> {
        self.record("cancel_immediately");
        Ok(())
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<StripeSubscription> {
        self.record("retrieve_subscription");
        Ok(stripe_subscription(subscription_id, "cus_x", PRO_PRICE, "active"))
    }

    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String> {
        self.record("create_portal_session");
        Ok(format!(
            "https://billing.stripe.test/{customer_id}?return={return_url}"
        ))
    }

    async fn list_invoices(&self, customer_id: &str, _limit: u32) -> Result<Vec<Invoice>> {
        self.record("list_invoices");
        Ok(vec![Invoice {
            id: format!("in_{customer_id}"),
            number: Some("0001".to_string()),
            amount_paid: 1900,
            amount_due: 1900,
            currency: "usd".to_string(),
            status: Some("paid".to_string()),
            created: 1_700_000_000,
            hosted_invoice_url: Some("https://invoice.stripe.test/1".to_string()),
            invoice_pdf: None,
        }])
    }
}

pub struct FakeText {
    pub reply: Mutex<String>,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

impl Default for FakeText {
    fn default() -> Self {
        Self {
            reply: Mutex::new("Sure!\nHere's your tweet:\n\nRust 2024 is here.".to_string()),
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TextGenerator for FakeText {
    async fn generate(&self, _request: &TextRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            bail!("Anthropic API returned 529: overloaded");
        }
        Ok(self.reply.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct FakeImages {
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl ImageGenerator for FakeImages {
    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            bail!("OpenAI API returned 500");
        }
        Ok(GeneratedImage {
            url: "https://images.test/generated.png".to_string(),
            revised_prompt: Some(format!("A detailed rendering of {}", request.prompt)),
        })
    }
}

#[derive(Default)]
pub struct FakeTranscriber;

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio: AudioUpload) -> Result<String> {
        Ok(format!("transcript of {} ({} bytes)", audio.file_name, audio.bytes.len()))
    }
}

/// Only `dQw4w9WgXcQ` has captions.
#[derive(Default)]
pub struct FakeTranscripts;

#[async_trait]
impl TranscriptFetcher for FakeTranscripts {
    async fn fetch_transcript(&self, video_id: &str) -> Result<Option<String>> {
        Ok((video_id == "dQw4w9WgXcQ").then(|| "never gonna give you up".to_string()))
    }
}

// ============================================================================
// App harness
// ============================================================================

pub struct TestApp {
    pub router: Router,
    pub state: Arc<SharedState>,
    pub auth: Arc<FakeAuth>,
    pub billing: Arc<FakeBilling>,
    pub text: Arc<FakeText>,
    pub images: Arc<FakeImages>,
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.general.database_url = "sqlite::memory:".to_string();
    config.server.site_url = "https://app.test".to_string();
    config.server.admin_user_ids = vec![ADMIN_ID.to_string()];
    config.stripe.secret_key = "sk_test_123".to_string();
    config.stripe.webhook_secret = WEBHOOK_SECRET.to_string();
    config.stripe.pro_price_id = PRO_PRICE.to_string();
    config.stripe.enterprise_price_id = ENTERPRISE_PRICE.to_string();
    config.tokens.reset_job_enabled = false;
    config.observability.metrics_enabled = false;
    config
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

pub async fn spawn_app_with(config: Config) -> TestApp {
    // One connection keeps every query on the same in-memory database.
    let store = Store::with_pool_options(&config.general.database_url, 1, 1)
        .await
        .expect("Failed to open test database");

    let auth = Arc::new(FakeAuth::default());
    let billing = Arc::new(FakeBilling::default());
    let text = Arc::new(FakeText::default());
    let images = Arc::new(FakeImages::default());

    let providers = Providers {
        auth: auth.clone(),
        billing: billing.clone(),
        generation: GenerationProviders {
            text: text.clone(),
            images: images.clone(),
            transcriber: Arc::new(FakeTranscriber),
            transcripts: Arc::new(FakeTranscripts),
        },
    };

    let state = Arc::new(SharedState::with_providers(config, store, providers));
    let router = repurposely::api::router(repurposely::api::create_app_state(state.clone(), None));

    TestApp {
        router,
        state,
        auth,
        billing,
        text,
        images,
    }
}

pub fn bearer(user: &str) -> String {
    format!("Bearer token-{user}")
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap_or(Value::Null)
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, user: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().uri(uri);
        if let Some(user) = user {
            builder = builder.header("Authorization", bearer(user));
        }
        let response = self.send(builder.body(Body::empty()).unwrap()).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    pub async fn post(&self, uri: &str, user: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json");
        if let Some(user) = user {
            builder = builder.header("Authorization", bearer(user));
        }
        let response = self
            .send(builder.body(Body::from(body.to_string())).unwrap())
            .await;
        let status = response.status();
        (status, body_json(response).await)
    }

    /// Delivers a correctly signed webhook event.
    pub async fn webhook(&self, event: &Value) -> (StatusCode, Value) {
        let payload = event.to_string();
        let timestamp = Utc::now().timestamp();
        let signature = compute_signature(payload.as_bytes(), WEBHOOK_SECRET, timestamp);

        let response = self
            .send(
                Request::builder()
                    .method("POST")
                    .uri("/api/stripe/webhook")
                    .header("Content-Type", "application/json")
                    .header("Stripe-Signature", format!("t={timestamp},v1={signature}"))
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await;
        let status = response.status();
        (status, body_json(response).await)
    }

    pub fn store(&self) -> &Store {
        &self.state.store
    }

    pub async fn set_subscription(&self, user: &str, change: SubscriptionChange) {
        self.store()
            .upsert_subscription(user, change)
            .await
            .expect("Failed to write subscription");
    }

    pub async fn set_tier(&self, user: &str, tier: SubscriptionTier) {
        self.set_subscription(
            user,
            SubscriptionChange {
                tier: Some(tier),
                is_active: Some(true),
                ..Default::default()
            },
        )
        .await;
    }

    /// Creates the balance row if needed, then forces `remaining`.
    pub async fn set_balance(&self, user: &str, remaining: i32) {
        self.state
            .ledger
            .initialize(&UserId::new(user))
            .await
            .expect("Failed to initialize balance");
        self.store()
            .set_token_balance(user, remaining, next_reset_date(Utc::now()), None)
            .await
            .expect("Failed to set balance");
    }

    pub async fn remaining(&self, user: &str) -> i32 {
        self.store()
            .get_token_balance(user)
            .await
            .unwrap()
            .map_or(-1, |b| b.tokens_remaining)
    }

    pub async fn count(&self, user: &str, kind: TransactionType) -> u64 {
        let rows = self.store().token_history(user, 1_000).await.unwrap();
        rows.iter()
            .filter(|t| t.transaction_type == kind.as_str())
            .count() as u64
    }
}
