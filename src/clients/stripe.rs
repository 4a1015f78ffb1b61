//! Billing provider access: the REST calls the subscription service needs
//! and verification of signed webhook deliveries.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::config::StripeConfig;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub customer_id: String,
    pub price_id: String,
    pub user_id: String,
    pub tier: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Price {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionItem {
    #[serde(default)]
    pub price: Price,
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

/// Subset of a billing-provider subscription object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    #[serde(default)]
    pub customer: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub current_period_start: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub ended_at: Option<i64>,
    #[serde(default)]
    pub items: SubscriptionItems,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripeSubscription {
    #[must_use]
    pub fn price_id(&self) -> Option<&str> {
        self.items.data.first().map(|item| item.price.id.as_str())
    }

    /// Period end, read from the top level or, on newer API versions, from
    /// the first item.
    #[must_use]
    pub fn period_end(&self) -> Option<i64> {
        self.current_period_end
            .or_else(|| self.items.data.first().and_then(|i| i.current_period_end))
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.status.as_str(), "active" | "trialing")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Invoice {
    pub id: String,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub amount_paid: i64,
    #[serde(default)]
    pub amount_due: i64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub status: Option<String>,
    pub created: i64,
    #[serde(default)]
    pub hosted_invoice_url: Option<String>,
    #[serde(default)]
    pub invoice_pdf: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InvoiceList {
    data: Vec<Invoice>,
}

#[derive(Debug, Deserialize)]
struct Customer {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PortalSession {
    url: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

/// Billing calls used by the subscription service.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    async fn create_customer(&self, user_id: &str, email: Option<&str>) -> Result<String>;

    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession>;

    /// Sets `cancel_at_period_end=true`; the subscription stays active until
    /// the period ends.
    async fn schedule_cancellation(&self, subscription_id: &str) -> Result<StripeSubscription>;

    async fn cancel_immediately(&self, subscription_id: &str) -> Result<()>;

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<StripeSubscription>;

    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String>;

    async fn list_invoices(&self, customer_id: &str, limit: u32) -> Result<Vec<Invoice>>;
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    base_url: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Result<Self> {
        Self::with_base_url(config, crate::constants::STRIPE_API_BASE)
    }

    pub fn with_base_url(config: &StripeConfig, base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(concat!("Repurposely/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build billing HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        })
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T> {
        if self.secret_key.is_empty() {
            bail!("Billing provider is not configured");
        }

        let response = request
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .with_context(|| format!("Failed to reach billing provider ({what})"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or(body);
            bail!("Billing provider rejected {what}: status={status}, message={message}");
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse billing provider response ({what})"))
    }
}

#[async_trait]
impl BillingProvider for StripeClient {
    async fn create_customer(&self, user_id: &str, email: Option<&str>) -> Result<String> {
        let mut form = vec![("metadata[user_id]", user_id.to_string())];
        if let Some(email) = email {
            form.push(("email", email.to_string()));
        }

        let url = format!("{}/v1/customers", self.base_url);
        let customer: Customer = self
            .send(self.client.post(&url).form(&form), "customer creation")
            .await?;

        debug!(user_id, customer_id = %customer.id, "Created billing customer");
        Ok(customer.id)
    }

    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        let form = [
            ("mode", "subscription".to_string()),
            ("customer", request.customer_id.clone()),
            ("line_items[0][price]", request.price_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("client_reference_id", request.user_id.clone()),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("metadata[user_id]", request.user_id.clone()),
            ("metadata[tier]", request.tier.clone()),
            ("subscription_data[metadata][user_id]", request.user_id.clone()),
            ("subscription_data[metadata][tier]", request.tier.clone()),
        ];

        let url = format!("{}/v1/checkout/sessions", self.base_url);
        self.send(self.client.post(&url).form(&form), "checkout session")
            .await
    }

    async fn schedule_cancellation(&self, subscription_id: &str) -> Result<StripeSubscription> {
        let url = format!("{}/v1/subscriptions/{subscription_id}", self.base_url);
        self.send(
            self.client
                .post(&url)
                .form(&[("cancel_at_period_end", "true")]),
            "subscription cancellation",
        )
        .await
    }

    async fn cancel_immediately(&self, subscription_id: &str) -> Result<()> {
        let url = format!("{}/v1/subscriptions/{subscription_id}", self.base_url);
        let _: StripeSubscription = self
            .send(self.client.delete(&url), "subscription deletion")
            .await?;
        Ok(())
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<StripeSubscription> {
        let url = format!("{}/v1/subscriptions/{subscription_id}", self.base_url);
        self.send(self.client.get(&url), "subscription lookup").await
    }

    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String> {
        let url = format!("{}/v1/billing_portal/sessions", self.base_url);
        let session: PortalSession = self
            .send(
                self.client
                    .post(&url)
                    .form(&[("customer", customer_id), ("return_url", return_url)]),
                "portal session",
            )
            .await?;
        Ok(session.url)
    }

    async fn list_invoices(&self, customer_id: &str, limit: u32) -> Result<Vec<Invoice>> {
        let mut url = url::Url::parse(&format!("{}/v1/invoices", self.base_url))
            .context("Invalid billing provider URL")?;
        url.query_pairs_mut()
            .append_pair("customer", customer_id)
            .append_pair("limit", &limit.to_string());

        let list: InvoiceList = self.send(self.client.get(url), "invoice list").await?;
        Ok(list.data)
    }
}

// ============================================================================
// Webhooks
// ============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WebhookSignatureError {
    #[error("Missing or malformed signature header")]
    MalformedHeader,

    #[error("Webhook timestamp outside the tolerance window")]
    TimestampOutOfTolerance,

    #[error("No matching signature found")]
    NoMatchingSignature,
}

/// A webhook delivery. `data.object` stays untyped since its shape depends
/// on `event_type`.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`, the `v1` scheme.
#[must_use]
pub fn compute_signature(payload: &[u8], secret: &str, timestamp: i64) -> String {
    // HMAC accepts keys of any length, so this never fails.
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Checks a `Stripe-Signature` header (`t=...,v1=...[,v1=...]`).
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_seconds: i64,
    now: i64,
) -> std::result::Result<(), WebhookSignatureError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(WebhookSignatureError::MalformedHeader)?;
    if candidates.is_empty() {
        return Err(WebhookSignatureError::MalformedHeader);
    }
    if now.abs_diff(timestamp) > tolerance_seconds.unsigned_abs() {
        return Err(WebhookSignatureError::TimestampOutOfTolerance);
    }

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return Err(WebhookSignatureError::NoMatchingSignature);
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = candidates.into_iter().any(|candidate| {
        hex::decode(candidate)
            .is_ok_and(|bytes| mac.clone().verify_slice(&bytes).is_ok())
    });

    if matched {
        Ok(())
    } else {
        Err(WebhookSignatureError::NoMatchingSignature)
    }
}
