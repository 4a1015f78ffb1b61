use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::CurrentUser;
use super::validation::{ensure_same_user, parse_field};
use super::{ApiError, ApiResponse, AppState};
use crate::db::UserSubscription;
use crate::domain::SubscriptionTier;
use crate::services::{CheckoutOutcome, PaymentRecord, WebhookOutcome};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    #[serde(default)]
    pub tier: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Cancellation keeps the flat `{ success, cancelDate }` shape web clients
/// already parse.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub success: bool,
    pub cancel_date: Option<DateTime<Utc>>,
    pub subscription_id: String,
}

#[derive(Debug, Serialize)]
pub struct PortalResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    #[serde(flatten)]
    pub outcome: WebhookOutcome,
}

/// POST /stripe/create-checkout
pub async fn create_checkout(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<ApiResponse<CheckoutOutcome>>, ApiError> {
    ensure_same_user(body.user_id.as_deref(), &user.id)?;
    if body.tier.trim().is_empty() {
        return Err(ApiError::validation("tier is required"));
    }
    let tier: SubscriptionTier = parse_field("tier", body.tier.trim())?;

    let outcome = state
        .shared
        .subscriptions
        .create_checkout(&user.id, user.email.as_deref(), tier)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// POST /stripe/cancel-subscription
pub async fn cancel_subscription(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<CancelResponse>, ApiError> {
    let outcome = state.shared.subscriptions.cancel(&user.id).await?;
    Ok(Json(CancelResponse {
        success: true,
        cancel_date: outcome.cancel_date,
        subscription_id: outcome.subscription_id,
    }))
}

/// POST /stripe/create-portal
pub async fn create_portal(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<PortalResponse>>, ApiError> {
    let url = state
        .shared
        .subscriptions
        .create_portal_session(&user.id)
        .await?;
    Ok(Json(ApiResponse::success(PortalResponse { url })))
}

/// GET /stripe/payment-history
pub async fn payment_history(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<Vec<PaymentRecord>>>, ApiError> {
    let payments = state.shared.subscriptions.payment_history(&user.id).await?;
    Ok(Json(ApiResponse::success(payments)))
}

/// GET /subscription
pub async fn get_subscription(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<UserSubscription>>, ApiError> {
    let subscription = state.shared.subscriptions.get(&user.id).await?;
    Ok(Json(ApiResponse::success(subscription)))
}

/// POST /stripe/webhook
/// Public; authenticated by the `Stripe-Signature` header over the raw body
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::validation("Missing Stripe-Signature header"))?;

    let outcome = state
        .shared
        .subscriptions
        .handle_webhook(&body, signature)
        .await?;

    Ok(Json(WebhookAck {
        received: true,
        outcome,
    }))
}
