use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::CurrentUser;
use super::validation::validate_limit;
use super::{ApiError, ApiResponse, AppState};
use crate::db::{TokenTransaction, UserSubscription};
use crate::domain::{SubscriptionTier, UserId};
use crate::services::AccountState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokensResponse {
    pub tokens_used: i32,
    pub tokens_remaining: i32,
    pub reset_date: DateTime<Utc>,
    pub tier: SubscriptionTier,
    pub monthly_allowance: i32,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u64>,
}

/// Everything support needs to explain a balance.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDebugResponse {
    pub user_id: UserId,
    pub subscription: UserSubscription,
    pub effective_tier: SubscriptionTier,
    pub can_generate_images: bool,
    pub tokens: TokensResponse,
    pub image_cost: i32,
    pub repurpose_cost: i32,
    pub recent_transactions: Vec<TokenTransaction>,
    /// Set by the POST variant: whether initialization created rows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initialized: Option<bool>,
}

async fn tokens_for(state: &AppState, user: &UserId) -> Result<TokensResponse, ApiError> {
    let (subscription, balance) = tokio::join!(
        state.shared.subscriptions.get(user),
        state.shared.ledger.balance(user)
    );
    let tier = subscription?.effective_tier();
    let balance = balance?;

    Ok(TokensResponse {
        tokens_used: balance.tokens_used,
        tokens_remaining: balance.tokens_remaining,
        reset_date: balance.reset_date,
        tier,
        monthly_allowance: state.shared.config.tokens.allowance_for(tier),
    })
}

/// GET /tokens
pub async fn get_tokens(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<TokensResponse>>, ApiError> {
    let tokens = tokens_for(&state, &user.id).await?;
    Ok(Json(ApiResponse::success(tokens)))
}

/// GET /tokens/history
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<TokenTransaction>>>, ApiError> {
    let limit = validate_limit(query.limit)?;
    let history = state.shared.ledger.history(&user.id, limit).await?;
    Ok(Json(ApiResponse::success(history)))
}

/// POST /init-tokens
/// Idempotent: existing rows are returned unchanged
pub async fn init_tokens(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<AccountState>>, ApiError> {
    let account = state.shared.subscriptions.initialize(&user.id).await?;
    Ok(Json(ApiResponse::success(account)))
}

async fn debug_snapshot(
    state: &AppState,
    user: &UserId,
    initialized: Option<bool>,
) -> Result<TokenDebugResponse, ApiError> {
    let subscription = state.shared.subscriptions.get(user).await?;
    let tokens = tokens_for(state, user).await?;
    let recent_transactions = state.shared.ledger.history(user, 10).await?;
    let effective_tier = subscription.effective_tier();

    Ok(TokenDebugResponse {
        user_id: user.clone(),
        effective_tier,
        can_generate_images: effective_tier.can_generate_images(),
        subscription,
        tokens,
        image_cost: state.shared.config.tokens.image_cost,
        repurpose_cost: state.shared.config.tokens.repurpose_cost,
        recent_transactions,
        initialized,
    })
}

/// GET /token-debug
pub async fn token_debug(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<TokenDebugResponse>>, ApiError> {
    let snapshot = debug_snapshot(&state, &user.id, None).await?;
    Ok(Json(ApiResponse::success(snapshot)))
}

/// POST /token-debug
/// Initializes missing rows and applies a due reset before reporting
pub async fn token_debug_repair(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<TokenDebugResponse>>, ApiError> {
    let account = state.shared.subscriptions.initialize(&user.id).await?;
    let reset = state.shared.ledger.reset_if_due(&user.id).await?;
    tracing::info!(user_id = %user.id, created = account.created, reset, "Token debug repair");

    let snapshot = debug_snapshot(&state, &user.id, Some(account.created)).await?;
    Ok(Json(ApiResponse::success(snapshot)))
}
