use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::validation::parse_optional;
use super::{ApiError, ApiResponse, AppState};
use crate::domain::{SubscriptionTier, UserId};
use crate::services::AccountState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixSubscriptionQuery {
    pub user_id: Option<String>,
    pub tier: Option<String>,
}

/// GET /fix-subscription?userId=&tier=
/// Forces a user onto a tier without going through billing. Admin only,
/// including for the caller's own account. Defaults to the caller and PRO.
pub async fn fix_subscription(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(query): Query<FixSubscriptionQuery>,
) -> Result<Json<ApiResponse<AccountState>>, ApiError> {
    let target = query
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map_or_else(|| user.id.clone(), UserId::from);

    if !state.shared.config.is_admin(user.id.as_str()) {
        return Err(ApiError::forbidden(
            "Only administrators can fix subscriptions",
        ));
    }

    let tier: SubscriptionTier =
        parse_optional("tier", query.tier.as_deref())?.unwrap_or(SubscriptionTier::Pro);

    let account = state.shared.subscriptions.repair(&target, tier).await?;
    tracing::info!(
        caller = %user.id,
        target = %target,
        tier = %tier,
        "Subscription repaired"
    );

    Ok(Json(ApiResponse::success(account)))
}
