use axum::{Json, extract::State};
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::CurrentUser;
use super::{ApiError, ApiResponse, AppState};
use crate::services::{AccountDeletion, Profile};

/// GET /user/profile
pub async fn profile(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<Profile>>, ApiError> {
    let profile = state
        .shared
        .accounts
        .profile(&user.id, user.email.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(profile)))
}

/// POST /user/delete
/// Removes every trace of the caller and ends the session
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    session: Session,
) -> Result<Json<ApiResponse<AccountDeletion>>, ApiError> {
    let deletion = state.shared.accounts.delete_account(&user.id).await?;
    let _ = session.flush().await;
    Ok(Json(ApiResponse::success(deletion)))
}
