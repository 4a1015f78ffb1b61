use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::validation::{parse_field, parse_optional, validate_content_id, validate_limit};
use super::{ApiError, ApiResponse, AppState, IdRequest, MessageResponse};
use crate::db::{ContentItem, ContentPatch, ContentQuery};
use crate::domain::ContentStatus;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBody {
    #[serde(default)]
    pub id: String,
    pub repurposed_content: Option<String>,
    pub tone: Option<String>,
    pub output_format: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
}

/// GET /content
pub async fn list_content(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<ContentItem>>>, ApiError> {
    let query = ContentQuery {
        status: parse_optional("status", query.status.as_deref())?,
        limit: validate_limit(query.limit)?,
        offset: query.offset.unwrap_or(0),
    };

    let items = state.shared.content.list(&user.id, query).await?;
    Ok(Json(ApiResponse::success(items)))
}

/// GET /content/{id}
pub async fn get_content(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ContentItem>>, ApiError> {
    let id = validate_content_id(&id)?;
    let item = state.shared.content.get(&user.id, id).await?;
    Ok(Json(ApiResponse::success(item)))
}

/// POST /content/update
pub async fn update_content(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(body): Json<UpdateBody>,
) -> Result<Json<ApiResponse<ContentItem>>, ApiError> {
    let id = validate_content_id(&body.id)?;
    let patch = ContentPatch {
        repurposed_content: body.repurposed_content,
        tone: parse_optional("tone", body.tone.as_deref())?,
        output_format: parse_optional("outputFormat", body.output_format.as_deref())?,
        status: None,
    };

    let item = state.shared.content.update(&user.id, id, patch).await?;
    Ok(Json(ApiResponse::success(item)))
}

/// POST /content/update-status
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(body): Json<UpdateStatusBody>,
) -> Result<Json<ApiResponse<ContentItem>>, ApiError> {
    let id = validate_content_id(&body.id)?;
    if body.status.trim().is_empty() {
        return Err(ApiError::validation("status is required"));
    }
    let status: ContentStatus = parse_field("status", body.status.trim())?;

    let item = state
        .shared
        .content
        .update_status(&user.id, id, status)
        .await?;
    Ok(Json(ApiResponse::success(item)))
}

/// POST /content/delete
pub async fn delete_content(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(body): Json<IdRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let id = validate_content_id(&body.id)?;
    state.shared.content.delete(&user.id, id).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Content deleted",
    ))))
}
