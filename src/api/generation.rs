use axum::{
    Json,
    extract::{Multipart, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::CurrentUser;
use super::validation::{ensure_same_user, parse_field, parse_optional};
use super::{ApiError, ApiResponse, AppState};
use crate::clients::AudioUpload;
use crate::domain::{ContentLength, ImageSize, ImageStyle, OutputFormat, Tone};
use crate::services::{
    ImageGenerationRequest, ImageOutcome, RepurposeOutcome, RepurposeRequest, YoutubeTranscript,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepurposeBody {
    #[serde(default)]
    pub original_content: String,
    #[serde(default)]
    pub output_format: String,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub length: Option<String>,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageBody {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub content_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct YoutubeBody {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct TranscriptionResponse {
    pub text: String,
}

/// POST /repurpose
pub async fn repurpose(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(body): Json<RepurposeBody>,
) -> Result<Json<ApiResponse<RepurposeOutcome>>, ApiError> {
    ensure_same_user(body.user_id.as_deref(), &user.id)?;

    if body.output_format.trim().is_empty() {
        return Err(ApiError::validation("outputFormat is required"));
    }
    let output_format: OutputFormat = parse_field("outputFormat", body.output_format.trim())?;
    let tone: Tone = parse_optional("tone", body.tone.as_deref())?
        .ok_or_else(|| ApiError::validation("tone is required"))?;
    let length: ContentLength =
        parse_optional("length", body.length.as_deref())?.unwrap_or_default();

    let request = RepurposeRequest {
        original_content: body.original_content,
        output_format,
        tone,
        length,
        target_audience: body
            .target_audience
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty()),
    };

    let outcome = state.shared.generation.repurpose(&user.id, request).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// POST /generate-image
pub async fn generate_image(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(body): Json<GenerateImageBody>,
) -> Result<Json<ApiResponse<ImageOutcome>>, ApiError> {
    ensure_same_user(body.user_id.as_deref(), &user.id)?;

    let size: ImageSize = parse_optional("size", body.size.as_deref())?.unwrap_or_default();
    let style: ImageStyle = parse_optional("style", body.style.as_deref())?.unwrap_or_default();

    let request = ImageGenerationRequest {
        prompt: body.prompt,
        size,
        style,
        content_id: body
            .content_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty()),
    };

    let outcome = state
        .shared
        .generation
        .generate_image(&user.id, request)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// POST /transcribe
/// Multipart upload with the audio or video in the `file` field
pub async fn transcribe(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<TranscriptionResponse>>, ApiError> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("audio").to_string();
        let content_type = field.content_type().map(ToString::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation(format!("Failed to read upload: {e}")))?;

        upload = Some(AudioUpload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
        break;
    }

    let audio = upload.ok_or_else(|| ApiError::validation("No file provided"))?;
    let text = state.shared.generation.transcribe(&user.id, audio).await?;

    Ok(Json(ApiResponse::success(TranscriptionResponse { text })))
}

/// POST /youtube-transcript
pub async fn youtube_transcript(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(body): Json<YoutubeBody>,
) -> Result<Json<ApiResponse<YoutubeTranscript>>, ApiError> {
    if body.url.trim().is_empty() {
        return Err(ApiError::validation("url is required"));
    }

    let transcript = state
        .shared
        .generation
        .youtube_transcript(&user.id, body.url.trim())
        .await?;
    Ok(Json(ApiResponse::success(transcript)))
}
