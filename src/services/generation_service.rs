//! Paid generation pipelines: text repurposing and image generation, plus
//! the transcript helpers that feed them.

use crate::clients::AudioUpload;
use crate::domain::{ContentLength, ImageSize, ImageStyle, OutputFormat, SubscriptionTier, Tone, UserId};
use crate::services::token_ledger::LedgerError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{0}")]
    Validation(String),

    #[error("Image generation requires a PRO or ENTERPRISE plan (current plan: {0})")]
    PlanRequired(SubscriptionTier),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("{0}")]
    NotFound(String),

    #[error("Generation failed: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for GenerationError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

#[derive(Debug, Clone)]
pub struct RepurposeRequest {
    pub original_content: String,
    pub output_format: OutputFormat,
    pub tone: Tone,
    pub length: ContentLength,
    pub target_audience: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepurposeOutcome {
    pub repurposed_content: String,
    pub content_id: String,
    pub tokens_remaining: i32,
}

#[derive(Debug, Clone)]
pub struct ImageGenerationRequest {
    pub prompt: String,
    pub size: ImageSize,
    pub style: ImageStyle,
    pub content_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageOutcome {
    pub url: String,
    pub prompt: String,
    pub revised_prompt: Option<String>,
    pub size: ImageSize,
    pub style: ImageStyle,
    #[serde(rename = "tokensRemaining")]
    pub tokens_remaining: i32,
    /// Set when the image was attached to a history item.
    #[serde(rename = "contentId", skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
}

#[async_trait::async_trait]
pub trait GenerationService: Send + Sync {
    /// Debits the repurpose cost, calls the text provider once, cleans the
    /// output and stores it in the user's history. The debit is refunded if
    /// the provider call fails.
    ///
    /// # Errors
    ///
    /// - [`GenerationError::Validation`] for empty or oversized content
    /// - [`GenerationError::Ledger`] when the balance is short
    /// - [`GenerationError::Upstream`] when the provider fails
    async fn repurpose(
        &self,
        user: &UserId,
        request: RepurposeRequest,
    ) -> Result<RepurposeOutcome, GenerationError>;

    /// Balance check, plan gate, debit, then the provider call; refunds on
    /// provider failure. Neither rejection changes any state.
    ///
    /// # Errors
    ///
    /// - [`GenerationError::Ledger`] when the balance cannot cover the cost
    /// - [`GenerationError::PlanRequired`] for FREE users who could pay
    async fn generate_image(
        &self,
        user: &UserId,
        request: ImageGenerationRequest,
    ) -> Result<ImageOutcome, GenerationError>;

    async fn transcribe(&self, user: &UserId, audio: AudioUpload)
    -> Result<String, GenerationError>;

    /// Caption text of a YouTube video.
    ///
    /// # Errors
    ///
    /// - [`GenerationError::Validation`] when the URL names no video
    /// - [`GenerationError::NotFound`] when the video has no captions
    async fn youtube_transcript(&self, user: &UserId, url: &str)
    -> Result<YoutubeTranscript, GenerationError>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YoutubeTranscript {
    pub video_id: String,
    pub transcript: String,
}
