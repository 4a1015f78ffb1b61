use crate::clients::youtube::extract_video_id;
use crate::clients::{
    AudioUpload, ImageGenerator, ImageRequest, TextGenerator, TextRequest, TranscriptFetcher,
    Transcriber,
};
use crate::config::{GenerationConfig, TokenConfig};
use crate::constants::limits::MAX_PROMPT_CHARS;
use crate::db::{NewContent, Store};
use crate::domain::{ContentStatus, TransactionType, UserId};
use crate::services::generation_service::{
    GenerationError, GenerationService, ImageGenerationRequest, ImageOutcome, RepurposeOutcome,
    RepurposeRequest, YoutubeTranscript,
};
use crate::services::prompt::{self, PromptInput};
use crate::services::token_ledger::TokenLedger;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Upstream collaborators of [`DefaultGenerationService`].
#[derive(Clone)]
pub struct GenerationProviders {
    pub text: Arc<dyn TextGenerator>,
    pub images: Arc<dyn ImageGenerator>,
    pub transcriber: Arc<dyn Transcriber>,
    pub transcripts: Arc<dyn TranscriptFetcher>,
}

pub struct DefaultGenerationService {
    store: Arc<Store>,
    ledger: Arc<dyn TokenLedger>,
    providers: GenerationProviders,
    generation: GenerationConfig,
    tokens: TokenConfig,
}

fn record_outcome(kind: &'static str, outcome: &'static str) {
    metrics::counter!("generation_requests_total", "kind" => kind, "outcome" => outcome)
        .increment(1);
}

impl DefaultGenerationService {
    #[must_use]
    pub const fn new(
        store: Arc<Store>,
        ledger: Arc<dyn TokenLedger>,
        providers: GenerationProviders,
        generation: GenerationConfig,
        tokens: TokenConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            providers,
            generation,
            tokens,
        }
    }

    /// Gives the credits back and turns `cause` into the error to report.
    async fn refund_after_failure(
        &self,
        user: &UserId,
        cost: i32,
        content_id: Option<&str>,
        cause: String,
    ) -> GenerationError {
        if let Err(e) = self.ledger.refund(user, cost, content_id).await {
            error!(user_id = %user, cost, error = %e, "Refund after failed generation did not apply");
        }
        GenerationError::Upstream(cause)
    }

    fn validate_content(&self, content: &str) -> Result<(), GenerationError> {
        if content.trim().is_empty() {
            return Err(GenerationError::Validation(
                "Original content is required".to_string(),
            ));
        }
        let chars = content.chars().count();
        if chars > self.generation.max_input_chars {
            return Err(GenerationError::Validation(format!(
                "Original content is too long ({chars} characters, maximum {})",
                self.generation.max_input_chars
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl GenerationService for DefaultGenerationService {
    async fn repurpose(
        &self,
        user: &UserId,
        request: RepurposeRequest,
    ) -> Result<RepurposeOutcome, GenerationError> {
        self.validate_content(&request.original_content)?;

        let cost = self.tokens.repurpose_cost;
        let content_id = uuid::Uuid::new_v4().to_string();
        self.ledger
            .debit(
                user,
                cost,
                TransactionType::ContentRepurpose,
                Some(&content_id),
            )
            .await?;

        let text_request = TextRequest {
            system: prompt::SYSTEM_PROMPT.to_string(),
            prompt: prompt::build_prompt(&PromptInput {
                original_content: &request.original_content,
                output_format: request.output_format,
                tone: request.tone,
                length: request.length,
                target_audience: request.target_audience.as_deref(),
            }),
            max_tokens: self.generation.max_output_tokens,
            temperature: self.generation.temperature,
        };

        let raw = match self.providers.text.generate(&text_request).await {
            Ok(raw) => raw,
            Err(e) => {
                record_outcome("repurpose", "upstream_error");
                warn!(user_id = %user, error = %e, "Text generation failed");
                return Err(self
                    .refund_after_failure(user, cost, Some(&content_id), format!("{e:#}"))
                    .await);
            }
        };

        let cleaned = prompt::clean_output(&raw);
        if cleaned.is_empty() {
            record_outcome("repurpose", "empty");
            return Err(self
                .refund_after_failure(
                    user,
                    cost,
                    Some(&content_id),
                    "Provider returned no content".into(),
                )
                .await);
        }

        let item = match self
            .store
            .insert_content(NewContent {
                id: Some(&content_id),
                user_id: user.as_str(),
                original_content: &request.original_content,
                repurposed_content: &cleaned,
                output_format: request.output_format,
                tone: request.tone,
                status: ContentStatus::Completed,
            })
            .await
        {
            Ok(item) => item,
            Err(e) => {
                record_outcome("repurpose", "storage_error");
                if let Err(refund) = self.ledger.refund(user, cost, Some(&content_id)).await {
                    error!(user_id = %user, error = %refund, "Refund after failed save did not apply");
                }
                return Err(GenerationError::Database(format!("{e:#}")));
            }
        };

        let balance = self.ledger.balance(user).await?;
        record_outcome("repurpose", "success");
        info!(
            user_id = %user,
            content_id = %item.id,
            format = %request.output_format,
            "Content repurposed"
        );

        Ok(RepurposeOutcome {
            repurposed_content: cleaned,
            content_id: item.id,
            tokens_remaining: balance.tokens_remaining,
        })
    }

    async fn generate_image(
        &self,
        user: &UserId,
        request: ImageGenerationRequest,
    ) -> Result<ImageOutcome, GenerationError> {
        let prompt = request.prompt.trim().to_string();
        if prompt.is_empty() {
            return Err(GenerationError::Validation("Prompt is required".to_string()));
        }
        if prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(GenerationError::Validation(format!(
                "Prompt is too long (maximum {MAX_PROMPT_CHARS} characters)"
            )));
        }

        let cost = self.tokens.image_cost;
        if let Err(e) = self.ledger.check(user, cost).await {
            record_outcome("image", "insufficient_tokens");
            return Err(e.into());
        }

        let tier = self.store.effective_tier(user.as_str()).await?;
        if !tier.can_generate_images() {
            record_outcome("image", "plan_required");
            return Err(GenerationError::PlanRequired(tier));
        }

        let content_id = request.content_id.as_deref().filter(|id| !id.is_empty());
        self.ledger
            .debit(user, cost, TransactionType::ImageGeneration, content_id)
            .await?;

        let image_request = ImageRequest {
            prompt: prompt.clone(),
            size: request.size,
            style: request.style,
        };
        let image = match self.providers.images.generate_image(&image_request).await {
            Ok(image) => image,
            Err(e) => {
                record_outcome("image", "upstream_error");
                warn!(user_id = %user, error = %e, "Image generation failed");
                return Err(self
                    .refund_after_failure(user, cost, content_id, format!("{e:#}"))
                    .await);
            }
        };

        let mut attached = None;
        if let Some(id) = content_id {
            match self.store.set_content_image(id, user.as_str(), &image.url).await {
                Ok(true) => attached = Some(id.to_string()),
                Ok(false) => warn!(user_id = %user, content_id = id, "Image not attached: content not found"),
                Err(e) => warn!(user_id = %user, content_id = id, error = %e, "Image not attached"),
            }
        }

        let balance = self.ledger.balance(user).await?;
        record_outcome("image", "success");
        info!(user_id = %user, size = request.size.as_str(), "Image generated");

        Ok(ImageOutcome {
            url: image.url,
            prompt,
            revised_prompt: image.revised_prompt,
            size: request.size,
            style: request.style,
            tokens_remaining: balance.tokens_remaining,
            content_id: attached,
        })
    }

    async fn transcribe(
        &self,
        user: &UserId,
        audio: AudioUpload,
    ) -> Result<String, GenerationError> {
        if audio.bytes.is_empty() {
            return Err(GenerationError::Validation("Uploaded file is empty".to_string()));
        }
        if audio.bytes.len() > self.generation.max_upload_bytes {
            return Err(GenerationError::Validation(format!(
                "Uploaded file exceeds the {} MB limit",
                self.generation.max_upload_bytes / (1024 * 1024)
            )));
        }

        let file_name = audio.file_name.clone();
        match self.providers.transcriber.transcribe(audio).await {
            Ok(text) => {
                record_outcome("transcription", "success");
                info!(user_id = %user, file_name = %file_name, chars = text.len(), "File transcribed");
                Ok(text)
            }
            Err(e) => {
                record_outcome("transcription", "upstream_error");
                warn!(user_id = %user, file_name = %file_name, error = %e, "Transcription failed");
                Err(GenerationError::Upstream(format!("{e:#}")))
            }
        }
    }

    async fn youtube_transcript(
        &self,
        user: &UserId,
        url: &str,
    ) -> Result<YoutubeTranscript, GenerationError> {
        let video_id = extract_video_id(url)
            .ok_or_else(|| GenerationError::Validation("Invalid YouTube URL".to_string()))?;

        let transcript = self
            .providers
            .transcripts
            .fetch_transcript(&video_id)
            .await
            .map_err(|e| GenerationError::Upstream(format!("{e:#}")))?
            .ok_or_else(|| {
                GenerationError::NotFound("No transcript available for this video".to_string())
            })?;

        info!(user_id = %user, video_id = %video_id, chars = transcript.len(), "YouTube transcript fetched");
        Ok(YoutubeTranscript {
            video_id,
            transcript,
        })
    }
}
