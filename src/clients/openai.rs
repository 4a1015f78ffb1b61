use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::GenerationConfig;
use crate::domain::{ImageSize, ImageStyle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    pub size: ImageSize,
    pub style: ImageStyle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub url: String,
    pub revised_prompt: Option<String>,
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage>;
}

/// An uploaded audio or video file.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: AudioUpload) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ImagesRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
    style: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    revised_prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    image_model: String,
    transcription_model: String,
}

impl OpenAiClient {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .context("Failed to build OpenAI HTTP client")?;

        Ok(Self {
            client,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            api_key: config.openai_api_key.clone(),
            image_model: config.image_model.clone(),
            transcription_model: config.transcription_model.clone(),
        })
    }

    fn ensure_configured(&self) -> Result<()> {
        if self.api_key.is_empty() {
            bail!("OpenAI API key is not configured");
        }
        Ok(())
    }
}

#[async_trait]
impl ImageGenerator for OpenAiClient {
    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage> {
        self.ensure_configured()?;

        let body = ImagesRequest {
            model: &self.image_model,
            prompt: &request.prompt,
            n: 1,
            size: request.size.as_str(),
            style: request.style.as_str(),
        };

        let response = self
            .client
            .post(format!("{}/v1/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to reach image provider")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Image generation failed: status={status}, body={body}");
        }

        let parsed: ImagesResponse = response
            .json()
            .await
            .context("Failed to parse image generation response")?;

        let image = parsed
            .data
            .into_iter()
            .next()
            .context("Image provider returned no images")?;
        let url = image.url.context("Image provider returned no URL")?;

        debug!(model = %self.image_model, size = request.size.as_str(), "Image generated");
        Ok(GeneratedImage {
            url,
            revised_prompt: image.revised_prompt,
        })
    }
}

#[async_trait]
impl Transcriber for OpenAiClient {
    async fn transcribe(&self, audio: AudioUpload) -> Result<String> {
        self.ensure_configured()?;

        let size = audio.bytes.len();
        let mut part = reqwest::multipart::Part::bytes(audio.bytes).file_name(audio.file_name);
        if let Some(content_type) = audio.content_type.as_deref() {
            part = part
                .mime_str(content_type)
                .context("Invalid upload content type")?;
        }

        let form = reqwest::multipart::Form::new()
            .text("model", self.transcription_model.clone())
            .part("file", part);

        let response = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("Failed to reach transcription provider")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Transcription failed: status={status}, body={body}");
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .context("Failed to parse transcription response")?;

        debug!(bytes = size, chars = parsed.text.len(), "Transcription finished");
        Ok(parsed.text)
    }
}
