use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::constants::YOUTUBE_TIMEDTEXT_URL;

/// Caption lookup for a video. `Ok(None)` means the video has no captions.
#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    async fn fetch_transcript(&self, video_id: &str) -> Result<Option<String>>;
}

/// Extracts the 11-character video id from the URL shapes users paste:
/// `watch?v=`, `youtu.be/`, `/shorts/`, `/embed/`, `/live/`. A bare id is
/// accepted as well.
#[must_use]
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if is_video_id(input) {
        return Some(input.to_string());
    }

    let with_scheme = if input.contains("://") {
        input.to_string()
    } else {
        format!("https://{input}")
    };
    let url = Url::parse(&with_scheme).ok()?;
    let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");

    let candidate = match host {
        "youtu.be" => url.path_segments()?.next().map(ToString::to_string),
        "youtube.com" | "music.youtube.com" | "youtube-nocookie.com" => {
            let mut segments = url.path_segments()?;
            match segments.next() {
                Some("watch") => url
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned()),
                Some("shorts" | "embed" | "live" | "v") => segments.next().map(ToString::to_string),
                _ => None,
            }
        }
        _ => None,
    }?;

    is_video_id(&candidate).then_some(candidate)
}

fn is_video_id(s: &str) -> bool {
    s.len() == 11
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[derive(Debug, Deserialize)]
struct CaptionTrack {
    #[serde(rename = "text", default)]
    lines: Vec<CaptionLine>,
}

#[derive(Debug, Deserialize)]
struct CaptionLine {
    #[serde(rename = "$text", default)]
    text: String,
}

/// Flattens a timedtext XML document into a single paragraph. Captions are
/// often double-escaped (`&amp;#39;`), so entities are decoded once more
/// after XML parsing.
pub fn parse_caption_xml(xml: &str) -> Result<String> {
    let track: CaptionTrack =
        quick_xml::de::from_str(xml).context("Failed to parse caption XML")?;

    let text = track
        .lines
        .iter()
        .map(|line| html_escape::decode_html_entities(&line.text).into_owned())
        .flat_map(|line| {
            line.split_whitespace()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>()
        .join(" ");

    Ok(text)
}

#[derive(Debug, Clone)]
pub struct YoutubeTranscriptClient {
    client: Client,
    base_url: String,
    language: String,
}

impl YoutubeTranscriptClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(YOUTUBE_TIMEDTEXT_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent(concat!("Repurposely/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build transcript HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            language: "en".to_string(),
        })
    }
}

#[async_trait]
impl TranscriptFetcher for YoutubeTranscriptClient {
    async fn fetch_transcript(&self, video_id: &str) -> Result<Option<String>> {
        let mut url = Url::parse(&self.base_url).context("Invalid transcript URL")?;
        url.query_pairs_mut()
            .append_pair("lang", &self.language)
            .append_pair("v", video_id);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to reach transcript endpoint")?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            bail!("Transcript endpoint returned {status}");
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            debug!(video_id, "No captions available");
            return Ok(None);
        }

        let text = parse_caption_xml(&body)?;
        Ok((!text.is_empty()).then_some(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_ids_from_common_urls() {
        let id = Some("dQw4w9WgXcQ".to_string());
        assert_eq!(extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), id);
        assert_eq!(extract_video_id("https://youtube.com/watch?feature=x&v=dQw4w9WgXcQ"), id);
        assert_eq!(extract_video_id("https://youtu.be/dQw4w9WgXcQ?t=42"), id);
        assert_eq!(extract_video_id("https://www.youtube.com/shorts/dQw4w9WgXcQ"), id);
        assert_eq!(extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ"), id);
        assert_eq!(extract_video_id("m.youtube.com/watch?v=dQw4w9WgXcQ"), id);
        assert_eq!(extract_video_id("dQw4w9WgXcQ"), id);
    }

    #[test]
    fn rejects_other_urls() {
        assert_eq!(extract_video_id("https://vimeo.com/123456"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/watch?v=short"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/channel/UC123"), None);
        assert_eq!(extract_video_id("not a url"), None);
    }

    #[test]
    fn flattens_caption_xml() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" ?><transcript><text start="0.5" dur="2.1">Hello   there</text><text start="2.6" dur="1.9">it&amp;#39;s &amp;quot;fine&amp;quot;</text><text start="5" dur="1"/></transcript>"#;
        assert_eq!(parse_caption_xml(xml).unwrap(), r#"Hello there it's "fine""#);
    }
}
