use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ParseEnumError;

/// Target format for a repurposed piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    Tweet,
    TwitterThread,
    LinkedinPost,
    BlogPost,
    Newsletter,
    InstagramCaption,
    FacebookPost,
    YoutubeScript,
    Email,
    Summary,
    PodcastNotes,
}

impl OutputFormat {
    pub const ALL: [Self; 11] = [
        Self::Tweet,
        Self::TwitterThread,
        Self::LinkedinPost,
        Self::BlogPost,
        Self::Newsletter,
        Self::InstagramCaption,
        Self::FacebookPost,
        Self::YoutubeScript,
        Self::Email,
        Self::Summary,
        Self::PodcastNotes,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tweet => "tweet",
            Self::TwitterThread => "twitter-thread",
            Self::LinkedinPost => "linkedin-post",
            Self::BlogPost => "blog-post",
            Self::Newsletter => "newsletter",
            Self::InstagramCaption => "instagram-caption",
            Self::FacebookPost => "facebook-post",
            Self::YoutubeScript => "youtube-script",
            Self::Email => "email",
            Self::Summary => "summary",
            Self::PodcastNotes => "podcast-notes",
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Tweet => "Tweet",
            Self::TwitterThread => "Twitter/X thread",
            Self::LinkedinPost => "LinkedIn post",
            Self::BlogPost => "Blog post",
            Self::Newsletter => "Email newsletter",
            Self::InstagramCaption => "Instagram caption",
            Self::FacebookPost => "Facebook post",
            Self::YoutubeScript => "YouTube video script",
            Self::Email => "Email",
            Self::Summary => "Summary",
            Self::PodcastNotes => "Podcast show notes",
        }
    }

    /// Format-specific writing instructions appended to the prompt.
    #[must_use]
    pub const fn guidance(&self) -> &'static str {
        match self {
            Self::Tweet => {
                "Write a single tweet of at most 280 characters. Use at most two relevant hashtags."
            }
            Self::TwitterThread => {
                "Write a thread of 4 to 8 tweets. Number each tweet (1/, 2/, ...) and keep each under 280 characters. Open with a strong hook."
            }
            Self::LinkedinPost => {
                "Write a LinkedIn post with a hook in the first line, short paragraphs, and a closing question or call to action."
            }
            Self::BlogPost => {
                "Write a blog post in Markdown with a title, an introduction, descriptive subheadings, and a conclusion."
            }
            Self::Newsletter => {
                "Write an email newsletter with a subject line, a friendly greeting, scannable sections, and a sign-off."
            }
            Self::InstagramCaption => {
                "Write an Instagram caption with an engaging first line, line breaks for readability, a call to action, and up to ten hashtags at the end."
            }
            Self::FacebookPost => {
                "Write a conversational Facebook post that invites comments."
            }
            Self::YoutubeScript => {
                "Write a YouTube video script with a hook, an intro, clearly marked sections, and an outro asking viewers to subscribe."
            }
            Self::Email => "Write an email with a subject line, a clear body, and a call to action.",
            Self::Summary => "Write a concise summary that captures the key points as short bullet points.",
            Self::PodcastNotes => {
                "Write podcast show notes with an episode summary, key takeaways, and timestamps placeholders for topics."
            }
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ParseEnumError;

    /// Accepts the canonical kebab-case name as well as snake_case and
    /// spaced spellings ("blog_post", "Blog Post").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        let normalized = match normalized.as_str() {
            "twitter" | "x-thread" | "thread" => "twitter-thread",
            "linkedin" => "linkedin-post",
            "blog" => "blog-post",
            "instagram" => "instagram-caption",
            "facebook" => "facebook-post",
            "youtube" => "youtube-script",
            "podcast" => "podcast-notes",
            other => other,
        }
        .to_string();

        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == normalized)
            .ok_or_else(|| ParseEnumError::new("output format", s))
    }
}

/// Voice of the generated content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Professional,
    Casual,
    Friendly,
    Humorous,
    Formal,
    Persuasive,
    Informative,
    Inspirational,
}

impl Tone {
    pub const ALL: [Self; 8] = [
        Self::Professional,
        Self::Casual,
        Self::Friendly,
        Self::Humorous,
        Self::Formal,
        Self::Persuasive,
        Self::Informative,
        Self::Inspirational,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Professional => "professional",
            Self::Casual => "casual",
            Self::Friendly => "friendly",
            Self::Humorous => "humorous",
            Self::Formal => "formal",
            Self::Persuasive => "persuasive",
            Self::Informative => "informative",
            Self::Inspirational => "inspirational",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| ParseEnumError::new("tone", s))
    }
}

/// Requested length of the generated content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl ContentLength {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        }
    }

    #[must_use]
    pub const fn guidance(&self) -> &'static str {
        match self {
            Self::Short => "Keep it brief and punchy.",
            Self::Medium => "Use a moderate length with enough detail to be useful.",
            Self::Long => "Be comprehensive and go into depth.",
        }
    }
}

impl FromStr for ContentLength {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "medium" => Ok(Self::Medium),
            "long" => Ok(Self::Long),
            _ => Err(ParseEnumError::new("content length", s)),
        }
    }
}

/// Lifecycle status of a content history item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Draft,
    Published,
    #[default]
    Completed,
    Archived,
}

impl ContentStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "completed" => Ok(Self::Completed),
            "archived" => Ok(Self::Archived),
            _ => Err(ParseEnumError::new("content status", s)),
        }
    }
}

/// Dimensions accepted by the image provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImageSize {
    #[default]
    #[serde(rename = "1024x1024")]
    Square,
    #[serde(rename = "1792x1024")]
    Landscape,
    #[serde(rename = "1024x1792")]
    Portrait,
}

impl ImageSize {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1024x1024",
            Self::Landscape => "1792x1024",
            Self::Portrait => "1024x1792",
        }
    }
}

impl FromStr for ImageSize {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1024x1024" => Ok(Self::Square),
            "1792x1024" => Ok(Self::Landscape),
            "1024x1792" => Ok(Self::Portrait),
            _ => Err(ParseEnumError::new("image size", s)),
        }
    }
}

/// Rendering style accepted by the image provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStyle {
    #[default]
    Vivid,
    Natural,
}

impl ImageStyle {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Vivid => "vivid",
            Self::Natural => "natural",
        }
    }
}

impl FromStr for ImageStyle {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vivid" => Ok(Self::Vivid),
            "natural" => Ok(Self::Natural),
            _ => Err(ParseEnumError::new("image style", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_accepts_loose_spellings() {
        assert_eq!("blog_post".parse::<OutputFormat>().unwrap(), OutputFormat::BlogPost);
        assert_eq!("Blog Post".parse::<OutputFormat>().unwrap(), OutputFormat::BlogPost);
        assert_eq!("twitter".parse::<OutputFormat>().unwrap(), OutputFormat::TwitterThread);
        assert_eq!("linkedin".parse::<OutputFormat>().unwrap(), OutputFormat::LinkedinPost);
        assert!("fax".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn tone_and_status_parse() {
        assert_eq!("Casual".parse::<Tone>().unwrap(), Tone::Casual);
        assert!("angry".parse::<Tone>().is_err());
        assert_eq!("ARCHIVED".parse::<ContentStatus>().unwrap(), ContentStatus::Archived);
        assert!("deleted".parse::<ContentStatus>().is_err());
    }

    #[test]
    fn image_size_uses_pixel_strings() {
        assert_eq!(
            serde_json::to_string(&ImageSize::Landscape).unwrap(),
            "\"1792x1024\""
        );
        assert_eq!("1024x1792".parse::<ImageSize>().unwrap(), ImageSize::Portrait);
        assert!("512x512".parse::<ImageSize>().is_err());
    }
}
