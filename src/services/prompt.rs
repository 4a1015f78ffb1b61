use regex::Regex;
use std::sync::OnceLock;

use crate::domain::{ContentLength, OutputFormat, Tone};

pub const SYSTEM_PROMPT: &str = "You are an expert content strategist and copywriter. \
You repurpose existing content into new formats while preserving its key ideas, facts and voice. \
Respond with the finished content only: no introductions, explanations or closing remarks.";

#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    pub original_content: &'a str,
    pub output_format: OutputFormat,
    pub tone: Tone,
    pub length: ContentLength,
    pub target_audience: Option<&'a str>,
}

#[must_use]
pub fn build_prompt(input: &PromptInput<'_>) -> String {
    let audience = input
        .target_audience
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or("a general audience");

    format!(
        "Repurpose the following content into a {label}.\n\n\
         Requirements:\n\
         - {guidance}\n\
         - Tone: {tone}.\n\
         - Length: {length}\n\
         - Target audience: {audience}.\n\n\
         Original content:\n\"\"\"\n{content}\n\"\"\"",
        label = input.output_format.label(),
        guidance = input.output_format.guidance(),
        tone = input.tone,
        length = input.length.guidance(),
        content = input.original_content.trim(),
    )
}

/// Leading chatter models add around the actual content, plus a trailing
/// offer to revise it.
const BOILERPLATE_PATTERNS: &[&str] = &[
    r"(?i)^\s*(?:sure|certainly|absolutely|of course|okay)[!.,]?\s*\n+",
    r"(?i)^\s*(?:sure|certainly|absolutely|of course|okay)\b[^\n]*:[ \t]*\n+",
    r"(?i)^\s*here(?:'s| is| are)\b[^\n]*:[ \t]*\n+",
    r"(?i)^\s*i(?:'ve| have)\s+(?:repurposed|rewritten|transformed|converted|created|turned|adapted)\b[^\n]*:[ \t]*\n+",
    r"(?i)^\s*(?:below is|the following is)\b[^\n]*:[ \t]*\n+",
    r"(?i)\n+[ \t]*(?:let me know if|feel free to ask if|if) you(?:'d| would)? (?:like|want|need)\b[^\n]*\b(?:changes?|adjustments?|edits?|revisions?|tweaks?|another version|modifications?)\b[^\n]*\s*$",
];

fn boilerplate() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        BOILERPLATE_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect()
    })
}

/// Strips conversational preambles and revision offers, then trims.
#[must_use]
pub fn clean_output(raw: &str) -> String {
    let mut text = raw.trim().to_string();

    // A reply can stack several preambles ("Sure!\nHere's your thread:\n").
    for _ in 0..4 {
        let before = text.len();
        for re in boilerplate() {
            text = re.replace(&text, "").into_owned();
        }
        text = text.trim().to_string();
        if text.len() == before {
            break;
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_every_option() {
        let prompt = build_prompt(&PromptInput {
            original_content: "  Rust 2024 ships let chains.  ",
            output_format: OutputFormat::LinkedinPost,
            tone: Tone::Casual,
            length: ContentLength::Short,
            target_audience: Some("backend engineers"),
        });

        assert!(prompt.contains("LinkedIn post"));
        assert!(prompt.contains("Tone: casual."));
        assert!(prompt.contains("Keep it brief"));
        assert!(prompt.contains("backend engineers"));
        assert!(prompt.contains("\"\"\"\nRust 2024 ships let chains.\n\"\"\""));
    }

    #[test]
    fn blank_audience_falls_back() {
        let prompt = build_prompt(&PromptInput {
            original_content: "x",
            output_format: OutputFormat::Tweet,
            tone: Tone::Professional,
            length: ContentLength::Medium,
            target_audience: Some("   "),
        });
        assert!(prompt.contains("a general audience"));
    }

    #[test]
    fn strips_stacked_preambles() {
        let raw = "Sure!\nHere's your Twitter thread:\n\n1/ Rust is fast.\n2/ And safe.";
        assert_eq!(clean_output(raw), "1/ Rust is fast.\n2/ And safe.");
    }

    #[test]
    fn strips_repurposed_preamble_and_sign_off() {
        let raw = "I've repurposed your article into a blog post:\n# Title\nBody\n\nLet me know if you'd like changes!";
        assert_eq!(clean_output(raw), "# Title\nBody");
    }

    #[test]
    fn keeps_closing_lines_of_emails() {
        let raw = "Subject: Launch update\n\nHi team,\n\nWe ship Monday.\n\nLet me know if you have any questions.";
        assert_eq!(clean_output(raw), raw);

        let raw = "Hi all,\n\nThe beta is open.\n\nFeel free to forward this to your colleagues.";
        assert_eq!(clean_output(raw), raw);
    }

    #[test]
    fn strips_offer_to_revise() {
        let raw = "Hi team,\n\nWe ship Monday.\n\nIf you'd like any adjustments to the tone, just say so.";
        assert_eq!(clean_output(raw), "Hi team,\n\nWe ship Monday.");
    }

    #[test]
    fn leaves_content_that_only_looks_similar() {
        let raw = "Here is why Rust matters: memory safety.";
        assert_eq!(clean_output(raw), raw);
    }
}
