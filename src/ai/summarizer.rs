use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const CLAUDE_MODEL: &str = "claude-3-5-haiku-20241022";

/// Articles are truncated before summarization to bound request size.
const MAX_INPUT_CHARS: usize = 3000;

#[derive(Debug, Serialize)]
struct MessageRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    system: Option<String>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    #[allow(dead_code)]
    content_type: String,
    text: Option<String>,
}

/// A generated title/summary pair for one article.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeneratedShort {
    pub title: String,
    pub summary: String,
}

pub struct Summarizer {
    client: reqwest::Client,
    api_key: String,
}

impl Summarizer {
    pub fn new(api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");
        Self { client, api_key }
    }

    /// Generate a short-form title and summary for an article body. The
    /// model is asked for bare JSON; anything that does not parse into a
    /// non-empty {title, summary} pair is an error, never an empty result.
    pub async fn summarize(&self, article_body: &str) -> Result<GeneratedShort> {
        let system_prompt = r#"You write short-form news digests.
Given a news article, produce a punchy title of at most 20 words and a
summary of at most 2 sentences in a polite news register.
Respond with exactly one JSON object of the form
{"title": "...", "summary": "..."} and nothing else - no markdown fences."#;

        let request = MessageRequest {
            model: CLAUDE_MODEL.to_string(),
            max_tokens: 512,
            messages: vec![Message {
                role: "user".to_string(),
                content: format!(
                    "Summarize the following article:\n\n{}",
                    truncate_chars(article_body, MAX_INPUT_CHARS)
                ),
            }],
            system: Some(system_prompt.to_string()),
        };

        let response = self
            .client
            .post(CLAUDE_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::SummaryApi(format!("API error: {}", error_text)));
        }

        let message_response: MessageResponse = response.json().await?;

        let raw = message_response
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");

        parse_short_response(&raw)
    }
}

/// Parse the model's reply into a title/summary pair. Tolerates markdown
/// fences around the JSON; rejects anything malformed or empty.
fn parse_short_response(raw: &str) -> Result<GeneratedShort> {
    let trimmed = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let parsed: GeneratedShort = serde_json::from_str(trimmed)
        .map_err(|e| AppError::SummaryApi(format!("unparseable response: {e}")))?;

    if parsed.title.trim().is_empty() || parsed.summary.trim().is_empty() {
        return Err(AppError::SummaryApi(
            "response missing title or summary".to_string(),
        ));
    }

    Ok(parsed)
}

/// Truncate on a character boundary; byte slicing could split a UTF-8
/// sequence.
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json() {
        let short =
            parse_short_response(r#"{"title": "Rates hold steady", "summary": "No change."}"#)
                .unwrap();
        assert_eq!(short.title, "Rates hold steady");
        assert_eq!(short.summary, "No change.");
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"title\": \"T\", \"summary\": \"S\"}\n```";
        let short = parse_short_response(raw).unwrap();
        assert_eq!(short.title, "T");
    }

    #[test]
    fn rejects_non_json() {
        let err = parse_short_response("Sure! Here is your summary:").unwrap_err();
        assert!(matches!(err, AppError::SummaryApi(_)));
    }

    #[test]
    fn rejects_empty_fields() {
        let err = parse_short_response(r#"{"title": "", "summary": "S"}"#).unwrap_err();
        assert!(matches!(err, AppError::SummaryApi(_)));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = "한국어 기사 본문";
        let truncated = truncate_chars(s, 3);
        assert_eq!(truncated, "한국어");
        assert_eq!(truncate_chars("short", 100), "short");
    }
}
