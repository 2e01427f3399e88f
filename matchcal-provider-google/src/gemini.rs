//! Event extraction through the Gemini `generateContent` endpoint.

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use matchcal_core::extract::{DEFAULT_PROMPT, parse_analysis_output, render_prompt};
use matchcal_core::{EventCandidate, EventExtractor, MatchCalError, MatchCalResult};

pub const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com";

/// Keeps the key out of URLs, and so out of error messages and logs.
const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiExtractor {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// Text of the first candidate, parts concatenated.
    fn text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default()
    }
}

impl GeminiExtractor {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        GeminiExtractor {
            http: reqwest::Client::new(),
            base_url: GEMINI_BASE.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The raw model answer for one prompt.
    async fn generate(&self, prompt: &str) -> MatchCalResult<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }]
            }))
            .send()
            .await
            .map_err(|e| {
                MatchCalError::Transport(format!("analysis request failed: {}", e.without_url()))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => MatchCalError::RateLimitExceeded(body),
                _ => MatchCalError::Analysis(format!("{status}: {}", body.trim())),
            });
        }

        let answer: GenerateResponse = response
            .json()
            .await
            .map_err(|e| MatchCalError::Analysis(format!("unreadable analysis response: {e}")))?;

        Ok(answer.text())
    }
}

#[async_trait]
impl EventExtractor for GeminiExtractor {
    async fn extract_events(
        &self,
        raw_text: &str,
        prompt_template: Option<&str>,
    ) -> MatchCalResult<Vec<EventCandidate>> {
        let template = prompt_template.unwrap_or(DEFAULT_PROMPT);
        let prompt = render_prompt(template, raw_text, Utc::now().year());

        debug!(model = %self.model, prompt_len = prompt.len(), "Requesting analysis");
        let output = self.generate(&prompt).await?;

        let candidates = parse_analysis_output(&output)?;
        debug!(count = candidates.len(), "Extracted candidates");
        Ok(candidates)
    }
}
