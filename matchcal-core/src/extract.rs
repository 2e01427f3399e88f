//! The analysis step: prompt template and recovery of its JSON output.

use async_trait::async_trait;
use serde_json::Value;

use crate::candidate::EventCandidate;
use crate::error::{MatchCalError, MatchCalResult};

/// Prompt used when no template is configured. `{text}` is replaced by the
/// schedule text, `{year}` by the current year.
pub const DEFAULT_PROMPT: &str = r#"Extract every basketball fixture from the schedule text below.

Answer with a JSON array only, no prose and no Markdown. One object per fixture:
{
  "eventTitle": "<home team> vs <away team>",
  "startDateTime": "YYYY-MM-DDTHH:MM:SS",
  "endDateTime": "YYYY-MM-DDTHH:MM:SS or null if not stated",
  "location": "<venue, or a stream link found in the text, or null>",
  "league": "<league or competition, or null>",
  "description": "<short summary of the game; write one if the text has none>"
}

Rules:
- Times are local wall-clock times as written in the text, without offsets.
- If a date has no year, assume {year}.
- Ignore dates whose description mentions Eishockey, Fussball or Volleyball.
- Do not create the same event title twice on the same date.
- Always use "vs" if you need to insert a separating word between teams.

Schedule text:
{text}
"#;

/// Turns free-form schedule text into candidates.
#[async_trait]
pub trait EventExtractor: Send + Sync {
    /// Fails with `Analysis` when the output is empty or not JSON-array shaped.
    async fn extract_events(
        &self,
        raw_text: &str,
        prompt_template: Option<&str>,
    ) -> MatchCalResult<Vec<EventCandidate>>;
}

/// Fill in a prompt template. A template without `{text}` gets the text
/// appended after a blank line.
pub fn render_prompt(template: &str, text: &str, year: i32) -> String {
    let prompt = template.replace("{year}", &year.to_string());

    if prompt.contains("{text}") {
        prompt.replace("{text}", text)
    } else {
        format!("{}\n\n{}", prompt.trim_end(), text)
    }
}

/// Parse analysis output into candidates.
///
/// Accepts a bare JSON array, an array wrapped in a Markdown fence or in
/// surrounding prose, and a single event object (taken as a one-element
/// list). Objects without an event title or start are rejected.
pub fn parse_analysis_output(output: &str) -> MatchCalResult<Vec<EventCandidate>> {
    let trimmed = strip_code_fence(output.trim());
    if trimmed.is_empty() {
        return Err(MatchCalError::Analysis("analysis returned no output".into()));
    }

    let value = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => value,
        Err(_) => {
            let slice = outer_array(trimmed).ok_or_else(|| {
                MatchCalError::Analysis(format!("output is not JSON: {}", preview(trimmed)))
            })?;
            serde_json::from_str(slice)
                .map_err(|e| MatchCalError::Analysis(format!("embedded array is not JSON: {e}")))?
        }
    };

    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) if EVENT_KEYS.iter().any(|key| map.contains_key(*key)) => {
            vec![Value::Object(map)]
        }
        other => {
            return Err(MatchCalError::Analysis(format!(
                "expected a JSON array, got {}",
                preview(&other.to_string())
            )));
        }
    };

    items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item)
                .map_err(|e| MatchCalError::Analysis(format!("unexpected event shape: {e}")))
        })
        .collect()
}

/// Keys that mark a lone object as an event rather than some wrapper.
const EVENT_KEYS: &[&str] = &["eventTitle", "title", "startDateTime", "startLocal"];

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("json") on the opening line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn outer_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (start < end).then(|| &text[start..=end])
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 80;
    match text.char_indices().nth(LIMIT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
