//! Google Calendar v3 REST transport.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use matchcal_core::{
    AccessToken, CalendarTransport, EventBody, FetchWindow, MatchCalError, MatchCalResult,
    RemoteEvent,
};

use crate::google_event::{EventPage, GoogleEvent};

pub const API_BASE: &str = "https://www.googleapis.com/calendar/v3/";

/// Largest page the events.list endpoint hands out.
const PAGE_SIZE: &str = "2500";

/// Reasons Google uses on 403 responses that are really rate limits.
const RATE_LIMIT_REASONS: &[&str] = &["rateLimitExceeded", "userRateLimitExceeded"];

pub struct GoogleCalendar {
    http: reqwest::Client,
    base: Url,
    calendar_id: String,
}

impl GoogleCalendar {
    pub fn new(calendar_id: impl Into<String>) -> MatchCalResult<Self> {
        Self::with_base_url(API_BASE, calendar_id)
    }

    pub fn with_base_url(base: &str, calendar_id: impl Into<String>) -> MatchCalResult<Self> {
        let base = Url::parse(base)
            .map_err(|e| MatchCalError::Config(format!("Invalid calendar API URL '{base}': {e}")))?;

        Ok(GoogleCalendar {
            http: reqwest::Client::new(),
            base,
            calendar_id: calendar_id.into(),
        })
    }

    /// `.../calendars/{calendarId}/events[/{eventId}]`, with ids percent-encoded.
    fn events_url(&self, event_id: Option<&str>) -> MatchCalResult<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                MatchCalError::Config(format!("Calendar API URL cannot be a base: {}", self.base))
            })?;
            segments
                .pop_if_empty()
                .extend(["calendars", self.calendar_id.as_str(), "events"]);
            if let Some(id) = event_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn send_raw(
        &self,
        request: RequestBuilder,
        token: &AccessToken,
    ) -> MatchCalResult<Response> {
        request
            .bearer_auth(token.secret())
            .send()
            .await
            .map_err(|e| MatchCalError::Transport(e.to_string()))
    }

    async fn send(&self, request: RequestBuilder, token: &AccessToken) -> MatchCalResult<Response> {
        let response = self.send_raw(request, token).await?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }
}

#[async_trait]
impl CalendarTransport for GoogleCalendar {
    async fn list(
        &self,
        token: &AccessToken,
        window: &FetchWindow,
    ) -> MatchCalResult<Vec<RemoteEvent>> {
        let url = self.events_url(None)?;
        let time_min = window.start.to_rfc3339();
        let time_max = window.end.to_rfc3339();

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("timeMin", time_min.as_str()),
                ("timeMax", time_max.as_str()),
                ("singleEvents", "true"),
                ("maxResults", PAGE_SIZE),
            ];
            if let Some(page_token) = page_token.as_deref() {
                query.push(("pageToken", page_token));
            }

            let request = self.http.get(url.clone()).query(&query);
            let page: EventPage = self
                .send(request, token)
                .await?
                .json()
                .await
                .map_err(|e| MatchCalError::Transport(format!("unreadable event list: {e}")))?;

            for event in page.items.into_iter().filter(|e| !e.is_cancelled()) {
                events.push(RemoteEvent::try_from(event)?);
            }

            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!(calendar = %self.calendar_id, count = events.len(), "Listed events");
        Ok(events)
    }

    async fn insert(&self, token: &AccessToken, body: &EventBody) -> MatchCalResult<RemoteEvent> {
        let request = self.http.post(self.events_url(None)?).json(body);

        let created: GoogleEvent = self
            .send(request, token)
            .await?
            .json()
            .await
            .map_err(|e| MatchCalError::Transport(format!("unreadable created event: {e}")))?;

        debug!(id = %created.id, summary = %body.summary, "Created event");
        RemoteEvent::try_from(created)
    }

    async fn delete(&self, token: &AccessToken, event_id: &str) -> MatchCalResult<()> {
        let request = self.http.delete(self.events_url(Some(event_id))?);

        let response = self.send_raw(request, token).await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                debug!(event_id, "Event already gone");
                Ok(())
            }
            _ => Err(error_from_response(response).await),
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Deserialize)]
struct ErrorItem {
    #[serde(default)]
    reason: String,
}

/// Sort a failed response into the error kinds the guard understands.
async fn error_from_response(response: Response) -> MatchCalError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    classify(status, &text)
}

fn classify(status: StatusCode, text: &str) -> MatchCalError {
    let body = serde_json::from_str::<ErrorEnvelope>(text).ok().map(|e| e.error);
    let message = body
        .as_ref()
        .map(|b| b.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| text.trim().to_string());
    let detail = format!("{} {}", status.as_u16(), message);

    let rate_limit_reason = body.as_ref().is_some_and(|b| {
        b.errors
            .iter()
            .any(|item| RATE_LIMIT_REASONS.contains(&item.reason.as_str()))
    });

    match status {
        StatusCode::TOO_MANY_REQUESTS => MatchCalError::RateLimitExceeded(detail),
        StatusCode::FORBIDDEN if rate_limit_reason => MatchCalError::RateLimitExceeded(detail),
        StatusCode::UNAUTHORIZED => MatchCalError::AuthExpired(detail),
        _ => MatchCalError::Transport(detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calendar_id_is_percent_encoded() {
        let calendar = GoogleCalendar::with_base_url(
            "https://example.test/calendar/v3/",
            "abc#fixtures@group.calendar.google.com",
        )
        .unwrap();

        let url = calendar.events_url(Some("evt 1")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.test/calendar/v3/calendars/abc%23fixtures@group.calendar.google.com/events/evt%201"
        );
    }

    #[test]
    fn classifies_google_error_bodies() {
        let quota = r#"{"error": {"code": 403, "message": "Rate Limit Exceeded",
            "errors": [{"domain": "usageLimits", "reason": "rateLimitExceeded"}]}}"#;
        assert!(classify(StatusCode::FORBIDDEN, quota).is_rate_limited());

        let forbidden = r#"{"error": {"code": 403, "message": "Forbidden",
            "errors": [{"reason": "forbidden"}]}}"#;
        assert!(matches!(
            classify(StatusCode::FORBIDDEN, forbidden),
            MatchCalError::Transport(_)
        ));

        assert!(classify(StatusCode::TOO_MANY_REQUESTS, "").is_rate_limited());
        assert!(classify(StatusCode::UNAUTHORIZED, "{}").is_auth_expired());
    }

    #[test]
    fn transport_message_carries_status_and_google_message() {
        let err = classify(
            StatusCode::BAD_REQUEST,
            r#"{"error": {"message": "Invalid start time."}}"#,
        );
        match err {
            MatchCalError::Transport(msg) => assert_eq!(msg, "400 Invalid start time."),
            other => panic!("unexpected {other:?}"),
        }
    }
}
