//! Google Calendar event resources, as far as the reconciler reads them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use matchcal_core::{MatchCalError, MatchCalResult, RemoteEvent};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEvent {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    pub start: Option<GoogleTime>,
    pub end: Option<GoogleTime>,
}

/// Either `dateTime` (timed event) or `date` (all-day event) is set.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleTime {
    #[serde(default)]
    pub date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPage {
    #[serde(default)]
    pub items: Vec<GoogleEvent>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl GoogleEvent {
    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }
}

impl GoogleTime {
    /// All-day dates are taken as midnight UTC.
    fn instant(&self) -> Option<DateTime<Utc>> {
        self.date_time
            .or_else(|| self.date.and_then(|d| d.and_hms_opt(0, 0, 0)).map(|dt| dt.and_utc()))
    }
}

impl TryFrom<GoogleEvent> for RemoteEvent {
    type Error = MatchCalError;

    fn try_from(event: GoogleEvent) -> MatchCalResult<Self> {
        let start = event
            .start
            .as_ref()
            .and_then(GoogleTime::instant)
            .ok_or_else(|| MatchCalError::Transport(format!("event {} has no start time", event.id)))?;

        let end = event
            .end
            .as_ref()
            .and_then(GoogleTime::instant)
            .unwrap_or(start);

        Ok(RemoteEvent::new(
            event.id,
            event.summary.unwrap_or_default(),
            start,
            end,
        ))
    }
}
