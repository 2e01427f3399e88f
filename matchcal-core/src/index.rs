//! A one-shot snapshot of the events already in the calendar.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::candidate::ResolvedCandidate;
use crate::error::{MatchCalError, MatchCalResult};
use crate::guard::{BatchGuard, CallKind};
use crate::matcher::{MatchStrictness, is_match};
use crate::remote::RemoteEvent;
use crate::transport::CalendarTransport;

/// Padding on each side of the batch's time span.
const WINDOW_PADDING_DAYS: i64 = 1;

/// The interval of remote events fetched for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FetchWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FetchWindow {
    /// From one day before the earliest start to one day after the latest end.
    /// `None` for an empty batch.
    pub fn covering(candidates: &[ResolvedCandidate]) -> Option<Self> {
        let start = candidates.iter().map(|c| c.start).min()?;
        let end = candidates.iter().map(|c| c.end).max()?;
        let padding = Duration::days(WINDOW_PADDING_DAYS);

        Some(FetchWindow {
            start: start - padding,
            end: end + padding,
        })
    }
}

/// Remote events in a [`FetchWindow`], fetched once and then read-only.
#[derive(Debug, Clone)]
pub struct EventIndex {
    events: Vec<RemoteEvent>,
}

impl EventIndex {
    /// List the window through the guard. Any failure, after the guard's own
    /// retries, is reported as `Fetch`.
    pub async fn build(
        transport: &dyn CalendarTransport,
        guard: &BatchGuard<'_>,
        window: FetchWindow,
    ) -> MatchCalResult<Self> {
        debug!(start = %window.start, end = %window.end, "Fetching existing events");

        let events = guard
            .call(CallKind::List, |token| async move {
                transport.list(&token, &window).await
            })
            .await
            .map_err(|e| match e {
                MatchCalError::Fetch(_) => e,
                other => MatchCalError::Fetch(other.to_string()),
            })?;

        info!(count = events.len(), "Indexed existing events");
        Ok(EventIndex { events })
    }

    /// Existing events the candidate would duplicate, in listing order.
    pub fn find_matches(
        &self,
        candidate: &ResolvedCandidate,
        strictness: MatchStrictness,
    ) -> Vec<&RemoteEvent> {
        self.events
            .iter()
            .filter(|event| is_match(candidate, event, strictness))
            .collect()
    }
}
