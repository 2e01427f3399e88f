//! Events as the remote calendar sees them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A read-only snapshot of one event in the remote calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEvent {
    pub id: String,
    pub summary: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl RemoteEvent {
    pub fn new(
        id: impl Into<String>,
        summary: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        RemoteEvent {
            id: id.into(),
            summary: summary.into(),
            start,
            end,
        }
    }
}

/// Start or end of an event to insert: local time with offset, plus the zone name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    pub date_time: String,
    pub time_zone: String,
}

/// The body of an insert call.
///
/// Serializes to the shape the Google Calendar `events.insert` endpoint takes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBody {
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: EventDateTime,
    pub end: EventDateTime,
}
