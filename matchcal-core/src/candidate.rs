//! Events extracted from schedule text, before and after time resolution.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::error::{MatchCalError, MatchCalResult};
use crate::remote::{EventBody, EventDateTime};
use crate::time::{normalize, to_local_rfc3339};

/// Length assumed for an event whose end time was not extracted.
pub const DEFAULT_EVENT_MINUTES: i64 = 90;

/// One event as produced by the analysis step.
///
/// Field names follow the analysis output (`eventTitle`, `startDateTime`, ...)
/// with the model names accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCandidate {
    #[serde(rename = "eventTitle", alias = "title", default, deserialize_with = "null_as_empty")]
    pub title: String,

    #[serde(
        rename = "startDateTime",
        alias = "startLocal",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub start_local: String,

    #[serde(
        rename = "endDateTime",
        alias = "endLocal",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub end_local: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub league: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A candidate whose start and end are absolute instants.
///
/// Produced by [`EventCandidate::resolve`]; only these reach the reconciler's
/// remote calls.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCandidate {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub zone: Tz,
    pub location: Option<String>,
    pub description: Option<String>,
    pub league: Option<String>,
}

impl EventCandidate {
    pub fn new(title: impl Into<String>, start_local: impl Into<String>) -> Self {
        EventCandidate {
            title: title.into(),
            start_local: start_local.into(),
            ..Default::default()
        }
    }

    pub fn with_end(mut self, end_local: impl Into<String>) -> Self {
        self.end_local = Some(end_local.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_league(mut self, league: impl Into<String>) -> Self {
        self.league = Some(league.into());
        self
    }

    /// Resolve wall-clock times in `zone`.
    ///
    /// A missing (or blank) end becomes `start + default_duration`. An end
    /// that parses but lies before the start is replaced the same way.
    pub fn resolve(&self, zone: Tz, default_duration: Duration) -> MatchCalResult<ResolvedCandidate> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(MatchCalError::InvalidCandidate("event has no title".into()));
        }

        let start = normalize(&self.start_local, zone)?;
        let default_end = start.checked_add_signed(default_duration).ok_or_else(|| {
            MatchCalError::MalformedTimestamp {
                value: self.start_local.clone(),
                reason: format!("default duration of {default_duration} runs out of range"),
            }
        })?;

        let end = match non_blank(&self.end_local) {
            Some(end_local) => {
                let end = normalize(end_local, zone)?;
                if end < start {
                    warn!(title, end_local, "End before start, using default duration");
                    default_end
                } else {
                    end
                }
            }
            None => default_end,
        };

        Ok(ResolvedCandidate {
            title: title.to_string(),
            start,
            end,
            zone,
            location: non_blank(&self.location).map(str::to_string),
            description: non_blank(&self.description).map(str::to_string),
            league: non_blank(&self.league).map(str::to_string),
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl ResolvedCandidate {
    /// Description for the inserted event, ending with a `league:` line when
    /// the league is known but not already mentioned.
    pub fn full_description(&self) -> Option<String> {
        let Some(league) = &self.league else {
            return self.description.clone();
        };

        match &self.description {
            Some(desc) if desc.to_lowercase().contains(&league.to_lowercase()) => {
                Some(desc.clone())
            }
            Some(desc) => Some(format!("{desc}\nleague: {league}")),
            None => Some(format!("league: {league}")),
        }
    }

    /// Body sent to the calendar on insert. Times are local to the reference
    /// zone and carry both the offset and the zone name.
    pub fn to_event_body(&self) -> EventBody {
        let zone_name = self.zone.name().to_string();

        EventBody {
            summary: self.title.clone(),
            location: self.location.clone(),
            description: self.full_description(),
            start: EventDateTime {
                date_time: to_local_rfc3339(self.start, self.zone),
                time_zone: zone_name.clone(),
            },
            end: EventDateTime {
                date_time: to_local_rfc3339(self.end, self.zone),
                time_zone: zone_name,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_zone;
    use chrono::TimeZone;

    fn berlin() -> Tz {
        parse_zone("Europe/Berlin").unwrap()
    }

    fn default_duration() -> Duration {
        Duration::minutes(DEFAULT_EVENT_MINUTES)
    }

    #[test]
    fn missing_end_is_start_plus_ninety_minutes() {
        let candidate = EventCandidate::new("Phoenix Hagen vs Science City Jena", "2024-09-21T18:30");
        let resolved = candidate.resolve(berlin(), default_duration()).unwrap();

        assert_eq!(resolved.end - resolved.start, Duration::minutes(90));
        assert_eq!(resolved.end, Utc.with_ymd_and_hms(2024, 9, 21, 18, 0, 0).unwrap());
    }

    #[test]
    fn blank_end_is_treated_as_missing() {
        let candidate = EventCandidate::new("A vs B", "2024-09-21T18:30").with_end("  ");
        let resolved = candidate.resolve(berlin(), default_duration()).unwrap();
        assert_eq!(resolved.end - resolved.start, Duration::minutes(90));
    }

    #[test]
    fn explicit_end_is_kept() {
        let candidate = EventCandidate::new("A vs B", "2024-09-21T18:30").with_end("2024-09-21T20:45");
        let resolved = candidate.resolve(berlin(), default_duration()).unwrap();
        assert_eq!(resolved.end, Utc.with_ymd_and_hms(2024, 9, 21, 18, 45, 0).unwrap());
    }

    #[test]
    fn end_before_start_falls_back_to_default() {
        let candidate = EventCandidate::new("A vs B", "2024-09-21T18:30").with_end("2024-09-21T10:00");
        let resolved = candidate.resolve(berlin(), default_duration()).unwrap();
        assert_eq!(resolved.end - resolved.start, Duration::minutes(90));
    }

    #[test]
    fn default_end_out_of_range_is_malformed() {
        let candidate = EventCandidate::new("A vs B", "2024-09-21T18:30");
        let err = candidate.resolve(berlin(), Duration::MAX).unwrap_err();
        assert!(matches!(err, MatchCalError::MalformedTimestamp { .. }), "{err:?}");
    }

    #[test]
    fn empty_title_is_rejected() {
        let candidate = EventCandidate::new("   ", "2024-09-21T18:30");
        let err = candidate.resolve(berlin(), default_duration()).unwrap_err();
        assert!(matches!(err, MatchCalError::InvalidCandidate(_)));
    }

    #[test]
    fn unparsable_start_is_rejected() {
        let candidate = EventCandidate::new("A vs B", "Samstag Abend");
        let err = candidate.resolve(berlin(), default_duration()).unwrap_err();
        assert!(matches!(err, MatchCalError::MalformedTimestamp { .. }));
    }

    #[test]
    fn deserializes_analysis_field_names() {
        let json = r#"{
            "eventTitle": "BBC Bayreuth vs. HAKRO Merlins Crailsheim",
            "startDateTime": "2024-09-21T18:45:00",
            "endDateTime": null,
            "location": "https://example.org/stream",
            "league": "ProA",
            "description": "ProA matchday"
        }"#;

        let candidate: EventCandidate = serde_json::from_str(json).unwrap();
        assert_eq!(candidate.title, "BBC Bayreuth vs. HAKRO Merlins Crailsheim");
        assert_eq!(candidate.start_local, "2024-09-21T18:45:00");
        assert_eq!(candidate.end_local, None);
        assert_eq!(candidate.league.as_deref(), Some("ProA"));
    }

    #[test]
    fn deserializes_model_field_names() {
        let json = r#"{"title": "A vs B", "startLocal": "2024-09-21T18:45", "endLocal": "2024-09-21T20:15"}"#;
        let candidate: EventCandidate = serde_json::from_str(json).unwrap();
        assert_eq!(candidate.title, "A vs B");
        assert_eq!(candidate.end_local.as_deref(), Some("2024-09-21T20:15"));
    }

    #[test]
    fn league_line_is_appended_once() {
        let resolved = EventCandidate::new("A vs B", "2024-09-21T18:45")
            .with_description("Matchday 1")
            .with_league("ProA")
            .resolve(berlin(), default_duration())
            .unwrap();
        assert_eq!(resolved.full_description().as_deref(), Some("Matchday 1\nleague: ProA"));

        let mentioned = EventCandidate::new("A vs B", "2024-09-21T18:45")
            .with_description("Matchday 1\nleague: ProA")
            .with_league("ProA")
            .resolve(berlin(), default_duration())
            .unwrap();
        assert_eq!(mentioned.full_description().as_deref(), Some("Matchday 1\nleague: ProA"));
    }

    #[test]
    fn event_body_carries_local_time_and_zone() {
        let body = EventCandidate::new("A vs B", "2024-09-20T19:15")
            .with_location("Trier")
            .resolve(berlin(), default_duration())
            .unwrap()
            .to_event_body();

        assert_eq!(body.summary, "A vs B");
        assert_eq!(body.location.as_deref(), Some("Trier"));
        assert_eq!(body.start.date_time, "2024-09-20T19:15:00+02:00");
        assert_eq!(body.end.date_time, "2024-09-20T20:45:00+02:00");
        assert_eq!(body.start.time_zone, "Europe/Berlin");
    }
}
