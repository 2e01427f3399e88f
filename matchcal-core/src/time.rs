//! Wall-clock timestamps to absolute instants in a named reference zone.

use chrono::{
    DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc,
};
use chrono_tz::Tz;

use crate::error::{MatchCalError, MatchCalResult};

pub const DEFAULT_TIME_ZONE: &str = "Europe/Berlin";

/// Naive forms accepted for wall-clock values, tried in order.
/// `%y` must come before `%Y`, which would happily read "24" as year 24.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d.%m.%y %H:%M",
    "%d.%m.%Y %H:%M",
];

/// Parse an IANA zone name such as "Europe/Berlin".
pub fn parse_zone(name: &str) -> MatchCalResult<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| MatchCalError::Config(format!("Unknown time zone '{}'", name)))
}

/// Convert a wall-clock string to an absolute instant.
///
/// Values carrying an explicit offset (`Z`, `+02:00`) are taken as-is.
/// Naive values are read as local time in `zone`, using the offset the zone
/// actually has at that moment, so summer and winter times resolve differently.
pub fn normalize(wall_clock: &str, zone: Tz) -> MatchCalResult<DateTime<Utc>> {
    let value = wall_clock.trim();

    if value.is_empty() {
        return Err(MatchCalError::malformed_timestamp(value, "empty timestamp"));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Some(utc) = value.strip_suffix('Z').or_else(|| value.strip_suffix('z'))
        && let Some(naive) = parse_naive(utc)
    {
        return Ok(naive.and_utc());
    }

    let naive = parse_naive(value).ok_or_else(|| {
        MatchCalError::malformed_timestamp(value, "unrecognized date/time format")
    })?;

    localize(naive, zone)
}

/// Resolve a local date-time in `zone` to UTC.
///
/// Ambiguous times (the repeated hour when clocks go back) resolve to the
/// earlier instant. Times inside the spring-forward gap are shifted forward
/// by the length of the gap, so 02:30 on a 02:00 -> 03:00 night becomes 03:30.
pub fn localize(naive: NaiveDateTime, zone: Tz) -> MatchCalResult<DateTime<Utc>> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => {
            let before_gap = zone
                .offset_from_local_datetime(&(naive - Duration::days(1)))
                .earliest()
                .ok_or_else(|| {
                    MatchCalError::malformed_timestamp(
                        &naive.to_string(),
                        format!("no valid offset in {}", zone.name()),
                    )
                })?;
            let seconds = i64::from(before_gap.fix().local_minus_utc());
            Ok((naive - Duration::seconds(seconds)).and_utc())
        }
    }
}

/// Calendar date of `instant` as seen in `zone`. Matching compares these.
pub fn date_only(instant: DateTime<Utc>, zone: Tz) -> NaiveDate {
    instant.with_timezone(&zone).date_naive()
}

/// Format `instant` as local time in `zone` with its offset, e.g.
/// `2024-09-20T19:15:00+02:00`.
pub fn to_local_rfc3339(instant: DateTime<Utc>, zone: Tz) -> String {
    instant
        .with_timezone(&zone)
        .format("%Y-%m-%dT%H:%M:%S%:z")
        .to_string()
}

fn parse_naive(value: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
