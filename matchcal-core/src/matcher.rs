//! Deciding whether an extracted event is already in the calendar.
//!
//! Extracted titles drift between runs on the same text ("Team A VS Team B",
//! "team a vs. team b"), so titles are compared after normalization. Dates are
//! compared as calendar days in the reference zone.

use serde::{Deserialize, Serialize};

use crate::candidate::ResolvedCandidate;
use crate::remote::RemoteEvent;
use crate::time::date_only;

/// Spellings of the separator word that collapse to `vs`.
const SEPARATOR_VARIANTS: &[&str] = &["vs", "vs.", "versus"];

/// Which dates must agree for two events to match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrictness {
    /// Same normalized title, same start date.
    #[default]
    StartDate,
    /// Same normalized title, same start date and same end date.
    StartAndEndDate,
}

/// Lower-case, collapse whitespace, and spell every separator word as `vs`.
///
/// Idempotent: normalizing an already normalized title returns it unchanged.
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .map(|word| {
            let word = word.to_lowercase();
            if SEPARATOR_VARIANTS.contains(&word.as_str()) {
                "vs".to_string()
            } else {
                word
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn is_match(
    candidate: &ResolvedCandidate,
    remote: &RemoteEvent,
    strictness: MatchStrictness,
) -> bool {
    if normalize_title(&candidate.title) != normalize_title(&remote.summary) {
        return false;
    }

    let zone = candidate.zone;
    let same_start = date_only(candidate.start, zone) == date_only(remote.start, zone);

    match strictness {
        MatchStrictness::StartDate => same_start,
        MatchStrictness::StartAndEndDate => {
            same_start && date_only(candidate.end, zone) == date_only(remote.end, zone)
        }
    }
}
