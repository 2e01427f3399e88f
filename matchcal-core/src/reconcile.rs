//! Delete-then-insert reconciliation of one batch of candidates.
//!
//! A batch walks `Idle -> WindowComputed -> IndexBuilt -> ProcessingCandidates
//! -> Done`, or ends in `Aborted` when no credential is configured or the
//! existing-event index cannot be built. Everything after the index is per-candidate: failures are recorded
//! in the result and the batch moves on.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Duration;
use chrono_tz::Tz;
use futures::StreamExt;
use futures::stream;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::candidate::{DEFAULT_EVENT_MINUTES, EventCandidate, ResolvedCandidate};
use crate::error::{MatchCalError, MatchCalResult};
use crate::guard::{BatchGuard, CallKind, CredentialGuard};
use crate::index::{EventIndex, FetchWindow};
use crate::matcher::MatchStrictness;
use crate::transport::CalendarTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatchState {
    Idle,
    WindowComputed,
    IndexBuilt,
    ProcessingCandidates,
    Done,
    Aborted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOptions {
    /// Zone the candidates' wall-clock times are read in.
    pub zone: Tz,
    /// Length of events without an end time.
    pub default_duration: Duration,
    pub strictness: MatchStrictness,
    /// Candidates processed at the same time. Values below 1 act as 1.
    pub concurrency: usize,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        ReconcileOptions {
            zone: chrono_tz::Europe::Berlin,
            default_duration: Duration::minutes(DEFAULT_EVENT_MINUTES),
            strictness: MatchStrictness::default(),
            concurrency: 1,
        }
    }
}

/// One recorded failure. The batch carried on past it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileError {
    pub candidate_title: String,
    pub message: String,
}

impl ReconcileError {
    fn new(candidate_title: &str, message: impl Into<String>) -> Self {
        ReconcileError {
            candidate_title: candidate_title.to_string(),
            message: message.into(),
        }
    }
}

/// Outcome of a batch. Errors are in candidate input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    pub inserted: usize,
    pub deleted: usize,
    pub errors: Vec<ReconcileError>,
}

impl ReconciliationResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    fn absorb(&mut self, outcome: CandidateOutcome) {
        self.inserted += usize::from(outcome.inserted);
        self.deleted += outcome.deleted;
        self.errors.extend(outcome.errors);
    }
}

impl fmt::Display for ReconciliationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} created, {} deleted", self.inserted, self.deleted)?;
        if self.has_errors() {
            write!(f, ", {} errors", self.errors.len())?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct CandidateOutcome {
    inserted: bool,
    deleted: usize,
    errors: Vec<ReconcileError>,
}

impl CandidateOutcome {
    fn failed(error: ReconcileError) -> Self {
        CandidateOutcome {
            errors: vec![error],
            ..Default::default()
        }
    }
}

pub struct Reconciler {
    transport: Arc<dyn CalendarTransport>,
    guard: Arc<CredentialGuard>,
    options: ReconcileOptions,
    state: Mutex<BatchState>,
}

impl Reconciler {
    pub fn new(
        transport: Arc<dyn CalendarTransport>,
        guard: Arc<CredentialGuard>,
        options: ReconcileOptions,
    ) -> Self {
        Reconciler {
            transport,
            guard,
            options,
            state: Mutex::new(BatchState::Idle),
        }
    }

    /// Where the most recent batch got to.
    pub fn state(&self) -> BatchState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, next: BatchState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(from = ?*state, to = ?next, "Batch state");
        *state = next;
    }

    /// Reconcile one batch.
    ///
    /// Returns `Err` only when the batch cannot start (`ConfigurationMissing`)
    /// or the existing-event index cannot be built (`Fetch`). All other
    /// failures are itemized in the result.
    pub async fn reconcile(
        &self,
        candidates: Vec<EventCandidate>,
    ) -> MatchCalResult<ReconciliationResult> {
        self.transition(BatchState::Idle);

        if candidates.is_empty() {
            self.transition(BatchState::Done);
            return Ok(ReconciliationResult::default());
        }

        if !self.guard.is_configured() {
            self.transition(BatchState::Aborted);
            return Err(MatchCalError::ConfigurationMissing(
                "no calendar credential is configured".into(),
            ));
        }

        let entries: Vec<Result<ResolvedCandidate, ReconcileError>> = candidates
            .iter()
            .map(|candidate| {
                candidate
                    .resolve(self.options.zone, self.options.default_duration)
                    .map_err(|e| {
                        warn!(title = %candidate.title, error = %e, "Dropping candidate");
                        ReconcileError::new(&candidate.title, e.to_string())
                    })
            })
            .collect();

        let resolved: Vec<ResolvedCandidate> =
            entries.iter().filter_map(|e| e.as_ref().ok().cloned()).collect();

        let Some(window) = FetchWindow::covering(&resolved) else {
            self.transition(BatchState::Done);
            return Ok(ReconciliationResult {
                errors: entries.into_iter().filter_map(Result::err).collect(),
                ..Default::default()
            });
        };
        self.transition(BatchState::WindowComputed);

        let batch = self.guard.batch();
        let index = match EventIndex::build(self.transport.as_ref(), &batch, window).await {
            Ok(index) => index,
            Err(e) => {
                self.transition(BatchState::Aborted);
                return Err(e);
            }
        };
        self.transition(BatchState::IndexBuilt);

        self.transition(BatchState::ProcessingCandidates);
        let claimed = Mutex::new(HashSet::new());

        let outcomes: Vec<CandidateOutcome> = stream::iter(entries)
            .map(|entry| {
                let (batch, index, claimed) = (&batch, &index, &claimed);
                async move {
                    match entry {
                        Ok(candidate) => self.process(batch, index, claimed, &candidate).await,
                        Err(error) => CandidateOutcome::failed(error),
                    }
                }
            })
            .buffered(self.options.concurrency.max(1))
            .collect()
            .await;

        let mut result = ReconciliationResult::default();
        for outcome in outcomes {
            result.absorb(outcome);
        }
        self.transition(BatchState::Done);

        info!(
            inserted = result.inserted,
            deleted = result.deleted,
            errors = result.errors.len(),
            "Reconciled batch"
        );
        Ok(result)
    }

    async fn process(
        &self,
        batch: &BatchGuard<'_>,
        index: &EventIndex,
        claimed: &Mutex<HashSet<String>>,
        candidate: &ResolvedCandidate,
    ) -> CandidateOutcome {
        let transport = self.transport.as_ref();
        let mut outcome = CandidateOutcome::default();

        // Another candidate may already be deleting the same remote event.
        let matches: Vec<String> = {
            let mut claimed = claimed.lock().unwrap_or_else(PoisonError::into_inner);
            index
                .find_matches(candidate, self.options.strictness)
                .into_iter()
                .filter(|event| claimed.insert(event.id.clone()))
                .map(|event| event.id.clone())
                .collect()
        };
        debug!(title = %candidate.title, matches = matches.len(), "Matched existing events");

        for event_id in &matches {
            let event_id = event_id.as_str();
            let deleted = batch
                .call(CallKind::Delete, |token| async move {
                    transport.delete(&token, event_id).await
                })
                .await;

            match deleted {
                Ok(()) => outcome.deleted += 1,
                Err(e) => {
                    warn!(title = %candidate.title, event_id, error = %e, "Delete failed");
                    outcome.errors.push(ReconcileError::new(
                        &candidate.title,
                        format!("delete of {event_id} failed: {e}"),
                    ));
                }
            }
        }

        let body = candidate.to_event_body();
        let body = &body;
        let inserted = batch
            .call(CallKind::Insert, |token| async move {
                transport.insert(&token, body).await
            })
            .await;

        match inserted {
            Ok(event) => {
                debug!(title = %candidate.title, id = %event.id, "Inserted event");
                outcome.inserted = true;
            }
            Err(e) => {
                warn!(title = %candidate.title, error = %e, "Insert failed");
                outcome
                    .errors
                    .push(ReconcileError::new(&candidate.title, format!("insert failed: {e}")));
            }
        }

        outcome
    }
}
