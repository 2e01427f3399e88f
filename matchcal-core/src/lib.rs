//! Core of matchcal: reconcile extracted sports fixtures against a remote
//! calendar.
//!
//! Extracted [`EventCandidate`]s are resolved to absolute times, matched
//! against a one-shot [`EventIndex`] of the calendar, and written with
//! delete-then-insert through a [`CredentialGuard`]. Network access lives
//! behind the [`CalendarTransport`], [`CredentialProvider`] and
//! [`EventExtractor`] traits.

pub mod candidate;
pub mod config;
pub mod credential;
pub mod error;
pub mod extract;
pub mod guard;
pub mod index;
pub mod matcher;
pub mod reconcile;
pub mod remote;
pub mod time;
pub mod transport;

pub use candidate::{EventCandidate, ResolvedCandidate};
pub use config::MatchcalConfig;
pub use credential::{AccessToken, CredentialProvider};
pub use error::{MatchCalError, MatchCalResult};
pub use extract::EventExtractor;
pub use guard::{CredentialGuard, GuardPolicy};
pub use index::{EventIndex, FetchWindow};
pub use matcher::MatchStrictness;
pub use reconcile::{BatchState, ReconcileError, ReconcileOptions, Reconciler, ReconciliationResult};
pub use remote::{EventBody, EventDateTime, RemoteEvent};
pub use transport::CalendarTransport;
