//! The remote calendar, as seen by the reconciler.

use async_trait::async_trait;

use crate::credential::AccessToken;
use crate::error::MatchCalResult;
use crate::index::FetchWindow;
use crate::remote::{EventBody, RemoteEvent};

/// Remote calendar operations. Each call may fail with `RateLimitExceeded`,
/// `AuthExpired`, or `Transport`; the guard decides what to retry.
#[async_trait]
pub trait CalendarTransport: Send + Sync {
    /// All events whose time range intersects `window`.
    async fn list(&self, token: &AccessToken, window: &FetchWindow)
    -> MatchCalResult<Vec<RemoteEvent>>;

    async fn insert(&self, token: &AccessToken, body: &EventBody) -> MatchCalResult<RemoteEvent>;

    async fn delete(&self, token: &AccessToken, event_id: &str) -> MatchCalResult<()>;
}
