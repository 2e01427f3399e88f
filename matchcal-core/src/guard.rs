//! Credential freshness and bounded rate-limit retry around remote calls.
//!
//! [`CredentialGuard`] owns the cached token and is the only place that
//! refreshes it. Refreshes happen under one async mutex, so callers that find
//! the token stale while a refresh is in flight wait for that refresh instead
//! of starting their own. [`BatchGuard`] adds the per-batch call counters that
//! drive proactive refreshes.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::credential::{AccessToken, CredentialProvider};
use crate::error::{MatchCalError, MatchCalResult};

/// Tunables for the guard. Defaults: 60s margin, 1s backoff, refresh every
/// 10 deletes and every 3 inserts. A threshold of 0 disables it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardPolicy {
    pub min_validity: Duration,
    pub rate_limit_backoff: Duration,
    pub refresh_every_deletes: u32,
    pub refresh_every_inserts: u32,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        GuardPolicy {
            min_validity: Duration::from_secs(60),
            rate_limit_backoff: Duration::from_secs(1),
            refresh_every_deletes: 10,
            refresh_every_inserts: 3,
        }
    }
}

impl GuardPolicy {
    fn margin(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.min_validity)
            .unwrap_or_else(|_| chrono::Duration::days(365))
    }
}

/// The kind of remote call being guarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    List,
    Insert,
    Delete,
}

struct TokenState {
    token: Option<AccessToken>,
    /// Bumped on every successful refresh.
    generation: u64,
}

pub struct CredentialGuard {
    provider: Arc<dyn CredentialProvider>,
    policy: GuardPolicy,
    state: Mutex<TokenState>,
}

impl CredentialGuard {
    pub fn new(provider: Arc<dyn CredentialProvider>, policy: GuardPolicy) -> Self {
        CredentialGuard {
            provider,
            policy,
            state: Mutex::new(TokenState {
                token: None,
                generation: 0,
            }),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_valid()
    }

    /// Fresh counters for one reconciliation batch.
    pub fn batch(&self) -> BatchGuard<'_> {
        BatchGuard {
            guard: self,
            deletes: AtomicU32::new(0),
            inserts: AtomicU32::new(0),
        }
    }

    /// A token valid for longer than the policy margin, refreshing if needed.
    /// Returns the token with the refresh generation it belongs to.
    pub async fn fresh_token(&self) -> MatchCalResult<(AccessToken, u64)> {
        let mut state = self.state.lock().await;

        if state.token.is_none() {
            state.token = Some(self.provider.get_token().await?);
        }

        if let Some(token) = state.token.as_ref().filter(|t| t.is_fresh(self.policy.margin())) {
            return Ok((token.clone(), state.generation));
        }

        debug!("Access token below validity margin, refreshing");
        self.refresh_locked(&mut state).await
    }

    /// Refresh unless someone already did since `seen_generation`.
    pub async fn force_refresh(&self, seen_generation: u64) -> MatchCalResult<(AccessToken, u64)> {
        let mut state = self.state.lock().await;

        if state.generation != seen_generation
            && let Some(token) = state.token.as_ref().filter(|t| t.is_fresh(self.policy.margin()))
        {
            debug!(generation = state.generation, "Token already refreshed by another call");
            return Ok((token.clone(), state.generation));
        }

        self.refresh_locked(&mut state).await
    }

    async fn refresh_locked(&self, state: &mut TokenState) -> MatchCalResult<(AccessToken, u64)> {
        let token = self.provider.refresh().await.map_err(|e| match e {
            MatchCalError::AuthExpired(_) => e,
            other => MatchCalError::AuthExpired(format!("credential refresh failed: {other}")),
        })?;

        state.token = Some(token.clone());
        state.generation += 1;
        debug!(generation = state.generation, expires_at = ?token.expires_at(), "Refreshed access token");

        Ok((token, state.generation))
    }
}

/// Guarded calls for a single batch.
pub struct BatchGuard<'a> {
    guard: &'a CredentialGuard,
    deletes: AtomicU32,
    inserts: AtomicU32,
}

impl BatchGuard<'_> {
    /// Run `op` with a fresh token.
    ///
    /// A `RateLimitExceeded` answer is retried exactly once, after the backoff
    /// and a refresh. An `AuthExpired` answer is retried once after a refresh.
    /// Anything else, including a second rate-limit answer, is returned.
    pub async fn call<T, F, Fut>(&self, kind: CallKind, op: F) -> MatchCalResult<T>
    where
        F: Fn(AccessToken) -> Fut,
        Fut: Future<Output = MatchCalResult<T>>,
    {
        let (mut token, mut generation) = self.guard.fresh_token().await?;

        if self.due_for_refresh(kind) {
            debug!(?kind, "Proactive credential refresh");
            (token, generation) = self.guard.force_refresh(generation).await?;
        }

        match op(token).await {
            Err(e) if e.is_rate_limited() => {
                warn!(?kind, error = %e, "Rate limited, retrying once");
                tokio::time::sleep(self.guard.policy.rate_limit_backoff).await;
                let (token, _) = self.guard.force_refresh(generation).await?;

                op(token).await.map_err(|e| match e {
                    MatchCalError::RateLimitExceeded(msg) => {
                        MatchCalError::RateLimitExceeded(format!("{msg} (after retry)"))
                    }
                    other => other,
                })
            }
            Err(e) if e.is_auth_expired() => {
                warn!(?kind, error = %e, "Token rejected, refreshing and retrying once");
                let (token, _) = self.guard.force_refresh(generation).await?;
                op(token).await
            }
            result => result,
        }
    }

    /// Counts the call and reports whether it should start on a newly
    /// refreshed token: true once every `N` calls of its kind have been issued.
    fn due_for_refresh(&self, kind: CallKind) -> bool {
        let policy = &self.guard.policy;
        let (counter, every) = match kind {
            CallKind::Delete => (&self.deletes, policy.refresh_every_deletes),
            CallKind::Insert => (&self.inserts, policy.refresh_every_inserts),
            CallKind::List => return false,
        };

        let issued = counter.fetch_add(1, Ordering::Relaxed);
        every > 0 && issued > 0 && issued % every == 0
    }
}
