//! In-memory collaborators for driving the reconciler.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use matchcal_core::{
    AccessToken, CalendarTransport, CredentialGuard, CredentialProvider, EventBody, FetchWindow,
    GuardPolicy, MatchCalError, MatchCalResult, ReconcileOptions, Reconciler, RemoteEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    List,
    Insert,
    Delete,
}

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    RateLimit,
    AuthExpired,
    Transport,
}

impl Failure {
    fn to_error(self) -> MatchCalError {
        match self {
            Failure::RateLimit => MatchCalError::RateLimitExceeded("429 Too Many Requests".into()),
            Failure::AuthExpired => MatchCalError::AuthExpired("401 Unauthorized".into()),
            Failure::Transport => MatchCalError::Transport("500 Internal Server Error".into()),
        }
    }
}

struct Script {
    op: Op,
    /// Only fail calls concerning this summary (inserts) or id (deletes).
    target: Option<String>,
    failure: Failure,
    remaining: usize,
}

#[derive(Default)]
struct CalendarState {
    events: Vec<RemoteEvent>,
    next_id: usize,
    calls: Vec<Op>,
    inserted: Vec<EventBody>,
    deleted: Vec<String>,
    tokens: Vec<String>,
    scripts: Vec<Script>,
}

/// A calendar held in memory, with scriptable failures.
#[derive(Default)]
pub struct FakeCalendar {
    state: Mutex<CalendarState>,
}

impl FakeCalendar {
    pub fn with_events(events: Vec<RemoteEvent>) -> Arc<Self> {
        let calendar = FakeCalendar::default();
        calendar.state.lock().unwrap().events = events;
        Arc::new(calendar)
    }

    pub fn empty() -> Arc<Self> {
        Self::with_events(Vec::new())
    }

    pub fn fail(&self, op: Op, failure: Failure, times: usize) {
        self.fail_for(op, None, failure, times);
    }

    pub fn fail_for(&self, op: Op, target: Option<&str>, failure: Failure, times: usize) {
        self.state.lock().unwrap().scripts.push(Script {
            op,
            target: target.map(str::to_string),
            failure,
            remaining: times,
        });
    }

    pub fn calls(&self) -> Vec<Op> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn inserted(&self) -> Vec<EventBody> {
        self.state.lock().unwrap().inserted.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn events(&self) -> Vec<RemoteEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.state.lock().unwrap().tokens.clone()
    }

    fn record(&self, op: Op, target: &str, token: &AccessToken) -> MatchCalResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(op);
        state.tokens.push(token.secret().to_string());

        let scripted = state.scripts.iter_mut().find(|s| {
            s.op == op && s.remaining > 0 && s.target.as_deref().is_none_or(|t| t == target)
        });

        match scripted {
            Some(script) => {
                script.remaining -= 1;
                Err(script.failure.to_error())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CalendarTransport for FakeCalendar {
    async fn list(&self, token: &AccessToken, window: &FetchWindow) -> MatchCalResult<Vec<RemoteEvent>> {
        self.record(Op::List, "", token)?;
        tokio::task::yield_now().await;

        let state = self.state.lock().unwrap();
        Ok(state
            .events
            .iter()
            .filter(|e| e.start <= window.end && e.end >= window.start)
            .cloned()
            .collect())
    }

    async fn insert(&self, token: &AccessToken, body: &EventBody) -> MatchCalResult<RemoteEvent> {
        self.record(Op::Insert, &body.summary, token)?;
        tokio::task::yield_now().await;

        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let event = RemoteEvent::new(
            format!("new-{}", state.next_id),
            body.summary.clone(),
            parse_instant(&body.start.date_time),
            parse_instant(&body.end.date_time),
        );
        state.events.push(event.clone());
        state.inserted.push(body.clone());
        Ok(event)
    }

    async fn delete(&self, token: &AccessToken, event_id: &str) -> MatchCalResult<()> {
        self.record(Op::Delete, event_id, token)?;
        tokio::task::yield_now().await;

        let mut state = self.state.lock().unwrap();
        state.events.retain(|e| e.id != event_id);
        state.deleted.push(event_id.to_string());
        Ok(())
    }
}

pub fn parse_instant(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value).unwrap().with_timezone(&Utc)
}

/// Issues long-lived tokens and counts refreshes.
pub struct FakeCredential {
    configured: bool,
    fail_refresh: bool,
    refreshes: AtomicUsize,
}

impl FakeCredential {
    pub fn valid() -> Arc<Self> {
        Arc::new(FakeCredential {
            configured: true,
            fail_refresh: false,
            refreshes: AtomicUsize::new(0),
        })
    }

    pub fn unconfigured() -> Arc<Self> {
        Arc::new(FakeCredential {
            configured: false,
            fail_refresh: false,
            refreshes: AtomicUsize::new(0),
        })
    }

    pub fn unrefreshable() -> Arc<Self> {
        Arc::new(FakeCredential {
            configured: true,
            fail_refresh: true,
            refreshes: AtomicUsize::new(0),
        })
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for FakeCredential {
    async fn get_token(&self) -> MatchCalResult<AccessToken> {
        Ok(AccessToken::new("token-0", Some(Utc::now() + chrono::Duration::hours(1))))
    }

    async fn refresh(&self) -> MatchCalResult<AccessToken> {
        if self.fail_refresh {
            return Err(MatchCalError::AuthExpired("refresh token revoked".into()));
        }
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(AccessToken::new(
            format!("token-{n}"),
            Some(Utc::now() + chrono::Duration::hours(1)),
        ))
    }

    fn is_valid(&self) -> bool {
        self.configured
    }
}

pub fn test_policy() -> GuardPolicy {
    GuardPolicy {
        rate_limit_backoff: Duration::ZERO,
        ..GuardPolicy::default()
    }
}

pub fn reconciler(
    calendar: Arc<FakeCalendar>,
    credential: Arc<FakeCredential>,
    options: ReconcileOptions,
) -> Reconciler {
    let guard = Arc::new(CredentialGuard::new(credential, test_policy()));
    Reconciler::new(calendar, guard, options)
}
