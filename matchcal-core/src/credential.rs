//! Access tokens and the capability that issues them.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::MatchCalResult;

/// A bearer token with its expiry, if the issuer reported one.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    secret: String,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        AccessToken {
            secret: secret.into(),
            expires_at,
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// True when the token stays valid for more than `margin` from `now`.
    /// Tokens without a known expiry are taken as fresh.
    pub fn is_fresh_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - now > margin,
            None => true,
        }
    }

    pub fn is_fresh(&self, margin: Duration) -> bool {
        self.is_fresh_at(Utc::now(), margin)
    }
}

// Keep the secret out of logs.
impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Issues access tokens for the calendar.
///
/// Implementations fail `refresh` with `AuthExpired` when the credential can
/// no longer be renewed.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// The currently held token, which may already be stale.
    async fn get_token(&self) -> MatchCalResult<AccessToken>;

    /// Obtain a new token from the issuer.
    async fn refresh(&self) -> MatchCalResult<AccessToken>;

    /// Whether a credential is configured at all.
    fn is_valid(&self) -> bool;
}
