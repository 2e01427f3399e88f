//! The stored Google OAuth session, handed to the reconciler as its
//! credential provider.
//!
//! Sessions live at ~/.config/matchcal/providers/google/session/<account>.toml.
//! Obtaining the first token pair is left to the OAuth consent flow; this
//! module only reads the pair and keeps the access token refreshed.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use matchcal_core::{AccessToken, CredentialProvider, MatchCalError, MatchCalResult};

use crate::app_config::{self, Credentials, base_dir};

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionData {
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl SessionData {
    pub fn from_tokens(access_token: String, refresh_token: String, expires_in: i64) -> Self {
        SessionData {
            access_token,
            refresh_token,
            expires_at: Utc::now() + Duration::seconds(expires_in),
        }
    }

    fn token(&self) -> AccessToken {
        AccessToken::new(self.access_token.clone(), Some(self.expires_at))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).with_context(|| {
            format!("Failed to read Google OAuth session from {}", path.display())
        })?;

        toml::from_str(&contents).with_context(|| {
            format!("Failed to parse Google OAuth session from {}", path.display())
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize session")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write session to {}", path.display()))?;

        // Set to owner-only (0600) since file contains OAuth tokens:
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
        }

        Ok(())
    }
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: i64,
    /// Google usually omits this on refresh.
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct OAuthError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

pub struct GoogleSession {
    path: PathBuf,
    credentials: Option<Credentials>,
    data: Mutex<Option<SessionData>>,
    http: reqwest::Client,
    token_url: String,
}

impl GoogleSession {
    pub fn path_for_account(account: &str) -> Result<PathBuf> {
        let account_slug = account.replace(['/', '\\', ':'], "_");

        Ok(base_dir()?
            .join("session")
            .join(format!("{}.toml", account_slug)))
    }

    /// Open the session for `account`. Missing client credentials or a
    /// missing session file leave the provider unconfigured rather than
    /// failing here.
    pub fn open(account: &str) -> Result<Self> {
        let credentials = match app_config::load() {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                debug!(error = %e, "No Google client credentials");
                None
            }
        };

        Self::from_parts(Self::path_for_account(account)?, credentials)
    }

    pub fn from_parts(path: PathBuf, credentials: Option<Credentials>) -> Result<Self> {
        let data = if path.exists() {
            Some(SessionData::load(&path)?)
        } else {
            debug!(path = %path.display(), "No Google session file");
            None
        };

        Ok(GoogleSession {
            path,
            credentials,
            data: Mutex::new(data),
            http: reqwest::Client::new(),
            token_url: TOKEN_URL.to_string(),
        })
    }

    /// Point token refreshes somewhere other than Google's endpoint.
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    fn current(&self) -> Option<SessionData> {
        self.data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl CredentialProvider for GoogleSession {
    async fn get_token(&self) -> MatchCalResult<AccessToken> {
        self.current().map(|data| data.token()).ok_or_else(|| {
            MatchCalError::ConfigurationMissing(format!(
                "no Google session at {}",
                self.path.display()
            ))
        })
    }

    async fn refresh(&self) -> MatchCalResult<AccessToken> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            MatchCalError::ConfigurationMissing("Google client credentials are not set".into())
        })?;
        let current = self.current().ok_or_else(|| {
            MatchCalError::AuthExpired(format!("no Google session at {}", self.path.display()))
        })?;

        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("refresh_token", current.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| MatchCalError::Transport(format!("token refresh request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = match serde_json::from_str::<OAuthError>(&body) {
                Ok(err) => err.error_description.unwrap_or(err.error),
                Err(_) => body,
            };
            return Err(MatchCalError::AuthExpired(format!(
                "token refresh rejected ({status}): {reason}"
            )));
        }

        let refreshed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| MatchCalError::AuthExpired(format!("unreadable token response: {e}")))?;

        let data = SessionData::from_tokens(
            refreshed.access_token,
            refreshed.refresh_token.unwrap_or(current.refresh_token),
            refreshed.expires_in,
        );

        // A token we could not persist is still good for this run.
        if let Err(e) = data.save(&self.path) {
            warn!(error = %e, "Could not save refreshed Google session");
        }

        let token = data.token();
        *self.data.lock().unwrap_or_else(PoisonError::into_inner) = Some(data);
        debug!(expires_at = ?token.expires_at(), "Refreshed Google access token");

        Ok(token)
    }

    fn is_valid(&self) -> bool {
        self.credentials.is_some() && self.current().is_some()
    }
}
