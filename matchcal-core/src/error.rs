//! Error types for matchcal.

use thiserror::Error;

/// Errors that can occur while extracting and reconciling events.
#[derive(Error, Debug)]
pub enum MatchCalError {
    /// A required identifier or credential is absent. The batch never starts.
    #[error("Missing configuration: {0}")]
    ConfigurationMissing(String),

    /// Configuration is present but unusable (unknown time zone, bad duration...).
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed timestamp '{value}': {reason}")]
    MalformedTimestamp { value: String, reason: String },

    #[error("Invalid event: {0}")]
    InvalidCandidate(String),

    /// The one-time listing of existing events failed.
    #[error("Failed to fetch existing events: {0}")]
    Fetch(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Authorization expired: {0}")]
    AuthExpired(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl MatchCalError {
    pub fn malformed_timestamp(value: &str, reason: impl Into<String>) -> Self {
        MatchCalError::MalformedTimestamp {
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, MatchCalError::RateLimitExceeded(_))
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, MatchCalError::AuthExpired(_))
    }
}

impl From<serde_json::Error> for MatchCalError {
    fn from(e: serde_json::Error) -> Self {
        MatchCalError::Serialization(e.to_string())
    }
}

/// Result type alias for matchcal operations.
pub type MatchCalResult<T> = Result<T, MatchCalError>;
