//! Global configuration at ~/.config/matchcal/config.toml

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{MatchCalError, MatchCalResult};
use crate::guard::GuardPolicy;
use crate::matcher::MatchStrictness;
use crate::reconcile::ReconcileOptions;
use crate::time::{DEFAULT_TIME_ZONE, parse_zone};

const ENV_PREFIX: &str = "MATCHCAL";
const GEMINI_KEY_VAR: &str = "GEMINI_API_KEY";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";

fn default_time_zone() -> String {
    DEFAULT_TIME_ZONE.to_string()
}

fn default_duration_minutes() -> i64 {
    crate::candidate::DEFAULT_EVENT_MINUTES
}

fn default_concurrency() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchcalConfig {
    /// Target calendar. Required before anything is reconciled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_id: Option<String>,

    #[serde(default = "default_time_zone")]
    pub time_zone: String,

    #[serde(default = "default_duration_minutes")]
    pub default_duration_minutes: i64,

    #[serde(default)]
    pub match_strictness: MatchStrictness,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub guard: GuardConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub google: GoogleConfig,
}

/// Durations are humantime strings ("60s", "1m 30s").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub min_validity: String,
    pub rate_limit_backoff: String,
    pub refresh_every_deletes: u32,
    pub refresh_every_inserts: u32,
}

impl Default for GuardConfig {
    fn default() -> Self {
        let policy = GuardPolicy::default();
        GuardConfig {
            min_validity: humantime::format_duration(policy.min_validity).to_string(),
            rate_limit_backoff: humantime::format_duration(policy.rate_limit_backoff).to_string(),
            refresh_every_deletes: policy.refresh_every_deletes,
            refresh_every_inserts: policy.refresh_every_inserts,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_file: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            prompt_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    /// Name of the stored OAuth session.
    pub account: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        GoogleConfig {
            account: "default".to_string(),
        }
    }
}

impl MatchcalConfig {
    pub fn config_dir() -> MatchCalResult<PathBuf> {
        Ok(dirs::config_dir()
            .ok_or_else(|| MatchCalError::Config("Could not determine config directory".into()))?
            .join("matchcal"))
    }

    pub fn config_path() -> MatchCalResult<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load the global config, writing a commented default file first if
    /// there is none.
    pub fn load() -> MatchCalResult<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    /// Load from `path` (which may be missing), then `MATCHCAL_*` variables.
    /// `MATCHCAL_GUARD__MIN_VALIDITY` sets `guard.min_validity`.
    pub fn load_from(path: &Path) -> MatchCalResult<Self> {
        let mut config: MatchcalConfig = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| MatchCalError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| MatchCalError::Config(e.to_string()))?;

        if config.analysis.api_key.is_none() {
            config.analysis.api_key = std::env::var(GEMINI_KEY_VAR).ok().filter(|k| !k.is_empty());
        }

        Ok(config)
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> MatchCalResult<()> {
        let contents = format!(
            "\
# matchcal configuration

# Calendar that fixtures are written to (required):
# calendar_id = \"primary\"

# Zone the schedule's wall-clock times are read in:
# time_zone = \"{DEFAULT_TIME_ZONE}\"

# Length of a fixture without an end time, in minutes:
# default_duration_minutes = {minutes}

# \"start_date\" or \"start_and_end_date\":
# match_strictness = \"start_date\"

# Fixtures reconciled in parallel:
# concurrency = 1

# [guard]
# min_validity = \"60s\"
# rate_limit_backoff = \"1s\"
# refresh_every_deletes = 10
# refresh_every_inserts = 3

# [analysis]
# api_key = \"...\"            # or set {GEMINI_KEY_VAR}
# model = \"{DEFAULT_MODEL}\"
# prompt_file = \"~/.config/matchcal/prompt.txt\"

# [google]
# account = \"default\"
",
            minutes = crate::candidate::DEFAULT_EVENT_MINUTES,
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MatchCalError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| MatchCalError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }

    pub fn require_calendar_id(&self) -> MatchCalResult<&str> {
        self.calendar_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| MatchCalError::ConfigurationMissing("calendar_id is not set".into()))
    }

    pub fn zone(&self) -> MatchCalResult<Tz> {
        parse_zone(&self.time_zone)
    }

    pub fn guard_policy(&self) -> MatchCalResult<GuardPolicy> {
        Ok(GuardPolicy {
            min_validity: parse_duration("guard.min_validity", &self.guard.min_validity)?,
            rate_limit_backoff: parse_duration(
                "guard.rate_limit_backoff",
                &self.guard.rate_limit_backoff,
            )?,
            refresh_every_deletes: self.guard.refresh_every_deletes,
            refresh_every_inserts: self.guard.refresh_every_inserts,
        })
    }

    pub fn reconcile_options(&self) -> MatchCalResult<ReconcileOptions> {
        if self.default_duration_minutes <= 0 {
            return Err(MatchCalError::Config(format!(
                "default_duration_minutes must be positive, got {}",
                self.default_duration_minutes
            )));
        }

        let default_duration = chrono::Duration::try_minutes(self.default_duration_minutes)
            .ok_or_else(|| {
                MatchCalError::Config(format!(
                    "default_duration_minutes is out of range: {}",
                    self.default_duration_minutes
                ))
            })?;

        Ok(ReconcileOptions {
            zone: self.zone()?,
            default_duration,
            strictness: self.match_strictness,
            concurrency: self.concurrency.max(1),
        })
    }

    pub fn require_api_key(&self) -> MatchCalResult<&str> {
        self.analysis.api_key.as_deref().ok_or_else(|| {
            MatchCalError::ConfigurationMissing(format!(
                "analysis.api_key is not set (or set {GEMINI_KEY_VAR})"
            ))
        })
    }

    /// The configured prompt template, if any. `~` in the path is expanded.
    pub fn prompt_template(&self) -> MatchCalResult<Option<String>> {
        let Some(path) = &self.analysis.prompt_file else {
            return Ok(None);
        };

        let expanded = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned());
        std::fs::read_to_string(&expanded).map(Some).map_err(|e| {
            MatchCalError::Config(format!("Could not read prompt file {}: {e}", expanded.display()))
        })
    }
}

fn parse_duration(key: &str, value: &str) -> MatchCalResult<Duration> {
    humantime::parse_duration(value.trim())
        .map_err(|e| MatchCalError::Config(format!("Invalid duration for {key} '{value}': {e}")))
}
