pub mod config;
pub mod extract;
pub mod import;
pub mod prompt;
pub mod sync;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use matchcal_core::{CredentialGuard, EventCandidate, MatchCalError, MatchcalConfig, Reconciler};
use matchcal_provider_google::{GeminiExtractor, GoogleCalendar, GoogleSession};
use tracing::debug;

use crate::render::Render;
use crate::utils::tui;

/// Everything needed to write to the configured calendar. Fails before any
/// network call when the calendar id or the Google session is missing.
pub fn reconciler(config: &MatchcalConfig) -> Result<Reconciler> {
    let calendar_id = config.require_calendar_id()?;
    let options = config.reconcile_options()?;
    let policy = config.guard_policy()?;

    debug!(calendar_id, account = %config.google.account, "Opening Google calendar");
    let session = GoogleSession::open(&config.google.account)?;
    let guard = Arc::new(CredentialGuard::new(Arc::new(session), policy));
    if !guard.is_configured() {
        return Err(MatchCalError::ConfigurationMissing(format!(
            "no usable Google session for account '{}'",
            config.google.account
        ))
        .into());
    }
    let transport = Arc::new(GoogleCalendar::new(calendar_id)?);

    Ok(Reconciler::new(transport, guard, options))
}

pub fn extractor(config: &MatchcalConfig) -> Result<GeminiExtractor> {
    let api_key = config.require_api_key()?;
    Ok(GeminiExtractor::new(api_key, &config.analysis.model))
}

/// The `--prompt` file if given, else the configured prompt file, else none.
pub fn prompt_template(config: &MatchcalConfig, prompt: Option<&Path>) -> Result<Option<String>> {
    match prompt {
        Some(path) => std::fs::read_to_string(path)
            .map(Some)
            .with_context(|| format!("Failed to read prompt template {}", path.display())),
        None => Ok(config.prompt_template()?),
    }
}

pub async fn reconcile(reconciler: Reconciler, candidates: Vec<EventCandidate>, json: bool) -> Result<()> {
    let spinner = tui::create_spinner(format!("Reconciling {} events", candidates.len()));
    let result = reconciler.reconcile(candidates).await;
    spinner.finish_and_clear();
    debug!(state = ?reconciler.state(), "Batch finished");

    let result = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.render());
    }

    Ok(())
}
