use std::path::PathBuf;

use anyhow::{Context, Result};
use matchcal_core::MatchcalConfig;
use matchcal_core::extract::parse_analysis_output;

pub async fn run(file: PathBuf, json: bool) -> Result<()> {
    let config = MatchcalConfig::load()?;
    let reconciler = super::reconciler(&config)?;

    let contents = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let candidates = parse_analysis_output(&contents)
        .with_context(|| format!("No events in {}", file.display()))?;

    super::reconcile(reconciler, candidates, json).await
}
