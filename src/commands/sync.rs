use std::path::PathBuf;

use anyhow::Result;
use matchcal_core::{EventExtractor, MatchcalConfig};
use owo_colors::OwoColorize;

use crate::render::Render;
use crate::utils::{input, tui};

pub async fn run(file: Option<PathBuf>, prompt: Option<PathBuf>, dry_run: bool, json: bool) -> Result<()> {
    let config = MatchcalConfig::load()?;

    // Check the calendar side before spending an analysis call.
    let reconciler = if dry_run {
        None
    } else {
        Some(super::reconciler(&config)?)
    };

    let text = input::read_text(file.as_deref())?;
    let template = super::prompt_template(&config, prompt.as_deref())?;
    let extractor = super::extractor(&config)?;

    let spinner = tui::create_spinner("Analyzing schedule".to_string());
    let candidates = extractor.extract_events(&text, template.as_deref()).await;
    spinner.finish_and_clear();
    let candidates = candidates?;

    let Some(reconciler) = reconciler else {
        for candidate in &candidates {
            println!("   {}", candidate.render());
        }
        println!("\n{} events found {}", candidates.len(), "(dry run)".dimmed());
        return Ok(());
    };

    if candidates.is_empty() {
        println!("{}", "No events found in the schedule text".dimmed());
        return Ok(());
    }

    super::reconcile(reconciler, candidates, json).await
}
