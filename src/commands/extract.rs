use std::path::PathBuf;

use anyhow::Result;
use matchcal_core::{EventExtractor, MatchcalConfig};

use crate::utils::{input, tui};

pub async fn run(file: Option<PathBuf>, prompt: Option<PathBuf>) -> Result<()> {
    let config = MatchcalConfig::load()?;
    let text = input::read_text(file.as_deref())?;
    let template = super::prompt_template(&config, prompt.as_deref())?;
    let extractor = super::extractor(&config)?;

    let spinner = tui::create_spinner("Analyzing schedule".to_string());
    let candidates = extractor.extract_events(&text, template.as_deref()).await;
    spinner.finish_and_clear();

    println!("{}", serde_json::to_string_pretty(&candidates?)?);
    Ok(())
}
