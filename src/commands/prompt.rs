use anyhow::Result;
use matchcal_core::MatchcalConfig;
use matchcal_core::extract::DEFAULT_PROMPT;

pub fn run() -> Result<()> {
    let config = MatchcalConfig::load()?;
    let template = config.prompt_template()?;

    print!("{}", template.as_deref().unwrap_or(DEFAULT_PROMPT));
    Ok(())
}
