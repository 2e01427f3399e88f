use anyhow::Result;
use matchcal_core::MatchcalConfig;
use matchcal_provider_google::GoogleSession;
use matchcal_provider_google::app_config;
use owo_colors::OwoColorize;

pub fn run() -> Result<()> {
    // Loading writes the commented default file on first use.
    let config = MatchcalConfig::load()?;

    let credentials = app_config::credentials_path()?;
    let session = GoogleSession::path_for_account(&config.google.account)?;

    println!("{} {}", "config:".dimmed(), MatchcalConfig::config_path()?.display());
    println!("{} {}", "google credentials:".dimmed(), render_path(&credentials));
    println!("{} {}", "google session:".dimmed(), render_path(&session));

    match config.calendar_id.as_deref() {
        Some(id) => println!("{} {}", "calendar:".dimmed(), id),
        None => println!("{} {}", "calendar:".dimmed(), "not set".yellow()),
    }
    println!("{} {}", "time zone:".dimmed(), config.time_zone);

    Ok(())
}

fn render_path(path: &std::path::Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        format!("{} {}", path.display(), "(missing)".yellow())
    }
}
