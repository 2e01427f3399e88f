mod commands;
mod render;
mod utils;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "matchcal")]
#[command(about = "Turn sports schedule text into calendar events, replacing earlier copies")]
struct Cli {
    /// Print debug logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract fixtures from schedule text and write them to the calendar
    Sync {
        /// Schedule text file (reads stdin when omitted)
        file: Option<PathBuf>,

        /// Prompt template to use instead of the configured one
        #[arg(long)]
        prompt: Option<PathBuf>,

        /// Only show what was extracted
        #[arg(long)]
        dry_run: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write fixtures from a JSON file to the calendar
    Import {
        file: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the fixtures found in schedule text as JSON
    Extract {
        /// Schedule text file (reads stdin when omitted)
        file: Option<PathBuf>,

        /// Prompt template to use instead of the configured one
        #[arg(long)]
        prompt: Option<PathBuf>,
    },
    /// Print the prompt template in effect
    Prompt,
    /// Show where configuration and credentials live
    Config,
}

const LOG_ENV: &str = "MATCHCAL_LOG";
const VERBOSE_FILTER: &str = "warn,matchcal=debug,matchcal_core=debug,matchcal_provider_google=debug";

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Sync {
            file,
            prompt,
            dry_run,
            json,
        } => commands::sync::run(file, prompt, dry_run, json).await,
        Commands::Import { file, json } => commands::import::run(file, json).await,
        Commands::Extract { file, prompt } => commands::extract::run(file, prompt).await,
        Commands::Prompt => commands::prompt::run(),
        Commands::Config => commands::config::run(),
    }
}
