use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod core;
mod poller;
mod providers;

use crate::core::settings::Settings;

#[derive(Parser)]
#[command(name = "recipe-poller")]
#[command(author, version, about = "Wait for AI-generated recipe images to become available")]
struct Cli {
    /// Path to config file (default: $XDG_CONFIG_HOME/recipe-poller/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll recipes until their images are ready or the poll times out
    Watch {
        /// Recipe IDs to watch
        #[arg(required = true)]
        ids: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch a recipe once and show its image state
    Get {
        /// Recipe ID
        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(debug: bool, json: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

fn load_settings(path: Option<&PathBuf>) -> anyhow::Result<Settings> {
    let settings = match path {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    settings.validate()?;
    Ok(settings)
}

fn log_settings(settings: &Settings) {
    tracing::debug!(
        base_url = %settings.api.base_url,
        authenticated = settings.api.token.is_some(),
        polling = ?settings.polling,
        "Settings loaded"
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Watch { ids, json } => {
            let settings = load_settings(cli.config.as_ref())?;
            init_logging(settings.debug, cli.log_json);
            log_settings(&settings);
            cli::watch::run(&settings, ids, json).await
        }
        Commands::Get { id, json } => {
            let settings = load_settings(cli.config.as_ref())?;
            init_logging(settings.debug, cli.log_json);
            log_settings(&settings);
            cli::get::run(&settings, id, json).await
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
    }
}
