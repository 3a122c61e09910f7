//! Tilecraft CLI
//!
//! Validate tile configurations and replay interaction traces.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tilecraft_core::{CardConfig, HassSnapshot, SimpleTemplates};
use tilecraft_widgets::Card;

mod replay;

#[derive(Parser)]
#[command(name = "tilecraft")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Tilecraft dashboard tile tooling", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize and validate a card configuration, printing the result
    Validate {
        /// Card configuration (JSON)
        card: PathBuf,
    },

    /// Replay an interaction trace and print every host call as a JSON line
    Replay {
        /// Card configuration (JSON)
        card: PathBuf,

        /// Initial entity states (JSON object keyed by entity id)
        #[arg(short, long)]
        states: Option<PathBuf>,

        /// Timestamped input events (JSON array)
        #[arg(short, long)]
        trace: PathBuf,

        /// Print the rendered tile views after the last step
        #[arg(long)]
        views: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Validate { card } => cmd_validate(&card),
        Commands::Replay {
            card,
            states,
            trace,
            views,
        } => cmd_replay(&card, states.as_deref(), &trace, views),
    }
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn load_card(path: &Path) -> Result<CardConfig> {
    CardConfig::from_value(read_json(path)?)
        .with_context(|| format!("Invalid card configuration in {}", path.display()))
}

fn cmd_validate(path: &Path) -> Result<()> {
    let config = load_card(path)?;
    // Building the tiles also compiles input patterns
    let card = Card::from_config(config.clone(), Arc::new(SimpleTemplates::new()))
        .with_context(|| format!("Invalid card configuration in {}", path.display()))?;
    info!("{} is valid ({} tiles)", path.display(), card.tiles().len());

    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_replay(card: &Path, states: Option<&Path>, trace: &Path, views: bool) -> Result<()> {
    let config = load_card(card)?;
    let hass: HassSnapshot = match states {
        Some(path) => serde_json::from_value(read_json(path)?)
            .with_context(|| format!("Invalid entity states in {}", path.display()))?,
        None => HassSnapshot::new(),
    };
    let steps: Vec<replay::TraceStep> = serde_json::from_value(read_json(trace)?)
        .with_context(|| format!("Invalid trace in {}", trace.display()))?;

    let mut replay = replay::Replay::new(config, hass)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    replay.run(&steps, &mut out)?;
    if views {
        replay.write_views(&mut out)?;
    }
    Ok(())
}
