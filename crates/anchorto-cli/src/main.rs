use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use anchorto_core::AnchorConfig;

mod commands;

#[derive(Parser)]
#[command(name = "anchorto")]
#[command(author, version, about = "Smooth scroll-to-section engine, driven against a headless page")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ~/.config/anchorto/config.toml)
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scroll a simulated page to one of its sections
    Simulate(commands::simulate::SimulateArgs),
    /// Print the easing curve of one animation
    Curve {
        /// Pixels to travel
        #[arg(short = 'd', long, default_value_t = 500.0)]
        distance: f64,
        /// Starting scroll offset
        #[arg(long, default_value_t = 0.0)]
        start: f64,
        /// Animation duration in milliseconds (defaults to the configured speed)
        #[arg(long)]
        duration: Option<u64>,
        /// Sampling step in milliseconds
        #[arg(long, default_value_t = 100)]
        step: u64,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the effective configuration
    Config {
        /// Write the configuration file if it does not exist yet
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => AnchorConfig::load_from(path)?,
        None => AnchorConfig::load()?,
    };

    match cli.command {
        Commands::Simulate(args) => commands::simulate::run(config, args).await,
        Commands::Curve {
            distance,
            start,
            duration,
            step,
            json,
        } => {
            let duration = duration.unwrap_or(config.scroll.speed_ms);
            commands::curve::run(start, distance, duration, step, json)
        }
        Commands::Config { init } => commands::config::run(&config, cli.config.as_deref(), init),
    }
}
