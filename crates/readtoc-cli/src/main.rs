use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use readtoc_core::{AppConfig, Command};

mod commands;
mod console;

#[derive(Parser)]
#[command(name = "readtoc")]
#[command(author, version, about = "Reactive table of contents for long-form articles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay scrolls and commands against a page fixture and print the TOC
    Simulate {
        /// Page fixture (JSON)
        #[arg(short, long)]
        page: PathBuf,
        /// Scroll offsets to apply in order, e.g. `0,890,1700`
        #[arg(short, long, value_delimiter = ',')]
        scroll: Vec<f64>,
        /// Commands to run after the scrolls (toggle, prev, next, refresh)
        #[arg(short, long, value_delimiter = ',')]
        command: Vec<Command>,
    },
    /// Run a session on a page fixture and serve commands until Ctrl+C
    Serve {
        /// Page fixture (JSON)
        #[arg(short, long)]
        page: PathBuf,
    },
    /// Send one command to a running session
    Send {
        command: Command,
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
    let config = AppConfig::load()?;

    match cli.command {
        Commands::Simulate {
            page,
            scroll,
            command,
        } => commands::simulate::run(config, &page, scroll, command).await,
        Commands::Serve { page } => commands::serve::run(config, &page).await,
        Commands::Send { command } => commands::send::run(&config, command).await,
    }
}
