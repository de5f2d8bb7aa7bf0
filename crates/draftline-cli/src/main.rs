//! Draftline CLI
//!
//! Starts the daemon and talks to a running one over its control channel.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "draftline")]
#[command(author = "Draftline Contributors")]
#[command(version)]
#[command(about = "Mirror working-tree edits into a draft branch", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config and keep it out of git
    Init {
        /// Repository root (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Run the daemon in the foreground
    Run {
        /// Repository root (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Seconds between commit checks
        #[arg(short, long)]
        interval: Option<u64>,

        /// Control channel port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Switch between the draft and stable branch
    Toggle {
        /// Control channel port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show the current mode
    Status {
        /// Control channel port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Stop a running daemon
    Stop {
        /// Control channel port
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let result = match cli.command {
        Commands::Init { path } => commands::init(&path),
        Commands::Run {
            path,
            interval,
            port,
        } => commands::run(&path, interval, port).await,
        Commands::Toggle { port } => commands::toggle(port).await,
        Commands::Status { port } => commands::status(port).await,
        Commands::Stop { port } => commands::stop(port).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
