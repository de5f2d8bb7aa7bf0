//! CLI command implementations.

use colored::{ColoredString, Colorize};
use draftline_core::{exclude_config_dir, Config, RepositoryState};
use draftline_daemon::{ControlClient, Daemon, Mode, StatusReport};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Write the default config and exclude `.draftline/` from git.
pub fn init(path: &Path) -> Result<()> {
    let config_path = Config::path(path);

    if config_path.exists() {
        println!("{} Already initialized", "✓".green());
    } else {
        Config::default().save(path)?;
        println!("{} Initialized Draftline in {}", "✓".green(), path.display());
    }

    let repo = RepositoryState::discover(path, &Config::load(path)?.draft_branch);
    if repo.git_dir.is_dir() {
        if exclude_config_dir(&repo.git_dir)? {
            println!("  Added {} to git's exclude list", ".draftline/".cyan());
        }
    } else {
        eprintln!(
            "{} {} is not a git repository yet",
            "⚠ Warning:".yellow(),
            path.display()
        );
    }

    println!("  Run {} to start", "draftline run".cyan());
    Ok(())
}

/// Run the daemon in the foreground until Ctrl+C or `draftline stop`.
pub async fn run(path: &Path, interval: Option<u64>, port: Option<u16>) -> Result<()> {
    let mut config = Config::load(path)?;
    if let Some(secs) = interval {
        config.interval_secs = secs;
    }
    if let Some(port) = port {
        config.control_port = port;
    }

    println!("{}", "Starting Draftline...".cyan());
    let daemon = Daemon::start(path, config.clone()).await?;
    let status = daemon.controller().status();

    println!(
        "{} Watching {} on {}",
        "✓".green(),
        path.display(),
        status.branch.cyan()
    );
    println!("  {}", indicator(status.mode));
    println!(
        "  Committing to {} every {}s",
        config.draft_branch.cyan(),
        config.interval().as_secs()
    );
    println!("  Control channel on {}", daemon.control_addr());
    println!("  Press {} to stop", "Ctrl+C".cyan());

    daemon.run().await;
    Ok(())
}

/// Ask the daemon to switch modes.
pub async fn toggle(port: Option<u16>) -> Result<()> {
    let client = client(port)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message("Switching branches...");

    let result = client.toggle().await;
    spinner.finish_and_clear();

    let status = result?;
    println!("{} Now on {}", "✓".green(), status.branch.cyan());
    print_status(&status);
    Ok(())
}

/// Print the daemon's current mode.
pub async fn status(port: Option<u16>) -> Result<()> {
    let status = client(port)?.status().await?;
    print_status(&status);
    Ok(())
}

/// Stop a running daemon.
pub async fn stop(port: Option<u16>) -> Result<()> {
    client(port)?.shutdown().await?;
    println!("{} Daemon stopping", "✓".green());
    Ok(())
}

/// Client for `port`, or the port configured for the current directory.
fn client(port: Option<u16>) -> Result<ControlClient> {
    let port = match port {
        Some(port) => port,
        None => Config::load(&std::env::current_dir()?)?.control_port,
    };
    Ok(ControlClient::localhost(port))
}

fn indicator(mode: Mode) -> ColoredString {
    match mode {
        Mode::Draft => mode.label().green().bold(),
        Mode::Stable => mode.label().red().bold(),
    }
}

fn print_status(status: &StatusReport) {
    println!("{}", indicator(status.mode));
    println!("  {} {}", "Branch:".dimmed(), status.branch);
    println!(
        "  {} {}",
        "Pending changes:".dimmed(),
        if status.dirty { "yes" } else { "no" }
    );
    if status.transitioning {
        println!("  {}", "Switching branches...".yellow());
    }
    if status.restore_pending {
        println!(
            "  {} carried edits were not restored, run {} to retry",
            "⚠".yellow(),
            "draftline toggle".cyan()
        );
    }
    if !status.draft_branch_exists {
        println!("  {}", "Draft branch not created yet".dimmed());
    }
}
