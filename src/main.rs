// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Librarian: keeps a downloads folder tidy.
//!
//! New files go to a holding area while they are recent; older ones are
//! filed into a categorized archive with help from a language model.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use librarian::config::AppConfig;
use librarian::daemon::{self, resolve_library_folder, WatchOptions};
use librarian::dispatch::{DispatchSettings, Dispatcher};
use librarian::oracle::Categorizer;
use librarian::resolver::list_category_folders;
use librarian::sweep::sweep_once;
use librarian::watcher::EventFilter;

/// Librarian CLI - sort downloads into recents and a categorized archive
#[derive(Parser, Debug)]
#[command(name = "librarian")]
#[command(version)]
#[command(about = "Sorts new downloads into Recents and an AI-categorized library", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Folder to watch (overrides config; Recents and AI Library live inside it)
    #[arg(short, long, global = true)]
    path: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch the folder and sort new files as they arrive
    Watch {
        /// Skip the oracle health check on startup
        #[arg(long)]
        skip_health_check: bool,

        /// Sort files already in the folder on startup
        #[arg(long)]
        process_existing: bool,
    },

    /// Retry files left in the folder and archive aged files from Recents, then exit
    Sweep,

    /// Re-categorize files in existing library folders
    Recategorize {
        /// Folders to re-categorize, e.g. "AI Library/Business Reports"
        #[arg(required = true)]
        folders: Vec<String>,
    },

    /// Show oracle and folder status
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    if dotenvy::dotenv().is_ok() {
        info!("Loaded environment from .env");
    }

    // Load configuration
    let mut config = AppConfig::load(&cli.config)
        .with_context(|| format!("loading {:?}", cli.config))?;
    if let Some(path) = &cli.path {
        info!("Using custom folder path: {:?}", path);
        config = config.with_watch_root(path);
    }

    match cli.command {
        Some(Commands::Watch { skip_health_check, process_existing }) => {
            run_watch(config, skip_health_check, process_existing).await
        }
        Some(Commands::Sweep) => run_sweep(config).await,
        Some(Commands::Recategorize { folders }) => run_recategorize(config, folders).await,
        Some(Commands::Status) => run_status(config).await,
        Some(Commands::Config { action }) => run_config_command(config, action, &cli.config),
        None => run_watch(config, false, false).await,
    }
}

/// Validate the config, create the folder layout and build the dispatcher.
fn build_dispatcher(config: &AppConfig) -> anyhow::Result<Arc<Dispatcher>> {
    config.validate().context("invalid configuration")?;
    config.ensure_layout().context("preparing folders")?;
    let categorizer = Categorizer::from_config(config).context("configuring the oracle")?;
    Ok(Arc::new(Dispatcher::new(DispatchSettings::from_config(config), categorizer)))
}

/// Run the watch mode (main loop)
async fn run_watch(
    config: AppConfig,
    skip_health_check: bool,
    process_existing: bool,
) -> anyhow::Result<()> {
    let dispatcher = build_dispatcher(&config)?;
    info!("Recents: {:?}", config.recents_dir());
    info!("Library: {:?}", config.library_dir());

    if skip_health_check {
        warn!("Skipping oracle health check");
    } else {
        let backend = dispatcher.categorizer().backend();
        match backend.health_check().await {
            Ok(()) => info!("Oracle ({}) is reachable", backend.name()),
            Err(e) => warn!("{}; aged files are retried on each sweep until it is reachable", e),
        }
    }

    // Setup graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = shutdown_tx.send(true);
    });

    info!("Press Ctrl+C to stop.");
    daemon::run(&config, dispatcher, WatchOptions { process_existing }, shutdown_rx).await?;
    info!("Librarian stopped.");
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}

async fn run_sweep(config: AppConfig) -> anyhow::Result<()> {
    let dispatcher = build_dispatcher(&config)?;
    let filter = EventFilter::new(&config.filters.ignore_patterns)?;
    let report = sweep_once(&dispatcher, &filter).await.context("sweeping")?;
    println!("Sweep: {}", report.summary());
    Ok(())
}

async fn run_recategorize(config: AppConfig, folders: Vec<String>) -> anyhow::Result<()> {
    let dispatcher = build_dispatcher(&config)?;
    let folders: Vec<PathBuf> = folders
        .iter()
        .map(|f| resolve_library_folder(&config, f))
        .collect();

    info!("Starting re-categorization of {} folder(s)...", folders.len());
    let report = dispatcher.recategorize(&folders).await;
    println!("Re-categorization completed: {}", report.summary());
    Ok(())
}

/// Run status check
async fn run_status(config: AppConfig) -> anyhow::Result<()> {
    println!("Librarian v{} Status", env!("CARGO_PKG_VERSION"));
    println!("======================");

    match Categorizer::from_config(&config) {
        Ok(categorizer) => {
            let backend = categorizer.backend();
            match backend.health_check().await {
                Ok(()) => println!("Oracle ({}): Running", backend.name()),
                Err(e) => println!("Oracle ({}): Error - {}", backend.name(), e),
            }
        }
        Err(e) => println!("Oracle: Error - {}", e),
    }
    println!("  URL: {}", config.ai_engine.base_url());
    println!("  Model: {}", config.ai_engine.model_name());

    println!("\nFolders:");
    println!("  Watching: {}", config.watch_root().display());
    println!("  Recents: {}", config.recents_dir().display());
    let library = config.library_dir();
    match list_category_folders(&library).await {
        Ok(folders) => println!("  Library: {} ({} categories)", library.display(), folders.len()),
        Err(e) => println!("  Library: {} (unreadable: {})", library.display(), e),
    }

    println!("\nTiming:");
    println!("  Recent window: {}h", config.timing.recent_window_hours);
    println!("  Batch: {} files / {}ms", config.timing.batch_max, config.timing.batch_debounce_ms);
    println!("  Sweep every: {}s", config.timing.sweep_interval_secs);

    Ok(())
}

/// Run config commands
fn run_config_command(
    config: AppConfig,
    action: ConfigCommands,
    config_path: &Path,
) -> anyhow::Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Watch root: {}", config.watch_root().display());
            println!("  Provider: {:?}", config.ai_engine.provider);
            println!("  Excluded: {}", config.filters.excluded_extensions.join(", "));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["librarian"]).unwrap();
        assert!(!cli.verbose);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_watch_command() {
        let cli = Cli::try_parse_from([
            "librarian", "watch", "--process-existing", "--path", "/tmp/dl"
        ]).unwrap();

        assert_eq!(cli.path, Some(PathBuf::from("/tmp/dl")));
        match cli.command {
            Some(Commands::Watch { process_existing, skip_health_check }) => {
                assert!(process_existing);
                assert!(!skip_health_check);
            }
            _ => panic!("Expected Watch command"),
        }
    }

    #[test]
    fn test_cli_recategorize_command() {
        let cli = Cli::try_parse_from([
            "librarian", "recategorize", "AI Library/Screenshots", "Misc"
        ]).unwrap();

        match cli.command {
            Some(Commands::Recategorize { folders }) => {
                assert_eq!(folders, vec!["AI Library/Screenshots", "Misc"]);
            }
            _ => panic!("Expected Recategorize command"),
        }
    }

    #[test]
    fn test_cli_recategorize_requires_folders() {
        assert!(Cli::try_parse_from(["librarian", "recategorize"]).is_err());
    }
}
