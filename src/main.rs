//! crawl-engine main entry point
//!
//! This is the command-line interface for running and inspecting crawl
//! sessions.

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use crawl_engine::config::{config_fingerprint, load_config, validate, Config};
use crawl_engine::crawler::Coordinator;
use crawl_engine::storage::{open_store, ResultStore};
use crawl_engine::SessionId;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// crawl-engine: a polite, session-based web crawler
///
/// Crawls from a root URL within the configured depth, page budget and
/// scope, recording every fetched page in a SQLite database.
#[derive(Parser, Debug)]
#[command(name = "crawl-engine")]
#[command(version)]
#[command(about = "A polite, session-based web crawler", long_about = None)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["url", "status", "results", "sessions", "dry_run"])
))]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Crawl from this root URL and print the session and its results
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Print the stored summary of a session
    #[arg(long, value_name = "ID")]
    status: Option<SessionId>,

    /// Print the stored results of a session
    #[arg(long, value_name = "ID")]
    results: Option<SessionId>,

    /// List every stored session
    #[arg(long)]
    sessions: bool,

    /// Validate the configuration and print it without crawling
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = load(cli.config.as_deref())?;

    if cli.dry_run {
        handle_dry_run(&config)
    } else if let Some(id) = cli.status {
        let store = open_store(Path::new(&config.output.database_path))?;
        print_json(&store.status(id)?)
    } else if let Some(id) = cli.results {
        let store = open_store(Path::new(&config.output.database_path))?;
        print_json(&store.get(id)?)
    } else if cli.sessions {
        let store = open_store(Path::new(&config.output.database_path))?;
        print_json(&store.list_sessions()?)
    } else if let Some(url) = cli.url {
        handle_crawl(config, &url).await
    } else {
        anyhow::bail!("nothing to do: pass --url, --status, --results, --sessions or --dry-run")
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("crawl_engine=info,warn"),
            1 => EnvFilter::new("crawl_engine=debug,info"),
            2 => EnvFilter::new("crawl_engine=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the configuration file, or the defaults when none is given
fn load(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))
        }
        None => {
            let config = Config::default();
            validate(&config).context("default configuration is invalid")?;
            Ok(config)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Handles the --dry-run mode: prints the effective configuration
fn handle_dry_run(config: &Config) -> Result<()> {
    let hash = config_fingerprint(config)?;
    println!("{}", toml::to_string_pretty(config)?);
    eprintln!("Configuration is valid (hash: {})", hash);
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, url: &str) -> Result<()> {
    let store: Arc<dyn ResultStore> = Arc::new(
        open_store(Path::new(&config.output.database_path)).with_context(|| {
            format!("failed to open database {}", config.output.database_path)
        })?,
    );
    let coordinator = Arc::new(Coordinator::new(config, store)?);
    let id = coordinator.start(url).await?;

    let interrupt = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, stopping session {}", id);
                if let Err(e) = coordinator.stop(id) {
                    tracing::error!("Failed to stop session: {}", e);
                }
            }
        })
    };

    let session = coordinator.wait(id).await?;
    interrupt.abort();

    let results = coordinator.results(id)?;
    print_json(&json!({ "session": session, "results": results }))
}
