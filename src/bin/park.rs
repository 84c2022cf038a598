//! Command-line entry point: `init`, `daemon`, and `config` subcommands wired
//! over the sync library, plus a global `--debug` flag. Exits 1 on any
//! top-level error, 0 on success.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use park_sync::config::{self, Config};
use park_sync::credentials::StaticCredentialProvider;
use park_sync::daemon;
use park_sync::logging::{init_logging, LogConfig};
use park_sync::orchestrator;
use park_sync::parktable::ParkTable;
use park_sync::remote::client::{ClientConfig, HttpRemoteClient};
use park_sync::remote::RemoteClient;

#[derive(Parser)]
#[command(name = "park", about = "One-way cloud drive sync agent")]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the initial sync. Requires an empty sync root.
    Init,
    /// Run the watcher + change-applier daemon loop.
    Daemon,
    /// Interactively capture sync settings.
    Config,
}

fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig {
        log_level: if cli.debug {
            "debug".to_string()
        } else {
            "info".to_string()
        },
        ..LogConfig::default()
    };
    let _log_guard = match init_logging(log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialize logging: {e:#}");
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start async runtime: {e:#}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(dispatch(cli.command)) {
        tracing::error!(error = %e, "command failed");
        std::process::exit(1);
    }
}

fn build_remote_client() -> Result<Arc<dyn RemoteClient>> {
    let base_url = std::env::var("PARK_REMOTE_URL")
        .context("PARK_REMOTE_URL must be set to the remote API's base URL")?;
    let token = std::env::var("PARK_TOKEN")
        .context("PARK_TOKEN must be set to a bearer token for the remote API")?;
    let credentials = Arc::new(StaticCredentialProvider::new(token));
    let client = HttpRemoteClient::new(ClientConfig::new(base_url), credentials)?;
    Ok(Arc::new(client))
}

async fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Init => run_init().await,
        Command::Daemon => run_daemon().await,
        Command::Config => run_config().await,
    }
}

async fn run_init() -> Result<()> {
    let state_dir = config::config_dir()?;
    let config = Config::load(&state_dir)?;
    let client = build_remote_client()?;
    orchestrator::run(client, &config, &state_dir).await
}

async fn run_daemon() -> Result<()> {
    let state_dir = config::config_dir()?;
    let config = Config::load(&state_dir)?;
    if !config.is_initialized {
        anyhow::bail!("sync root is not initialized yet; run `park init` first");
    }

    let client = build_remote_client()?;
    let table_path = config::park_table_path_in(&state_dir);
    let table = Arc::new(ParkTable::load(config.local_dir.clone(), &table_path)?);

    let cancel = CancellationToken::new();
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel_for_signal.cancel();
    });

    daemon::run(client, config, state_dir, table, cancel).await
}

async fn run_config() -> Result<()> {
    let state_dir = config::config_dir()?;
    let mut config =
        Config::load(&state_dir).unwrap_or(Config::default_for_home().context(
            "could not determine a default sync root; is $HOME set?",
        )?);

    println!("Sync root [{}]:", config.local_dir.display());
    let local_dir = read_line()?;
    if !local_dir.is_empty() {
        config.local_dir = PathBuf::from(local_dir);
    }

    println!("Sync interval in seconds [{}]:", config.sync_interval_secs);
    let interval = read_line()?;
    if !interval.is_empty() {
        config.sync_interval_secs = interval
            .parse()
            .context("sync interval must be a positive integer")?;
    }

    config.persist(&state_dir)?;
    println!(
        "Configuration saved to {}",
        config::config_path_in(&state_dir).display()
    );
    Ok(())
}

fn read_line() -> Result<String> {
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    Ok(line.trim().to_string())
}
