/*
feedrelay - main.rs
Loads the configuration, connects to the chat platform and runs the polling loop
until Ctrl-C.
*/

use anyhow::{Context, Result};
use clap::Parser;
use common::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use feedrelay::chat::DiscordClient;
use feedrelay::ingestion::HttpFeedFetcher;
use feedrelay::scheduler::Scheduler;

#[derive(Parser, Debug)]
#[command(name = "feedrelay", about = "Mirror syndication feeds into per-topic chat channels")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Resolve channels, run a single dispatch cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // Resolve config paths
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    if override_path.is_none() && !default_path.exists() {
        return Err(anyhow::anyhow!(
            "no configuration found (looked for config.toml and config.default.toml)"
        ));
    }

    let config = Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await
    .context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;
    info!(default = ?default_path, override = ?override_path, "configuration loaded");

    let token = config.bot_token()?;
    let chat = Arc::new(
        DiscordClient::from_config(&config.discord, token)
            .context("failed to build Discord HTTP client")?,
    );
    let fetcher = Arc::new(
        HttpFeedFetcher::new(&config.fetch).context("failed to build feed HTTP client")?,
    );

    let scheduler = Scheduler::from_config(&config, fetcher, chat)?;

    if args.once {
        let report = scheduler.run_once().await?;
        info!(?report, "single cycle finished");
        return Ok(());
    }

    let shutdown_notify = Arc::new(Notify::new());
    let mut worker = tokio::spawn(scheduler.run(shutdown_notify.clone()));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received, notifying scheduler to shutdown");
            shutdown_notify.notify_one();
            match tokio::time::timeout(Duration::from_secs(20), &mut worker).await {
                Ok(join_res) => join_res.context("scheduler task panicked")??,
                Err(_) => info!("Timed out waiting for scheduler to exit; continuing shutdown"),
            }
        }
        res = &mut worker => {
            res.context("scheduler task panicked")??;
        }
    }

    info!("Shutdown complete");
    Ok(())
}
