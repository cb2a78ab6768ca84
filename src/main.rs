//! leak-tracker binary entrypoint.
//! Parses the CLI, initializes tracing and metrics, opens the store and hands
//! over to the scheduler.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use leak_tracker::config::app::DEFAULT_CONFIG_PATH;
use leak_tracker::config::sources::DEFAULT_SOURCES_PATH;
use leak_tracker::{ConfigLoader, HttpFeedFetcher, LeakStore, RunMode, SystemClock, Tracker};

#[derive(Debug, Parser)]
#[command(name = "leak-tracker", version, about = "Forum feed tracker with chat notifications and reports")]
struct Cli {
    /// Run a single pass (plus report checks) and exit.
    #[arg(long)]
    once: bool,

    /// Collect silently and write the daily report; no pushes.
    #[arg(long = "daily-report", conflicts_with = "once")]
    daily_report: bool,

    /// Tracker config (TOML).
    #[arg(long, env = "TRACKER_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Source list (TOML `[[source]]` or JSON array).
    #[arg(long, env = "TRACKER_SOURCES", default_value = DEFAULT_SOURCES_PATH)]
    sources: PathBuf,
}

impl Cli {
    fn mode(&self) -> RunMode {
        if self.daily_report {
            RunMode::ReportOnly
        } else if self.once {
            RunMode::Once
        } else {
            RunMode::Continuous
        }
    }
}

/// `RUST_LOG` filter (default `info`); `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    let loader = ConfigLoader::new(&cli.config, &cli.sources);
    // Fail fast on unreadable config or sources.
    let initial = loader.load().context("loading configuration")?;

    leak_tracker::metrics::install_exporter(initial.app.metrics.listen.as_deref())?;

    let store = LeakStore::connect(&initial.app.storage.database_url)
        .await
        .with_context(|| format!("opening store {}", initial.app.storage.database_url))?;
    let fetcher = HttpFeedFetcher::new(&initial.app.http)?;

    let mut tracker = Tracker::new(loader, store, Arc::new(fetcher), Arc::new(SystemClock));
    tracker.run(cli.mode()).await
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => {
            tracing::info!("tracker finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = ?e, "tracker failed");
            ExitCode::FAILURE
        }
    }
}
