//! SectorWatch: one pass over the configured tickers, posting alerts to sector webhooks.
//!
//! Takes no arguments. Reads `Program Data/` and `Ticker Data/` relative to
//! the working directory (see `Program Data/settings.toml` for overrides).
//! The log always goes to `Program Data/program.log`, opened before anything
//! else is read so that configuration errors land in it too.

use anyhow::{Context, Result};
use sectorwatch_core::data::{CircuitBreaker, SeriesStore, YahooProvider};
use sectorwatch_runner::config::{LOG_FILE, PROGRAM_DIR, SETTINGS_FILE};
use sectorwatch_runner::{
    init_logging, load_tickers, Orchestrator, RunContext, RunnerSettings, WebhookNotifier,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

fn main() -> Result<()> {
    launch(Path::new(PROGRAM_DIR))
}

fn launch(program_dir: &Path) -> Result<()> {
    let started = Instant::now();
    init_logging(&program_dir.join(LOG_FILE)).context("initializing logging")?;
    info!("program started");

    match run(program_dir) {
        Ok(()) => {
            info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "program ended successfully. Total runtime: {:.2} seconds",
                started.elapsed().as_secs_f64()
            );
            Ok(())
        }
        Err(e) => {
            let chain = format!("{e:#}");
            error!(error = %chain, "program aborted");
            Err(e)
        }
    }
}

fn run(program_dir: &Path) -> Result<()> {
    let settings =
        RunnerSettings::load(&program_dir.join(SETTINGS_FILE)).context("loading settings")?;
    let tickers = load_tickers(&settings.tickers_path())?;
    info!(tickers = tickers.len(), "tickers loaded");
    let context = RunContext::load(&settings)?;

    let breaker = Arc::new(CircuitBreaker::default_provider());
    let provider = Arc::new(YahooProvider::new(breaker, settings.http_timeout())?);
    let store = Arc::new(SeriesStore::new(&settings.series_dir, provider));
    let notifier = Arc::new(WebhookNotifier::new(settings.http_timeout())?);

    let report = Orchestrator::new(store, notifier, context)
        .with_worker_threads(settings.worker_threads)
        .run(&tickers)?;

    if report.failed > 0 {
        warn!(
            failed = report.failed,
            tickers = report.tickers,
            "{} of {} tickers failed",
            report.failed,
            report.tickers
        );
    }
    Ok(())
}
