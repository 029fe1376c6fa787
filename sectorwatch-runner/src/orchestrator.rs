//! Run orchestrator: one pass over the ticker list.
//!
//! Two fan-out phases on a private rayon pool:
//! 1. construct a [`Symbol`] per ticker (first fetch happens here)
//! 2. per symbol: refresh → capture snapshot → evaluate → dispatch alerts
//!
//! Every per-symbol error is caught at the task boundary, logged, and
//! counted. Siblings never see it.

use crate::config::{ConfigError, RoleIds, RunnerSettings, SectorHooks};
use crate::notifier::{Notifier, WebhookPayload};
use chrono::NaiveDate;
use rayon::prelude::*;
use sectorwatch_core::data::SeriesStore;
use sectorwatch_core::{evaluate, AlertCondition, IndicatorSnapshot, Symbol, SymbolError};
use std::iter::Sum;
use std::ops::Add;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("orchestrator has already run (state: {0:?})")]
    AlreadyRun(RunState),

    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Done,
}

/// Read-only maps shared by every task.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub role_ids: RoleIds,
    pub hooks: SectorHooks,
    pub fallback_webhook: Option<String>,
}

impl RunContext {
    /// Load roles and hooks from the locations in `settings`.
    pub fn load(settings: &RunnerSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            role_ids: RoleIds::load(&settings.roles_path())?,
            hooks: SectorHooks::load(&settings.hooks_path())?,
            fallback_webhook: settings.fallback_webhook.clone(),
        })
    }

    /// Webhook for a symbol's alerts.
    ///
    /// Symbols without a sector category never consult the hook table.
    pub fn hook_for(&self, symbol: &Symbol) -> Option<&str> {
        symbol
            .sector_category()
            .and_then(|category| self.hooks.get(category))
            .or(self.fallback_webhook.as_deref())
    }
}

/// Summary of one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub tickers: usize,
    /// Symbols constructed successfully.
    pub constructed: usize,
    /// Symbols that failed construction or evaluation.
    pub failed: usize,
    pub alerts_sent: usize,
    /// Alerts with no webhook to go to.
    pub alerts_undeliverable: usize,
    /// Alerts whose webhook POST failed.
    pub alerts_failed: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    failed: usize,
    sent: usize,
    undeliverable: usize,
    post_failed: usize,
}

impl Add for Tally {
    type Output = Tally;

    fn add(self, other: Tally) -> Tally {
        Tally {
            failed: self.failed + other.failed,
            sent: self.sent + other.sent,
            undeliverable: self.undeliverable + other.undeliverable,
            post_failed: self.post_failed + other.post_failed,
        }
    }
}

impl Sum for Tally {
    fn sum<I: Iterator<Item = Tally>>(iter: I) -> Tally {
        iter.fold(Tally::default(), Add::add)
    }
}

enum Delivery {
    Sent,
    Undeliverable,
    Failed,
}

pub struct Orchestrator {
    store: Arc<SeriesStore>,
    notifier: Arc<dyn Notifier>,
    context: RunContext,
    worker_threads: Option<usize>,
    today: Option<NaiveDate>,
    state: RunState,
}

impl Orchestrator {
    pub fn new(store: Arc<SeriesStore>, notifier: Arc<dyn Notifier>, context: RunContext) -> Self {
        Self {
            store,
            notifier,
            context,
            worker_threads: None,
            today: None,
            state: RunState::Idle,
        }
    }

    /// Pool size; `None` uses the available parallelism.
    pub fn with_worker_threads(mut self, worker_threads: Option<usize>) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    /// Pin the calendar date used for refresh windows (defaults to the local date).
    pub fn as_of(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Process every ticker once. Only valid from `Idle`.
    pub fn run(&mut self, tickers: &[String]) -> Result<RunReport, RunError> {
        if self.state != RunState::Idle {
            return Err(RunError::AlreadyRun(self.state));
        }

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(n) = self.worker_threads {
            builder = builder.num_threads(n);
        }
        let pool = builder.build()?;

        self.state = RunState::Running;
        let started = Instant::now();
        let today = self
            .today
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        info!(
            tickers = tickers.len(),
            workers = pool.current_num_threads(),
            "starting processing of {} tickers",
            tickers.len()
        );

        let this = &*self;
        let (constructed, tally) = pool.install(|| {
            let symbols: Vec<Symbol> = tickers
                .par_iter()
                .filter_map(|ticker| this.construct(ticker, today))
                .collect();
            let constructed = symbols.len();

            let tally: Tally = symbols
                .into_par_iter()
                .map(|symbol| this.process(symbol, today))
                .sum();
            (constructed, tally)
        });

        let report = RunReport {
            tickers: tickers.len(),
            constructed,
            failed: (tickers.len() - constructed) + tally.failed,
            alerts_sent: tally.sent,
            alerts_undeliverable: tally.undeliverable,
            alerts_failed: tally.post_failed,
            elapsed: started.elapsed(),
        };
        self.state = RunState::Done;

        info!(
            tickers = report.tickers,
            constructed = report.constructed,
            failed = report.failed,
            alerts_sent = report.alerts_sent,
            alerts_undeliverable = report.alerts_undeliverable,
            alerts_failed = report.alerts_failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "finished processing all tickers"
        );
        Ok(report)
    }

    fn construct(&self, ticker: &str, today: NaiveDate) -> Option<Symbol> {
        match Symbol::new_as_of(ticker, Arc::clone(&self.store), today) {
            Ok(symbol) => Some(symbol),
            Err(e) => {
                error!(symbol = ticker, error = %e, "failed to construct symbol, skipping");
                None
            }
        }
    }

    fn process(&self, symbol: Symbol, today: NaiveDate) -> Tally {
        let ticker = symbol.ticker().to_string();
        match self.evaluate_symbol(symbol, today) {
            Ok(tally) => tally,
            Err(e) => {
                error!(symbol = %ticker, error = %e, "an error occurred while processing symbol");
                Tally {
                    failed: 1,
                    ..Tally::default()
                }
            }
        }
    }

    fn evaluate_symbol(&self, mut symbol: Symbol, today: NaiveDate) -> Result<Tally, SymbolError> {
        symbol.refresh_as_of(today)?;
        let snapshot = IndicatorSnapshot::capture(&symbol)?;

        let mut tally = Tally::default();
        for alert in evaluate(&snapshot) {
            match self.dispatch(&symbol, &alert) {
                Delivery::Sent => tally.sent += 1,
                Delivery::Undeliverable => tally.undeliverable += 1,
                Delivery::Failed => tally.post_failed += 1,
            }
        }
        Ok(tally)
    }

    fn dispatch(&self, symbol: &Symbol, alert: &AlertCondition) -> Delivery {
        let message = alert.message(symbol.ticker());

        let Some(hook) = self.context.hook_for(symbol) else {
            warn!(
                symbol = %symbol,
                sector = %symbol.sector(),
                "no webhook configured, alert not delivered: {message}"
            );
            return Delivery::Undeliverable;
        };

        let mentions = self.context.role_ids.mentions(&symbol.roles());
        let payload = WebhookPayload::new(&mentions, &message);
        match self.notifier.send(hook, &payload) {
            Ok(()) => {
                info!(symbol = %symbol, "sent alert: {message}");
                Delivery::Sent
            }
            Err(e) => {
                error!(symbol = %symbol, error = %e, "failed to send alert: {message}");
                Delivery::Failed
            }
        }
    }
}
