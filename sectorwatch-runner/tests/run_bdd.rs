//! BDD tests for the run orchestrator
//!
//! These tests verify one full pass over a ticker list:
//! - Empty runs and the one-shot state machine
//! - Per-symbol isolation when the provider fails
//! - Alert routing, mentions, and the unknown-sector path

use chrono::{Duration, NaiveDate};
use sectorwatch_core::data::fixture::daily_bars;
use sectorwatch_core::data::{FixtureProvider, QuoteSnapshot, SeriesStore};
use sectorwatch_core::SectorCategory;
use sectorwatch_runner::{
    Orchestrator, RecordingNotifier, RoleIds, RunContext, RunError, RunState, SectorHooks,
};
use std::sync::Arc;
use std::time::Instant;

const TECH_HOOK: &str = "https://hooks.test/tech";
const FALLBACK_HOOK: &str = "https://hooks.test/all";

#[test]
fn bdd_scenario_empty_ticker_list_completes() {
    // GIVEN an orchestrator and no tickers
    let (_dir, mut orchestrator, notifier) = harness(FixtureProvider::new(), context(None));
    assert_eq!(orchestrator.state(), RunState::Idle);

    // WHEN the run executes
    let started = Instant::now();
    let report = orchestrator.run(&[]).expect("empty run should succeed");
    let outer = started.elapsed();

    // THEN the run is done with nothing sent
    assert_eq!(orchestrator.state(), RunState::Done);
    assert_eq!(report.tickers, 0);
    assert_eq!(report.constructed, 0);
    assert_eq!(report.alerts_sent, 0);
    assert!(notifier.sent().is_empty());

    // AND the run duration was measured
    assert!(report.elapsed > std::time::Duration::ZERO);
    assert!(report.elapsed <= outer);
}

#[test]
fn bdd_scenario_second_run_is_rejected() {
    // GIVEN an orchestrator that has already run
    let (_dir, mut orchestrator, _notifier) = harness(FixtureProvider::new(), context(None));
    orchestrator.run(&[]).unwrap();

    // WHEN it is run again
    let second = orchestrator.run(&tickers(&["AAPL"]));

    // THEN it refuses and stays done
    assert!(matches!(second, Err(RunError::AlreadyRun(RunState::Done))));
    assert_eq!(orchestrator.state(), RunState::Done);
}

#[test]
fn bdd_scenario_provider_failure_does_not_block_other_symbols() {
    // GIVEN AAPL up 10% and XYZ whose provider calls all fail
    let provider = aapl_surging().fail_symbol("XYZ");
    let (dir, mut orchestrator, notifier) = harness(provider, context(None));

    // WHEN both are processed
    let report = orchestrator.run(&tickers(&["XYZ", "AAPL"])).unwrap();

    // THEN AAPL's alert goes to the Technology hook with both role mentions
    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, TECH_HOOK);
    assert_eq!(
        sent[0].1.content,
        "<@&111><@&222>: AAPL gained 10.0% since yesterday"
    );

    // AND XYZ is counted as failed while the run still completes
    assert_eq!(report.tickers, 2);
    assert_eq!(report.constructed, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.alerts_sent, 1);
    assert_eq!(orchestrator.state(), RunState::Done);

    // AND only AAPL's series was persisted
    assert!(dir.path().join("Ticker Data").join("AAPL.csv").exists());
    assert!(!dir.path().join("Ticker Data").join("XYZ.csv").exists());
}

#[test]
fn bdd_scenario_unknown_sector_without_fallback_is_undeliverable() {
    // GIVEN a symbol whose sector the provider omits and that has no fallback
    let (_dir, mut orchestrator, notifier) = harness(mystery_dropping(), context(None));

    // WHEN it is processed
    let report = orchestrator.run(&tickers(&["MYST"])).unwrap();

    // THEN the alert is counted but nothing is posted
    assert_eq!(report.constructed, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.alerts_undeliverable, 1);
    assert_eq!(report.alerts_sent, 0);
    assert!(notifier.sent().is_empty());
}

#[test]
fn bdd_scenario_unknown_sector_uses_fallback_without_sector_mention() {
    // GIVEN a fallback webhook and role IDs for every category
    let (_dir, mut orchestrator, notifier) =
        harness(mystery_dropping(), context(Some(FALLBACK_HOOK)));

    // WHEN the unknown-sector symbol is processed
    let report = orchestrator.run(&tickers(&["MYST"])).unwrap();

    // THEN the alert goes to the fallback and mentions only the market-cap role
    let sent = notifier.sent();
    assert_eq!(report.alerts_sent, 1);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, FALLBACK_HOOK);
    assert_eq!(sent[0].1.content, "<@&333>: MYST lost 50.0% since yesterday");
}

#[test]
fn bdd_scenario_quiet_symbol_sends_nothing() {
    // GIVEN a symbol trading flat at its averages
    let provider = FixtureProvider::new()
        .with_bars("SPY", daily_bars(yesterday(), &[100.0; 60], 100))
        .with_quote("SPY", quote(100.5, 100, Some(5e11), Some("Technology")));
    let (_dir, mut orchestrator, notifier) = harness(provider, context(None));

    // WHEN it is processed
    let report = orchestrator.run(&tickers(&["spy"])).unwrap();

    // THEN no alert fires
    assert_eq!(report.constructed, 1);
    assert_eq!(report.alerts_sent + report.alerts_undeliverable, 0);
    assert!(notifier.sent().is_empty());
}

// ── Helpers ──────────────────────────────────────────────────────────

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()
}

fn yesterday() -> NaiveDate {
    today() - Duration::days(1)
}

fn tickers(symbols: &[&str]) -> Vec<String> {
    symbols.iter().map(|s| s.to_string()).collect()
}

fn quote(price: f64, volume: u64, market_cap: Option<f64>, sector: Option<&str>) -> QuoteSnapshot {
    QuoteSnapshot {
        price: Some(price),
        volume: Some(volume),
        market_cap,
        sector: sector.map(str::to_string),
    }
}

fn aapl_surging() -> FixtureProvider {
    FixtureProvider::new()
        .with_bars("AAPL", daily_bars(yesterday(), &[100.0; 60], 100))
        .with_quote("AAPL", quote(110.0, 100, Some(3.0e12), Some("Technology")))
}

fn mystery_dropping() -> FixtureProvider {
    FixtureProvider::new()
        .with_bars("MYST", daily_bars(yesterday(), &[100.0; 60], 100))
        .with_quote("MYST", quote(50.0, 100, Some(5.0e9), None))
}

fn context(fallback: Option<&str>) -> RunContext {
    let mut role_ids: Vec<(&str, u64)> =
        vec![("Mega Cap", 111), ("Technology", 222), ("Mid Cap", 333)];
    role_ids.extend(
        SectorCategory::ALL
            .iter()
            .filter(|c| **c != SectorCategory::Technology)
            .map(|c| (c.as_str(), 900)),
    );

    RunContext {
        role_ids: RoleIds::from_pairs(role_ids),
        hooks: SectorHooks::from_pairs(vec![(SectorCategory::Technology, TECH_HOOK)]),
        fallback_webhook: fallback.map(str::to_string),
    }
}

fn harness(
    provider: FixtureProvider,
    context: RunContext,
) -> (tempfile::TempDir, Orchestrator, Arc<RecordingNotifier>) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SeriesStore::new(dir.path().join("Ticker Data"), Arc::new(provider)));
    let notifier = Arc::new(RecordingNotifier::new());
    let orchestrator = Orchestrator::new(store, notifier.clone(), context)
        .with_worker_threads(Some(2))
        .as_of(today());
    (dir, orchestrator, notifier)
}
