//! Property tests for series invariants.
//!
//! Uses proptest to verify:
//! 1. Dedup: any bar order collapses to one bar per date, dates strictly increasing
//! 2. Merge: fetched bars win on shared dates and nothing else is lost
//! 3. Refresh: a stored series stays strictly increasing across ensure_fresh

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use sectorwatch_core::data::fixture::daily_bars;
use sectorwatch_core::data::{FixtureProvider, SeriesStore};
use sectorwatch_core::domain::{Bar, Series};
use std::collections::BTreeSet;
use std::sync::Arc;

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn bar_on(offset: i64, adj_close: f64) -> Bar {
    Bar {
        date: base_date() + Duration::days(offset),
        open: adj_close,
        high: adj_close,
        low: adj_close,
        close: adj_close,
        adj_close,
        volume: 1,
    }
}

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_bars() -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec((0i64..60, 1.0..500.0_f64), 0..80)
        .prop_map(|raw| raw.into_iter().map(|(o, p)| bar_on(o, p)).collect())
}

fn strictly_increasing(series: &Series) -> bool {
    series.bars().windows(2).all(|w| w[0].date < w[1].date)
}

// ── 1. Dedup ─────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn from_bars_keeps_one_bar_per_date(bars in arb_bars()) {
        let distinct: BTreeSet<NaiveDate> = bars.iter().map(|b| b.date).collect();
        let series = Series::from_bars(bars);

        prop_assert!(strictly_increasing(&series));
        prop_assert_eq!(series.len(), distinct.len());
    }
}

// ── 2. Merge ─────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn merge_prefers_fetched_and_keeps_the_rest(stored in arb_bars(), fetched in arb_bars()) {
        let mut series = Series::from_bars(stored.clone());
        series.merge(fetched.clone());

        prop_assert!(strictly_increasing(&series));

        let expected: BTreeSet<NaiveDate> =
            stored.iter().chain(fetched.iter()).map(|b| b.date).collect();
        prop_assert_eq!(series.len(), expected.len());

        // Last fetched bar for a date is the one kept.
        let fetched_series = Series::from_bars(fetched);
        for bar in fetched_series.bars() {
            let kept = series.bars().iter().find(|b| b.date == bar.date).unwrap();
            prop_assert_eq!(kept.adj_close, bar.adj_close);
        }
    }
}

// ── 3. Refresh ───────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn ensure_fresh_never_duplicates_dates(stored_days in 1usize..30, fetched_days in 1usize..15) {
        let today = NaiveDate::from_ymd_opt(2024, 6, 14).unwrap();
        let yesterday = today - Duration::days(1);

        let provider = FixtureProvider::new()
            .with_bars("SPY", daily_bars(yesterday, &vec![2.0; fetched_days], 5));
        let dir = tempfile::tempdir().unwrap();
        let store = SeriesStore::new(dir.path(), Arc::new(provider));
        store
            .write("SPY", &Series::from_bars(daily_bars(today, &vec![1.0; stored_days], 5)))
            .unwrap();

        let refreshed = store.ensure_fresh_as_of("SPY", today).unwrap();

        prop_assert!(strictly_increasing(&refreshed));
        prop_assert_eq!(refreshed.last().unwrap().date, yesterday);
        prop_assert_eq!(store.load("SPY").unwrap().unwrap(), refreshed);
    }
}
