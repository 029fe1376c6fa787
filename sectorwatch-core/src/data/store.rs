//! Flat-file series store.
//!
//! Layout: `{series_dir}/{SYMBOL}.csv`, columns
//! `Date,Open,High,Low,Close,Adj Close,Volume`, date ascending.
//!
//! Files are rewritten wholesale on every refresh. Writes are atomic (write
//! to `.csv.tmp`, rename into place) so an interrupted run never leaves a
//! truncated series behind.

use super::provider::{DataError, DataProvider};
use crate::domain::Series;
use chrono::{Duration, NaiveDate};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// History pulled the first time a symbol is seen.
pub const INITIAL_LOOKBACK_WEEKS: i64 = 41;

/// History re-pulled on each refresh of an existing series.
pub const REFRESH_LOOKBACK_WEEKS: i64 = 1;

pub struct SeriesStore {
    series_dir: PathBuf,
    provider: Arc<dyn DataProvider>,
}

impl SeriesStore {
    pub fn new(series_dir: impl Into<PathBuf>, provider: Arc<dyn DataProvider>) -> Self {
        Self {
            series_dir: series_dir.into(),
            provider,
        }
    }

    pub fn series_dir(&self) -> &Path {
        &self.series_dir
    }

    pub fn provider(&self) -> &Arc<dyn DataProvider> {
        &self.provider
    }

    /// Path to a symbol's series file.
    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.series_dir.join(format!("{symbol}.csv"))
    }

    /// Read the persisted series for a symbol; `None` if no file exists.
    pub fn load(&self, symbol: &str) -> Result<Option<Series>, DataError> {
        let path = self.path_for(symbol);
        if !path.exists() {
            return Ok(None);
        }

        let mut reader = csv::Reader::from_path(&path)
            .map_err(|e| DataError::Store(format!("open {}: {e}", path.display())))?;
        let bars = reader
            .deserialize()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DataError::Store(format!("parse {}: {e}", path.display())))?;

        Ok(Some(Series::from_bars(bars)))
    }

    /// Persist a series, replacing whatever was there.
    pub fn write(&self, symbol: &str, series: &Series) -> Result<(), DataError> {
        fs::create_dir_all(&self.series_dir)
            .map_err(|e| DataError::Store(format!("failed to create dir: {e}")))?;

        let path = self.path_for(symbol);
        let tmp_path = path.with_extension("csv.tmp");

        let write_tmp = || -> Result<(), csv::Error> {
            let mut writer = csv::Writer::from_path(&tmp_path)?;
            for bar in series.bars() {
                writer.serialize(bar)?;
            }
            writer.flush()?;
            Ok(())
        };
        write_tmp().map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::Store(format!("write {}: {e}", tmp_path.display()))
        })?;

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::Store(format!("atomic rename failed: {e}"))
        })
    }

    /// Fetch daily bars for `[start, end]` from the provider.
    pub fn fetch_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Series, DataError> {
        let bars = self.provider.fetch(symbol, start, end)?;
        if bars.is_empty() {
            return Err(DataError::NoData {
                symbol: symbol.to_string(),
                start,
                end,
            });
        }
        Ok(Series::from_bars(bars))
    }

    /// Load a symbol's series, pulling the initial history if none is stored.
    pub fn load_or_init(&self, symbol: &str) -> Result<Series, DataError> {
        self.load_or_init_as_of(symbol, chrono::Local::now().date_naive())
    }

    pub fn load_or_init_as_of(&self, symbol: &str, today: NaiveDate) -> Result<Series, DataError> {
        match self.load(symbol)? {
            Some(series) => Ok(series),
            None => self.initial_fetch(symbol, today),
        }
    }

    /// Bring a symbol's series up to date as of the local calendar date.
    pub fn ensure_fresh(&self, symbol: &str) -> Result<Series, DataError> {
        self.ensure_fresh_as_of(symbol, chrono::Local::now().date_naive())
    }

    /// Bring a symbol's series up to date as of `today`.
    ///
    /// Fetch windows end the day before `today`: the current session's bar is
    /// partial until the close. A stored bar dated `today` (left by a provider
    /// that served the live session) is dropped before merging. The merged
    /// series is always written back.
    pub fn ensure_fresh_as_of(&self, symbol: &str, today: NaiveDate) -> Result<Series, DataError> {
        let Some(mut series) = self.load(symbol)? else {
            return self.initial_fetch(symbol, today);
        };

        series.remove_date(today);
        let start = today - Duration::weeks(REFRESH_LOOKBACK_WEEKS);
        let fresh = self.fetch_range(symbol, start, today - Duration::days(1))?;
        let fetched = fresh.len();
        series.merge(fresh.into_bars());

        self.write(symbol, &series)?;
        info!(
            symbol,
            fetched,
            bars = series.len(),
            "data for {symbol} updated"
        );
        Ok(series)
    }

    fn initial_fetch(&self, symbol: &str, today: NaiveDate) -> Result<Series, DataError> {
        let start = today - Duration::weeks(INITIAL_LOOKBACK_WEEKS);
        let series = self.fetch_range(symbol, start, today - Duration::days(1))?;
        self.write(symbol, &series)?;
        info!(
            symbol,
            bars = series.len(),
            "data for {symbol} fetched successfully"
        );
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixture::{daily_bars, FixtureProvider};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn store_with(provider: FixtureProvider) -> (tempfile::TempDir, SeriesStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SeriesStore::new(dir.path().join("Ticker Data"), Arc::new(provider));
        (dir, store)
    }

    #[test]
    fn load_missing_file_is_none() {
        let (_dir, store) = store_with(FixtureProvider::new());
        assert!(store.load("SPY").unwrap().is_none());
    }

    #[test]
    fn write_and_load_roundtrip() {
        let (_dir, store) = store_with(FixtureProvider::new());
        let series = Series::from_bars(daily_bars(d(2024, 5, 3), &[10.0, 11.0, 12.5], 900));

        store.write("SPY", &series).unwrap();
        let loaded = store.load("SPY").unwrap().unwrap();

        assert_eq!(loaded, series);
        assert!(!store.path_for("SPY").with_extension("csv.tmp").exists());
    }

    #[test]
    fn malformed_file_is_a_store_error() {
        let (_dir, store) = store_with(FixtureProvider::new());
        fs::create_dir_all(store.series_dir()).unwrap();
        fs::write(store.path_for("SPY"), "Date,Open\nnot-a-date,1\n").unwrap();
        assert!(matches!(store.load("SPY"), Err(DataError::Store(_))));
    }

    #[test]
    fn first_refresh_pulls_41_weeks_ending_yesterday() {
        let today = d(2024, 6, 14);
        let (_dir, store) = store_with(
            FixtureProvider::new().with_bars("SPY", daily_bars(d(2024, 6, 14), &[5.0; 400], 1)),
        );

        let series = store.ensure_fresh_as_of("SPY", today).unwrap();

        assert_eq!(series.last().unwrap().date, d(2024, 6, 13));
        assert_eq!(series.first().unwrap().date, today - Duration::weeks(41));
        assert_eq!(store.load("SPY").unwrap().unwrap(), series);
    }

    #[test]
    fn refresh_replaces_today_and_overlapping_bars() {
        let today = d(2024, 6, 14);
        let (_dir, store) = store_with(
            FixtureProvider::new().with_bars("SPY", daily_bars(d(2024, 6, 13), &[20.0; 7], 7)),
        );

        // Stored: June 1..=14 at 10.0, including a stale bar for today.
        store
            .write("SPY", &Series::from_bars(daily_bars(today, &[10.0; 14], 1)))
            .unwrap();

        let series = store.ensure_fresh_as_of("SPY", today).unwrap();

        assert_eq!(series.len(), 13);
        assert_eq!(series.last().unwrap().date, d(2024, 6, 13));
        assert_eq!(series.last().unwrap().adj_close, 20.0);
        assert_eq!(series.back(7).unwrap().adj_close, 20.0);
        assert_eq!(series.back(8).unwrap().adj_close, 10.0);
        assert!(series.bars().windows(2).all(|w| w[0].date < w[1].date));
        assert_eq!(store.load("SPY").unwrap().unwrap(), series);
    }

    #[test]
    fn load_or_init_only_fetches_when_missing() {
        let today = d(2024, 6, 14);
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(
            FixtureProvider::new().with_bars("SPY", daily_bars(d(2024, 6, 13), &[3.0; 30], 1)),
        );
        let store = SeriesStore::new(dir.path(), provider.clone());

        let first = store.load_or_init_as_of("SPY", today).unwrap();
        let second = store.load_or_init_as_of("SPY", today).unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.fetches().len(), 1);
        assert!(store.path_for("SPY").exists());
    }

    #[test]
    fn provider_failure_leaves_stored_series_untouched() {
        let today = d(2024, 6, 14);
        let (_dir, store) = store_with(FixtureProvider::new().fail_symbol("XYZ"));
        let stored = Series::from_bars(daily_bars(d(2024, 6, 10), &[1.0, 2.0], 1));
        store.write("XYZ", &stored).unwrap();

        assert!(matches!(
            store.ensure_fresh_as_of("XYZ", today),
            Err(DataError::NetworkUnreachable(_))
        ));
        assert_eq!(store.load("XYZ").unwrap().unwrap(), stored);
    }
}
