//! Series: date-ordered daily bars for one symbol.

use super::bar::Bar;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Ordered sequence of bars for one symbol.
///
/// Invariant: dates are strictly increasing (at most one bar per date).
/// Every constructor and mutator re-establishes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    bars: Vec<Bar>,
}

impl Series {
    /// Build a series from bars in any order.
    ///
    /// Duplicate dates collapse to the bar that appears last in `bars`.
    pub fn from_bars(bars: Vec<Bar>) -> Self {
        let mut by_date: BTreeMap<NaiveDate, Bar> = BTreeMap::new();
        for bar in bars {
            by_date.insert(bar.date, bar);
        }
        Self {
            bars: by_date.into_values().collect(),
        }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Bar `days_back` positions from the end (`1` is the latest bar).
    pub fn back(&self, days_back: usize) -> Option<&Bar> {
        if days_back == 0 {
            return None;
        }
        self.bars.len().checked_sub(days_back).map(|i| &self.bars[i])
    }

    /// The trailing `n` bars, or all of them when fewer exist.
    pub fn trailing(&self, n: usize) -> &[Bar] {
        let start = self.bars.len().saturating_sub(n);
        &self.bars[start..]
    }

    /// Drop the bar dated `date`, if present.
    pub fn remove_date(&mut self, date: NaiveDate) -> bool {
        let before = self.bars.len();
        self.bars.retain(|b| b.date != date);
        self.bars.len() != before
    }

    /// Append freshly fetched bars and deduplicate by date.
    ///
    /// Where a fetched bar shares a date with a stored one, the fetched bar
    /// wins, so a partial session stored on one run is replaced by the
    /// finalized bar on the next.
    pub fn merge(&mut self, fetched: Vec<Bar>) {
        let mut by_date: BTreeMap<NaiveDate, Bar> =
            self.bars.drain(..).map(|b| (b.date, b)).collect();
        for bar in fetched {
            by_date.insert(bar.date, bar);
        }
        self.bars = by_date.into_values().collect();
    }

    /// Mean adjusted close over the trailing `window` bars, skipping NaN holes.
    pub fn mean_adj_close(&self, window: usize) -> Option<f64> {
        mean(self.trailing(window).iter().map(|b| b.adj_close))
    }

    /// Mean volume over the trailing `window` bars.
    pub fn mean_volume(&self, window: usize) -> Option<f64> {
        mean(self.trailing(window).iter().map(|b| b.volume as f64))
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, adj_close: f64, volume: u64) -> Bar {
        Bar {
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            open: adj_close,
            high: adj_close + 1.0,
            low: adj_close - 1.0,
            close: adj_close,
            adj_close,
            volume,
        }
    }

    fn is_strictly_increasing(series: &Series) -> bool {
        series.bars().windows(2).all(|w| w[0].date < w[1].date)
    }

    #[test]
    fn from_bars_sorts_and_dedups() {
        let series = Series::from_bars(vec![bar(5, 3.0, 1), bar(4, 2.0, 1), bar(5, 9.0, 1)]);
        assert_eq!(series.len(), 2);
        assert!(is_strictly_increasing(&series));
        assert_eq!(series.last().unwrap().adj_close, 9.0);
    }

    #[test]
    fn merge_prefers_fetched_bar_on_shared_date() {
        let mut series = Series::from_bars(vec![bar(1, 10.0, 100), bar(2, 11.0, 100)]);
        series.merge(vec![bar(2, 11.5, 300), bar(3, 12.0, 200)]);

        assert_eq!(series.len(), 3);
        assert!(is_strictly_increasing(&series));
        assert_eq!(series.back(2).unwrap().adj_close, 11.5);
        assert_eq!(series.back(2).unwrap().volume, 300);
    }

    #[test]
    fn back_indexes_from_the_end() {
        let series = Series::from_bars(vec![bar(1, 10.0, 1), bar(2, 20.0, 1), bar(3, 30.0, 1)]);
        assert_eq!(series.back(1).unwrap().adj_close, 30.0);
        assert_eq!(series.back(3).unwrap().adj_close, 10.0);
        assert!(series.back(0).is_none());
        assert!(series.back(4).is_none());
    }

    #[test]
    fn remove_date_drops_only_that_bar() {
        let mut series = Series::from_bars(vec![bar(1, 10.0, 1), bar(2, 20.0, 1)]);
        assert!(series.remove_date(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()));
        assert!(!series.remove_date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()));
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn mean_uses_available_bars_when_window_is_longer() {
        let series = Series::from_bars(vec![bar(1, 10.0, 100), bar(2, 20.0, 300)]);
        assert_eq!(series.mean_adj_close(200), Some(15.0));
        assert_eq!(series.mean_volume(90), Some(200.0));
    }

    #[test]
    fn mean_covers_only_trailing_window() {
        let series = Series::from_bars(vec![bar(1, 10.0, 1), bar(2, 20.0, 1), bar(3, 30.0, 1)]);
        assert_eq!(series.mean_adj_close(2), Some(25.0));
    }

    #[test]
    fn mean_skips_nan_and_empty_is_none() {
        let series = Series::from_bars(vec![bar(1, f64::NAN, 1), bar(2, 20.0, 1)]);
        assert_eq!(series.mean_adj_close(5), Some(20.0));
        assert_eq!(Series::default().mean_adj_close(5), None);
        assert_eq!(Series::default().mean_volume(90), None);
    }
}
