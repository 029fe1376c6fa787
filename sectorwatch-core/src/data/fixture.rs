//! In-memory provider for tests and offline dry runs.

use super::provider::{DataError, DataProvider, QuoteSnapshot};
use crate::domain::Bar;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Default)]
struct FixtureSymbol {
    bars: Vec<Bar>,
    quote: QuoteSnapshot,
}

/// A provider backed by fixed bars and quotes.
///
/// Symbols marked with [`FixtureProvider::fail_symbol`] return
/// `NetworkUnreachable` from every call. Fetch ranges and full-quote calls
/// are recorded so tests can assert what was asked for.
#[derive(Debug, Default)]
pub struct FixtureProvider {
    symbols: HashMap<String, FixtureSymbol>,
    failing: HashSet<String>,
    fetches: Mutex<Vec<(String, NaiveDate, NaiveDate)>>,
    quotes: Mutex<Vec<String>>,
}

impl FixtureProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.symbols.entry(symbol.to_string()).or_default().bars = bars;
        self
    }

    pub fn with_quote(mut self, symbol: &str, quote: QuoteSnapshot) -> Self {
        self.symbols.entry(symbol.to_string()).or_default().quote = quote;
        self
    }

    pub fn fail_symbol(mut self, symbol: &str) -> Self {
        self.failing.insert(symbol.to_string());
        self
    }

    /// Every `(symbol, start, end)` passed to `fetch`, in call order.
    pub fn fetches(&self) -> Vec<(String, NaiveDate, NaiveDate)> {
        self.fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every symbol passed to `quote` (not `live_quote`), in call order.
    pub fn quotes(&self) -> Vec<String> {
        self.quotes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lookup(&self, symbol: &str) -> Result<&FixtureSymbol, DataError> {
        if self.failing.contains(symbol) {
            return Err(DataError::NetworkUnreachable(format!(
                "fixture: {symbol} is unreachable"
            )));
        }
        self.symbols
            .get(symbol)
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })
    }
}

impl DataProvider for FixtureProvider {
    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, DataError> {
        self.fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((symbol.to_string(), start, end));

        let bars: Vec<Bar> = self
            .lookup(symbol)?
            .bars
            .iter()
            .filter(|b| b.date >= start && b.date <= end)
            .cloned()
            .collect();
        if bars.is_empty() {
            return Err(DataError::NoData {
                symbol: symbol.to_string(),
                start,
                end,
            });
        }
        Ok(bars)
    }

    fn quote(&self, symbol: &str) -> Result<QuoteSnapshot, DataError> {
        self.quotes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(symbol.to_string());
        Ok(self.lookup(symbol)?.quote.clone())
    }

    fn live_quote(&self, symbol: &str) -> Result<QuoteSnapshot, DataError> {
        let quote = &self.lookup(symbol)?.quote;
        Ok(QuoteSnapshot {
            price: quote.price,
            volume: quote.volume,
            ..QuoteSnapshot::default()
        })
    }
}

/// Consecutive calendar-day bars ending at `last`, one per adjusted close.
///
/// Open/high/low are derived from the close; volume is constant.
pub fn daily_bars(last: NaiveDate, adj_closes: &[f64], volume: u64) -> Vec<Bar> {
    let n = adj_closes.len() as u64;
    adj_closes
        .iter()
        .enumerate()
        .filter_map(|(i, &price)| {
            let date = last.checked_sub_days(chrono::Days::new(n - 1 - i as u64))?;
            Some(Bar {
                date,
                open: price,
                high: price + 1.0,
                low: price - 1.0,
                close: price,
                adj_close: price,
                volume,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    #[test]
    fn daily_bars_end_on_last_date() {
        let bars = daily_bars(d(10), &[1.0, 2.0, 3.0], 500);
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, d(8));
        assert_eq!(bars[2].date, d(10));
        assert_eq!(bars[2].adj_close, 3.0);
    }

    #[test]
    fn fetch_filters_by_range_and_records_call() {
        let provider = FixtureProvider::new().with_bars("SPY", daily_bars(d(10), &[1.0; 10], 1));
        let bars = provider.fetch("SPY", d(5), d(7)).unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(provider.fetches(), vec![("SPY".to_string(), d(5), d(7))]);
    }

    #[test]
    fn empty_range_and_failing_symbols_error() {
        let provider = FixtureProvider::new()
            .with_bars("SPY", daily_bars(d(10), &[1.0], 1))
            .fail_symbol("XYZ");
        assert!(matches!(
            provider.fetch("SPY", d(1), d(2)),
            Err(DataError::NoData { .. })
        ));
        assert!(matches!(
            provider.quote("XYZ"),
            Err(DataError::NetworkUnreachable(_))
        ));
        assert!(matches!(
            provider.quote("QQQ"),
            Err(DataError::SymbolNotFound { .. })
        ));
    }

    #[test]
    fn live_quote_omits_classification_and_is_not_recorded() {
        let provider = FixtureProvider::new().with_quote(
            "AAPL",
            QuoteSnapshot {
                price: Some(190.0),
                volume: Some(7),
                market_cap: Some(3.0e12),
                sector: Some("Technology".into()),
            },
        );

        let live = provider.live_quote("AAPL").unwrap();
        assert_eq!(live.price, Some(190.0));
        assert_eq!(live.volume, Some(7));
        assert_eq!(live.market_cap, None);
        assert_eq!(live.sector, None);
        assert!(provider.quotes().is_empty());

        provider.quote("AAPL").unwrap();
        assert_eq!(provider.quotes(), vec!["AAPL".to_string()]);
    }
}
