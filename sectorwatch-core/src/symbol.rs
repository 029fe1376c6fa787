//! Symbol model: one ticker, its cached series, and its classification.
//!
//! Sector and market cap are snapshotted once at construction. Price and
//! volume are read live from the provider on every query; everything else
//! comes from the stored series.

use crate::data::provider::{DataError, QuoteSnapshot};
use crate::data::store::SeriesStore;
use crate::domain::Series;
use crate::sector::{MarketCapBucket, Role, Sector, SectorCategory, UnmappedSector};
use chrono::NaiveDate;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Bars averaged for the baseline volume.
pub const AVERAGE_VOLUME_WINDOW: usize = 90;

#[derive(Debug, Error)]
pub enum SymbolError {
    #[error("empty ticker")]
    EmptyTicker,

    #[error("{field} unavailable for {symbol}")]
    DataUnavailable { symbol: String, field: &'static str },

    #[error("{symbol}: {source}")]
    UnmappedSector {
        symbol: String,
        #[source]
        source: UnmappedSector,
    },

    #[error("market data: {0}")]
    Data(#[from] DataError),
}

pub struct Symbol {
    ticker: String,
    series: Series,
    sector: Sector,
    market_cap: Option<f64>,
    store: Arc<SeriesStore>,
}

impl Symbol {
    /// Build a symbol from a raw ticker string as of the local calendar date.
    pub fn new(raw: &str, store: Arc<SeriesStore>) -> Result<Self, SymbolError> {
        Self::new_as_of(raw, store, chrono::Local::now().date_naive())
    }

    pub fn new_as_of(
        raw: &str,
        store: Arc<SeriesStore>,
        today: NaiveDate,
    ) -> Result<Self, SymbolError> {
        let ticker = raw.trim().to_uppercase();
        if ticker.is_empty() {
            return Err(SymbolError::EmptyTicker);
        }

        let series = store.load_or_init_as_of(&ticker, today)?;
        let quote = store.provider().quote(&ticker)?;

        let sector = match quote.sector.as_deref() {
            Some(raw_sector) => {
                raw_sector
                    .parse::<Sector>()
                    .map_err(|source| SymbolError::UnmappedSector {
                        symbol: ticker.clone(),
                        source,
                    })?
            }
            None => {
                let fallback = Sector::fallback_for(&ticker);
                warn!(symbol = %ticker, fallback = %fallback, "sector not found for {ticker}");
                fallback
            }
        };

        if quote.market_cap.is_none() {
            warn!(symbol = %ticker, "market cap not found for {ticker}");
        }

        Ok(Self {
            ticker,
            series,
            sector,
            market_cap: quote.market_cap,
            store,
        })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    pub fn sector(&self) -> Sector {
        self.sector
    }

    /// `None` for `Sector::Unknown`.
    pub fn sector_category(&self) -> Option<SectorCategory> {
        self.sector.category()
    }

    pub fn market_cap(&self) -> Option<f64> {
        self.market_cap
    }

    pub fn market_cap_bucket(&self) -> Option<MarketCapBucket> {
        self.market_cap.and_then(MarketCapBucket::from_market_cap)
    }

    /// Bucket first, then sector category; either may be missing.
    pub fn roles(&self) -> Vec<Role> {
        self.market_cap_bucket()
            .map(Role::MarketCap)
            .into_iter()
            .chain(self.sector_category().map(Role::Sector))
            .collect()
    }

    pub fn refresh(&mut self) -> Result<(), SymbolError> {
        self.series = self.store.ensure_fresh(&self.ticker)?;
        Ok(())
    }

    pub fn refresh_as_of(&mut self, today: NaiveDate) -> Result<(), SymbolError> {
        self.series = self.store.ensure_fresh_as_of(&self.ticker, today)?;
        Ok(())
    }

    /// Live price and volume from the provider. Sector and market cap stay
    /// as snapshotted at construction.
    pub fn live_quote(&self) -> Result<QuoteSnapshot, SymbolError> {
        Ok(self.store.provider().live_quote(&self.ticker)?)
    }

    pub fn current_price(&self) -> Result<f64, SymbolError> {
        self.live_quote()?
            .price
            .ok_or_else(|| self.unavailable("current price"))
    }

    pub fn current_volume(&self) -> Result<f64, SymbolError> {
        self.live_quote()?
            .volume
            .map(|v| v as f64)
            .ok_or_else(|| self.unavailable("current volume"))
    }

    /// Adjusted close of the latest stored bar.
    pub fn previous_close(&self) -> Result<f64, SymbolError> {
        self.adj_close_back(1)
    }

    pub fn percent_move(&self, days_back: usize) -> Result<f64, SymbolError> {
        let price = self.current_price()?;
        self.percent_move_from(price, days_back)
    }

    /// Percent move of `price` against the adjusted close `days_back` bars
    /// from the end, rounded to 2 decimals.
    pub fn percent_move_from(&self, price: f64, days_back: usize) -> Result<f64, SymbolError> {
        let base = self.adj_close_back(days_back)?;
        if base == 0.0 {
            return Err(self.unavailable("reference close"));
        }
        Ok(round2((price / base - 1.0) * 100.0))
    }

    /// Mean adjusted close over the trailing `window` bars (fewer if that is all there is).
    pub fn moving_average(&self, window: usize) -> Result<f64, SymbolError> {
        self.series
            .mean_adj_close(window)
            .ok_or_else(|| self.unavailable("adjusted close"))
    }

    pub fn average_volume(&self) -> Result<f64, SymbolError> {
        self.series
            .mean_volume(AVERAGE_VOLUME_WINDOW)
            .ok_or_else(|| self.unavailable("volume"))
    }

    fn adj_close_back(&self, days_back: usize) -> Result<f64, SymbolError> {
        self.series
            .back(days_back)
            .map(|bar| bar.adj_close)
            .filter(|v| !v.is_nan())
            .ok_or_else(|| self.unavailable("adjusted close"))
    }

    fn unavailable(&self, field: &'static str) -> SymbolError {
        SymbolError::DataUnavailable {
            symbol: self.ticker.clone(),
            field,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ticker)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Symbol")
            .field("ticker", &self.ticker)
            .field("bars", &self.series.len())
            .field("sector", &self.sector)
            .field("market_cap", &self.market_cap)
            .finish()
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
