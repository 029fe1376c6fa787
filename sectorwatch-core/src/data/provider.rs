//! Market data provider trait and structured error types.
//!
//! The `DataProvider` trait abstracts over market data sources (Yahoo Finance,
//! the in-memory fixture) so the series store and symbol model never know
//! which one they are talking to.

use crate::domain::Bar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the data layer: the provider itself, and the local series files.
///
/// Every variant is non-fatal to a run; the affected symbol is skipped.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no data returned for {symbol} between {start} and {end}")]
    NoData {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("series store error: {0}")]
    Store(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Point-in-time quote fields for one symbol.
///
/// Every field is optional: providers routinely omit market cap and sector
/// for funds, recent listings and some share classes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub price: Option<f64>,
    pub volume: Option<u64>,
    pub market_cap: Option<f64>,
    pub sector: Option<String>,
}

/// Trait for market data providers.
///
/// Implementations may block on network I/O; the orchestrator calls them from
/// worker threads, so they must be shareable across threads.
pub trait DataProvider: Send + Sync {
    /// Fetch daily bars for a symbol over `[start, end]`, both inclusive.
    ///
    /// An empty result is an error (`DataError::NoData`), never `Ok(vec![])`.
    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<Bar>, DataError>;

    /// Fetch the full quote for a symbol, including market cap and sector.
    fn quote(&self, symbol: &str) -> Result<QuoteSnapshot, DataError>;

    /// Fetch only the live price and volume. `market_cap` and `sector` are
    /// always `None`.
    fn live_quote(&self, symbol: &str) -> Result<QuoteSnapshot, DataError>;
}
