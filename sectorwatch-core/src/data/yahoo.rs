//! Yahoo Finance data provider.
//!
//! Daily bars and the live price/volume come from the v8 chart API. Market
//! cap and sector come from the v10 quoteSummary API, which needs a session
//! cookie plus a matching crumb. The pair is fetched once and shared by every
//! worker; a 401 clears it so the next summary request starts a new session.
//! When the summary still fails, market cap and sector are absent from the
//! snapshot and the symbol model falls back.
//!
//! Every request goes through the shared circuit breaker, except that a 401
//! never counts against it. There is no retry: a failed request fails that
//! symbol for this run.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, DataProvider, QuoteSnapshot};
use crate::domain::Bar;
use chrono::{Days, NaiveDate, NaiveTime};
use reqwest::header::{HeaderMap, COOKIE, RETRY_AFTER, SET_COOKIE};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

const CHART_BASE: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const SUMMARY_BASE: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const COOKIE_URL: &str = "https://fc.yahoo.com";
const CRUMB_URL: &str = "https://query1.finance.yahoo.com/v1/test/getcrumb";

/// Seconds to wait after a 429 that carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    regular_market_volume: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: SummaryResult,
}

#[derive(Debug, Deserialize)]
struct SummaryResult {
    result: Option<Vec<SummaryData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryData {
    price: Option<SummaryPrice>,
    asset_profile: Option<AssetProfile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryPrice {
    market_cap: Option<RawNumber>,
}

#[derive(Debug, Deserialize)]
struct RawNumber {
    raw: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct AssetProfile {
    sector: Option<String>,
}

/// Session cookie and the crumb Yahoo issued for it.
#[derive(Debug, Clone, PartialEq)]
struct Crumb {
    cookie: String,
    crumb: String,
}

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    crumb: Mutex<Option<Crumb>>,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>, timeout: Duration) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            crumb: Mutex::new(None),
        })
    }

    /// Yahoo spells share classes with a dash (`BF-B`), tickers lists use a dot.
    fn yahoo_symbol(symbol: &str) -> String {
        symbol.replace('.', "-")
    }

    fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(NaiveTime::MIN).and_utc().timestamp();
        // period2 is exclusive: the first second after `end`.
        let end_ts = (end + Days::new(1)).and_time(NaiveTime::MIN).and_utc().timestamp();
        format!(
            "{CHART_BASE}/{}?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true",
            Self::yahoo_symbol(symbol)
        )
    }

    fn live_chart_url(symbol: &str) -> String {
        format!("{CHART_BASE}/{}?range=1d&interval=1d", Self::yahoo_symbol(symbol))
    }

    fn summary_url(symbol: &str, crumb: &str) -> Result<Url, DataError> {
        Url::parse_with_params(
            &format!("{SUMMARY_BASE}/{}", Self::yahoo_symbol(symbol)),
            &[("modules", "price,assetProfile"), ("crumb", crumb)],
        )
        .map_err(|e| DataError::Other(format!("invalid quote summary URL for {symbol}: {e}")))
    }

    /// The cached session crumb, or a fresh one from the cookie/crumb handshake.
    ///
    /// The lock is held across the handshake so concurrent workers share one.
    fn ensure_crumb(&self) -> Result<Crumb, DataError> {
        let mut cached = self.crumb.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(crumb) = cached.as_ref() {
            return Ok(crumb.clone());
        }
        let crumb = self.fetch_crumb()?;
        *cached = Some(crumb.clone());
        Ok(crumb)
    }

    fn clear_crumb(&self) {
        *self.crumb.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn fetch_crumb(&self) -> Result<Crumb, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        // fc.yahoo.com answers 404, but sets the session cookie regardless.
        let resp = self.client.get(COOKIE_URL).send().map_err(|e| {
            self.circuit_breaker.record_failure();
            DataError::NetworkUnreachable(e.to_string())
        })?;
        let cookie = resp
            .headers()
            .get(SET_COOKIE)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split(';').next())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| DataError::AuthenticationRequired("no Yahoo session cookie".into()))?;

        let resp = self
            .client
            .get(CRUMB_URL)
            .header(COOKIE, &cookie)
            .send()
            .map_err(|e| {
                self.circuit_breaker.record_failure();
                DataError::NetworkUnreachable(e.to_string())
            })?;
        classify_status(&self.circuit_breaker, "crumb", resp.status(), resp.headers())?;
        let crumb = resp
            .text()
            .map_err(|e| DataError::ResponseFormatChanged(format!("failed to read crumb: {e}")))?
            .trim()
            .to_string();
        if crumb.is_empty() {
            return Err(DataError::AuthenticationRequired("empty Yahoo crumb".into()));
        }

        info!("obtained Yahoo session crumb");
        Ok(Crumb { cookie, crumb })
    }

    /// Issue one GET and decode the JSON body, keeping the breaker informed.
    fn get_json<T: DeserializeOwned>(
        &self,
        symbol: &str,
        url: &str,
        cookie: Option<&str>,
    ) -> Result<T, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        debug!(symbol, url, "yahoo request");
        let mut request = self.client.get(url);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }
        let resp = request.send().map_err(|e| {
            self.circuit_breaker.record_failure();
            DataError::NetworkUnreachable(e.to_string())
        })?;

        classify_status(&self.circuit_breaker, symbol, resp.status(), resp.headers())?;

        let body = resp.json::<T>().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;
        self.circuit_breaker.record_success();
        Ok(body)
    }

    /// Market cap and sector from quoteSummary, or `(None, None)` when Yahoo
    /// refuses. Only a tripped breaker is an error.
    fn summary(&self, symbol: &str) -> Result<(Option<f64>, Option<String>), DataError> {
        let result = self.ensure_crumb().and_then(|crumb| {
            let url = Self::summary_url(symbol, &crumb.crumb)?;
            self.get_json::<SummaryResponse>(symbol, url.as_str(), Some(&crumb.cookie))
        });

        match result.and_then(Self::parse_summary) {
            Ok(fields) => Ok(fields),
            Err(DataError::CircuitBreakerTripped) => Err(DataError::CircuitBreakerTripped),
            Err(e) => {
                if matches!(e, DataError::AuthenticationRequired(_)) {
                    self.clear_crumb();
                }
                warn!(symbol, error = %e, "quote summary unavailable, market cap and sector omitted");
                Ok((None, None))
            }
        }
    }

    fn first_chart_result(symbol: &str, resp: ChartResponse) -> Result<ChartData, DataError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(err) => {
                DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))
    }

    /// Parse a chart response into bars.
    fn parse_bars(
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        resp: ChartResponse,
    ) -> Result<Vec<Bar>, DataError> {
        let no_data = || DataError::NoData {
            symbol: symbol.to_string(),
            start,
            end,
        };

        let data = Self::first_chart_result(symbol, resp)?;
        let Some(timestamps) = data.timestamp else {
            return Err(no_data());
        };
        let indicators = data
            .indicators
            .ok_or_else(|| DataError::ResponseFormatChanged("no indicators".into()))?;
        let quote = indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;
        let adj_closes = indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.date_naive())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;
            if date < start || date > end {
                continue;
            }

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();

            // Holidays come back as all-null rows.
            if open.is_none() && high.is_none() && low.is_none() && close.is_none() {
                continue;
            }

            let adj_close = adj_closes
                .as_ref()
                .and_then(|v| v.get(i).copied().flatten())
                .or(close);

            bars.push(Bar {
                date,
                open: open.unwrap_or(f64::NAN),
                high: high.unwrap_or(f64::NAN),
                low: low.unwrap_or(f64::NAN),
                close: close.unwrap_or(f64::NAN),
                adj_close: adj_close.unwrap_or(f64::NAN),
                volume: volume.unwrap_or(0),
            });
        }

        if bars.is_empty() {
            return Err(no_data());
        }
        Ok(bars)
    }

    fn parse_live(symbol: &str, resp: ChartResponse) -> Result<(Option<f64>, Option<u64>), DataError> {
        let data = Self::first_chart_result(symbol, resp)?;
        Ok(data
            .meta
            .map(|m| (m.regular_market_price, m.regular_market_volume))
            .unwrap_or((None, None)))
    }

    fn parse_summary(resp: SummaryResponse) -> Result<(Option<f64>, Option<String>), DataError> {
        if let Some(err) = resp.quote_summary.error {
            return Err(DataError::ResponseFormatChanged(format!(
                "{}: {}",
                err.code, err.description
            )));
        }
        let Some(data) = resp.quote_summary.result.and_then(|r| r.into_iter().next()) else {
            return Ok((None, None));
        };
        let market_cap = data.price.and_then(|p| p.market_cap).and_then(|m| m.raw);
        let sector = data
            .asset_profile
            .and_then(|a| a.sector)
            .filter(|s| !s.trim().is_empty());
        Ok((market_cap, sector))
    }
}

impl DataProvider for YahooProvider {
    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, DataError> {
        let chart: ChartResponse =
            self.get_json(symbol, &Self::chart_url(symbol, start, end), None)?;
        Self::parse_bars(symbol, start, end, chart)
    }

    fn quote(&self, symbol: &str) -> Result<QuoteSnapshot, DataError> {
        let live = self.live_quote(symbol)?;
        let (market_cap, sector) = self.summary(symbol)?;
        Ok(QuoteSnapshot {
            market_cap,
            sector,
            ..live
        })
    }

    fn live_quote(&self, symbol: &str) -> Result<QuoteSnapshot, DataError> {
        let chart: ChartResponse = self.get_json(symbol, &Self::live_chart_url(symbol), None)?;
        let (price, volume) = Self::parse_live(symbol, chart)?;
        Ok(QuoteSnapshot {
            price,
            volume,
            ..QuoteSnapshot::default()
        })
    }
}

/// Map a response status to an error, updating the breaker on the way.
///
/// 403 trips the breaker outright; 429 and other failures count toward it.
/// 401 and 404 leave it untouched. Success is left for the caller to record
/// once the body decodes.
fn classify_status(
    breaker: &CircuitBreaker,
    symbol: &str,
    status: StatusCode,
    headers: &HeaderMap,
) -> Result<(), DataError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::FORBIDDEN => {
            breaker.trip();
            Err(DataError::CircuitBreakerTripped)
        }
        StatusCode::TOO_MANY_REQUESTS => {
            breaker.record_failure();
            let retry_after_secs = headers
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            Err(DataError::RateLimited { retry_after_secs })
        }
        StatusCode::UNAUTHORIZED => Err(DataError::AuthenticationRequired(format!(
            "Yahoo refused the request for {symbol}"
        ))),
        StatusCode::NOT_FOUND => Err(DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        }),
        _ => {
            breaker.record_failure();
            Err(DataError::Other(format!("HTTP {status} for {symbol}")))
        }
    }
}
