//! Alert conditions and their evaluation.
//!
//! A run captures one [`IndicatorSnapshot`] per symbol (one live quote plus the
//! series-derived values), then [`evaluate`] turns it into alert conditions.
//! `evaluate` is pure: the same snapshot always yields the same alerts.

use crate::symbol::{round2, Symbol, SymbolError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Moving-average windows checked for crossovers, in emission order.
pub const MA_WINDOWS: [usize; 2] = [200, 50];

/// Day-over-day move (percent) that triggers a price alert.
pub const PRICE_MOVE_THRESHOLD: f64 = 3.0;

/// Current volume must exceed the average by this factor.
pub const VOLUME_SPIKE_FACTOR: f64 = 1.5;

/// Everything the evaluator needs for one symbol, captured at one instant.
///
/// A `None` means the value was unavailable; checks that depend on it are
/// skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub symbol: String,
    pub current_price: Option<f64>,
    pub previous_close: Option<f64>,
    pub percent_move: Option<f64>,
    pub ma_200: Option<f64>,
    pub ma_50: Option<f64>,
    pub current_volume: Option<f64>,
    pub average_volume: Option<f64>,
}

impl IndicatorSnapshot {
    /// Capture a snapshot from a (freshly refreshed) symbol.
    ///
    /// Fails only if the live quote itself cannot be fetched; individual
    /// missing fields become `None`.
    pub fn capture(symbol: &Symbol) -> Result<Self, SymbolError> {
        let quote = symbol.live_quote()?;
        let current_price = quote.price;

        let percent_move = match current_price {
            Some(price) => optional(symbol, "percent move", symbol.percent_move_from(price, 1)),
            None => None,
        };

        Ok(Self {
            symbol: symbol.ticker().to_string(),
            current_price,
            previous_close: optional(symbol, "previous close", symbol.previous_close()),
            percent_move,
            ma_200: optional(symbol, "ma_200", symbol.moving_average(200)),
            ma_50: optional(symbol, "ma_50", symbol.moving_average(50)),
            current_volume: quote.volume.map(|v| v as f64),
            average_volume: optional(symbol, "average volume", symbol.average_volume()),
        })
    }

    pub fn moving_average(&self, window: usize) -> Option<f64> {
        match window {
            200 => self.ma_200,
            50 => self.ma_50,
            _ => None,
        }
    }
}

fn optional(symbol: &Symbol, metric: &str, value: Result<f64, SymbolError>) -> Option<f64> {
    match value {
        Ok(v) => Some(v),
        Err(e) => {
            debug!(symbol = %symbol, metric, error = %e, "metric unavailable, dependent checks skipped");
            None
        }
    }
}

/// A triggered alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertCondition {
    MaCrossUp { window: usize },
    MaCrossDown { window: usize },
    PriceSurge { percent: f64 },
    PriceDrop { percent: f64 },
    VolumeSpike { excess_percent: f64 },
}

impl AlertCondition {
    /// Human-readable alert text for `symbol`.
    ///
    /// Percents are already rounded to 2 decimals and print as-is, so a
    /// whole number keeps one decimal ("80.0%").
    pub fn message(&self, symbol: &str) -> String {
        match self {
            AlertCondition::MaCrossUp { window } => {
                format!("{symbol} crossed above {window} day moving average")
            }
            AlertCondition::MaCrossDown { window } => {
                format!("{symbol} crossed below {window} day moving average")
            }
            AlertCondition::PriceSurge { percent } => {
                format!("{symbol} gained {percent:?}% since yesterday")
            }
            AlertCondition::PriceDrop { percent } => {
                format!("{symbol} lost {:?}% since yesterday", percent.abs())
            }
            AlertCondition::VolumeSpike { excess_percent } => {
                format!("Today, {symbol}'s volume was {excess_percent:?}% above average")
            }
        }
    }
}

/// Evaluate every alert check against a snapshot.
///
/// Order: 200-day cross, 50-day cross, price move, volume. Checks are
/// independent; up/down within one check are mutually exclusive.
pub fn evaluate(snapshot: &IndicatorSnapshot) -> Vec<AlertCondition> {
    let mut alerts = Vec::new();

    for window in MA_WINDOWS {
        if let Some(alert) = ma_cross(snapshot, window) {
            alerts.push(alert);
        }
    }

    if let Some(percent) = snapshot.percent_move {
        if percent >= PRICE_MOVE_THRESHOLD {
            alerts.push(AlertCondition::PriceSurge { percent });
        } else if percent <= -PRICE_MOVE_THRESHOLD {
            alerts.push(AlertCondition::PriceDrop { percent });
        }
    }

    if let (Some(volume), Some(average)) = (snapshot.current_volume, snapshot.average_volume) {
        if average > 0.0 && volume > average * VOLUME_SPIKE_FACTOR {
            alerts.push(AlertCondition::VolumeSpike {
                excess_percent: round2((volume / average - 1.0) * 100.0),
            });
        }
    }

    alerts
}

fn ma_cross(snapshot: &IndicatorSnapshot, window: usize) -> Option<AlertCondition> {
    let price = snapshot.current_price?;
    let previous = snapshot.previous_close?;
    let ma = snapshot.moving_average(window)?;

    if price > ma && previous < ma {
        Some(AlertCondition::MaCrossUp { window })
    } else if price < ma && previous > ma {
        Some(AlertCondition::MaCrossDown { window })
    } else {
        None
    }
}
