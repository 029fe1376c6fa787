//! SectorWatch Core: daily series storage, market data, symbol model, alert evaluation.
//!
//! - Domain types (bars, date-ordered series)
//! - Flat-file series store with incremental refresh
//! - Market data providers behind one trait (Yahoo, in-memory fixture)
//! - Sector and market-cap classification
//! - Symbol model and pure alert evaluation

pub mod alerts;
pub mod data;
pub mod domain;
pub mod sector;
pub mod symbol;

pub use alerts::{evaluate, AlertCondition, IndicatorSnapshot};
pub use sector::{MarketCapBucket, Role, Sector, SectorCategory};
pub use symbol::{Symbol, SymbolError};
