//! Market data: providers, the circuit breaker guarding them, and the series store

pub mod circuit_breaker;
pub mod fixture;
pub mod provider;
pub mod store;
pub mod yahoo;

pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use fixture::FixtureProvider;
pub use provider::{DataError, DataProvider, QuoteSnapshot};
pub use store::SeriesStore;
pub use yahoo::YahooProvider;
