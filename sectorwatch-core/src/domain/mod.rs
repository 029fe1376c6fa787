//! Domain types for SectorWatch

pub mod bar;
pub mod series;

pub use bar::Bar;
pub use series::Series;
