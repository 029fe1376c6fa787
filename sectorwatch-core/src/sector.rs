//! Sector and market-cap classification, and the role tags derived from them.
//!
//! Role names double as keys in the role→ID config file, and sector category
//! names double as keys in the sector→webhook config file, so the display
//! strings here are part of the on-disk contract.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("sector '{0}' has no category mapping")]
pub struct UnmappedSector(pub String);

/// Raw provider sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sector {
    Utilities,
    BasicMaterials,
    Healthcare,
    Technology,
    FinancialServices,
    ConsumerDefensive,
    ConsumerCyclical,
    RealEstate,
    Energy,
    CommunicationServices,
    Industrials,
    /// Provider omitted the sector and no fallback applies.
    Unknown,
}

impl Sector {
    pub const ALL: [Sector; 12] = [
        Sector::Utilities,
        Sector::BasicMaterials,
        Sector::Healthcare,
        Sector::Technology,
        Sector::FinancialServices,
        Sector::ConsumerDefensive,
        Sector::ConsumerCyclical,
        Sector::RealEstate,
        Sector::Energy,
        Sector::CommunicationServices,
        Sector::Industrials,
        Sector::Unknown,
    ];

    /// Provider spelling of the sector.
    pub fn as_str(self) -> &'static str {
        match self {
            Sector::Utilities => "Utilities",
            Sector::BasicMaterials => "Basic Materials",
            Sector::Healthcare => "Healthcare",
            Sector::Technology => "Technology",
            Sector::FinancialServices => "Financial Services",
            Sector::ConsumerDefensive => "Consumer Defensive",
            Sector::ConsumerCyclical => "Consumer Cyclical",
            Sector::RealEstate => "Real Estate",
            Sector::Energy => "Energy",
            Sector::CommunicationServices => "Communication Services",
            Sector::Industrials => "Industrials",
            Sector::Unknown => "Unknown",
        }
    }

    /// Display category this sector is grouped under. `Unknown` has none.
    pub fn category(self) -> Option<SectorCategory> {
        let category = match self {
            Sector::Utilities => SectorCategory::Utilities,
            Sector::BasicMaterials => SectorCategory::Materials,
            Sector::Healthcare => SectorCategory::Healthcare,
            Sector::Technology => SectorCategory::Technology,
            Sector::FinancialServices => SectorCategory::Financials,
            Sector::ConsumerDefensive | Sector::ConsumerCyclical => SectorCategory::Consumer,
            Sector::RealEstate => SectorCategory::RealEstate,
            Sector::Energy => SectorCategory::Energy,
            Sector::CommunicationServices => SectorCategory::Communications,
            Sector::Industrials => SectorCategory::Industrials,
            Sector::Unknown => return None,
        };
        Some(category)
    }

    /// Sector used when the provider omits one for `symbol`.
    pub fn fallback_for(symbol: &str) -> Sector {
        match symbol {
            "L" => Sector::ConsumerCyclical,
            "BF.B" => Sector::ConsumerDefensive,
            "CAT" => Sector::Industrials,
            _ => Sector::Unknown,
        }
    }
}

impl FromStr for Sector {
    type Err = UnmappedSector;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Sector::ALL
            .into_iter()
            .find(|sector| sector.as_str() == trimmed)
            .ok_or_else(|| UnmappedSector(trimmed.to_string()))
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sector grouping used for webhooks and role mentions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SectorCategory {
    Utilities,
    Materials,
    Healthcare,
    Technology,
    Financials,
    Consumer,
    RealEstate,
    Energy,
    Communications,
    Industrials,
}

impl SectorCategory {
    pub const ALL: [SectorCategory; 10] = [
        SectorCategory::Utilities,
        SectorCategory::Materials,
        SectorCategory::Healthcare,
        SectorCategory::Technology,
        SectorCategory::Financials,
        SectorCategory::Consumer,
        SectorCategory::RealEstate,
        SectorCategory::Energy,
        SectorCategory::Communications,
        SectorCategory::Industrials,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SectorCategory::Utilities => "Utilities",
            SectorCategory::Materials => "Materials",
            SectorCategory::Healthcare => "Healthcare",
            SectorCategory::Technology => "Technology",
            SectorCategory::Financials => "Financials",
            SectorCategory::Consumer => "Consumer",
            SectorCategory::RealEstate => "Real Estate",
            SectorCategory::Energy => "Energy",
            SectorCategory::Communications => "Communications",
            SectorCategory::Industrials => "Industrials",
        }
    }
}

impl FromStr for SectorCategory {
    type Err = UnmappedSector;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        SectorCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == trimmed)
            .ok_or_else(|| UnmappedSector(trimmed.to_string()))
    }
}

impl fmt::Display for SectorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Market-cap bucket from a point-in-time market cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketCapBucket {
    Mega,
    Large,
    Mid,
    Small,
}

impl MarketCapBucket {
    /// Lower bounds are exclusive: exactly 10B is Mid, not Large.
    pub fn from_market_cap(market_cap: f64) -> Option<Self> {
        if market_cap > 200_000_000_000.0 {
            Some(MarketCapBucket::Mega)
        } else if market_cap > 10_000_000_000.0 {
            Some(MarketCapBucket::Large)
        } else if market_cap > 2_000_000_000.0 {
            Some(MarketCapBucket::Mid)
        } else if market_cap > 300_000_000.0 {
            Some(MarketCapBucket::Small)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MarketCapBucket::Mega => "Mega Cap",
            MarketCapBucket::Large => "Large Cap",
            MarketCapBucket::Mid => "Mid Cap",
            MarketCapBucket::Small => "Small Cap",
        }
    }
}

/// Mention target derived from a symbol's classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    MarketCap(MarketCapBucket),
    Sector(SectorCategory),
}

impl Role {
    /// Key of this role in the role→ID map.
    pub fn name(self) -> &'static str {
        match self {
            Role::MarketCap(bucket) => bucket.as_str(),
            Role::Sector(category) => category.as_str(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
