use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::MarketDataError;

/// Listing market of a ticker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum Market {
    #[serde(rename = "US")]
    Us,
    #[serde(rename = "Japan")]
    Japan,
}

impl Market {
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Us => "US",
            Market::Japan => "Japan",
        }
    }

    /// Infer the market from a symbol when the source record has none.
    /// Tokyo Stock Exchange listings carry a `.T` suffix (e.g. `7203.T`).
    pub fn infer_from_symbol(symbol: &str) -> Self {
        if symbol.to_ascii_uppercase().ends_with(".T") {
            Market::Japan
        } else {
            Market::Us
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "us" | "usa" => Ok(Market::Us),
            "japan" | "jp" => Ok(Market::Japan),
            other => Err(MarketDataError::InvalidParameter(format!(
                "unknown market '{}' (expected US or Japan)",
                other
            ))),
        }
    }
}

/// One entry of the ticker directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TickerRecord {
    pub symbol: String,
    /// Localized name (Japanese for Tokyo listings)
    pub name: String,
    #[serde(default)]
    pub english_name: Option<String>,
    pub market: Market,
    #[serde(default)]
    pub sector: Option<String>,
}

impl TickerRecord {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>, market: Market) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            english_name: None,
            market,
            sector: None,
        }
    }

    pub fn with_english_name(mut self, english_name: impl Into<String>) -> Self {
        self.english_name = Some(english_name.into());
        self
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }

    /// Name fields searched by the matcher, localized name first.
    /// Empty names are skipped.
    pub fn name_fields(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str())
            .chain(self.english_name.as_deref())
            .filter(|n| !n.is_empty())
    }
}

/// Daily close from a price history series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
    #[serde(default)]
    pub dividend: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            close,
            dividend: 0.0,
        }
    }
}
