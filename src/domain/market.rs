use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The market a symbol's candles belong to. Mirrors the provider variant set
/// (`BinanceSpot`, `BinanceFutures`, `ForexVendor`, `CommodityVendor`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    Spot,
    Futures,
    Forex,
    Commodity,
}

impl Market {
    pub fn all() -> [Market; 4] {
        [Market::Spot, Market::Futures, Market::Forex, Market::Commodity]
    }

    /// True for the two crypto markets, whose universe is "top-N by rolling
    /// volume" rather than a static curated list.
    pub fn is_crypto(&self) -> bool {
        matches!(self, Market::Spot | Market::Futures)
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Market::Spot => "SPOT",
            Market::Futures => "FUTURES",
            Market::Forex => "FOREX",
            Market::Commodity => "COMMODITY",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Market {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SPOT" => Ok(Market::Spot),
            "FUTURES" => Ok(Market::Futures),
            "FOREX" => Ok(Market::Forex),
            "COMMODITY" => Ok(Market::Commodity),
            _ => Err(anyhow::anyhow!("invalid market '{}'", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_round_trips_through_from_str() {
        for m in Market::all() {
            assert_eq!(Market::from_str(&m.to_string()).unwrap(), m);
        }
    }

    #[test]
    fn only_crypto_markets_use_top_n_universe() {
        assert!(Market::Spot.is_crypto());
        assert!(Market::Futures.is_crypto());
        assert!(!Market::Forex.is_crypto());
        assert!(!Market::Commodity.is_crypto());
    }
}
