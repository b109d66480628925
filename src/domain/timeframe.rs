use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candle period recognized by the scanner pipeline.
///
/// Ordinal order (`FifteenMin < OneHour < FourHour < OneDay`) is also the
/// timeframe-priority order used by the signal lifecycle manager when two
/// signals for the same identity key disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    FifteenMin,
    OneHour,
    FourHour,
    OneDay,
}

impl Timeframe {
    pub fn to_minutes(&self) -> usize {
        match self {
            Timeframe::FifteenMin => 15,
            Timeframe::OneHour => 60,
            Timeframe::FourHour => 240,
            Timeframe::OneDay => 1440,
        }
    }

    pub fn to_seconds(&self) -> i64 {
        (self.to_minutes() * 60) as i64
    }

    pub fn to_millis(&self) -> i64 {
        self.to_seconds() * 1000
    }

    /// Ordinal used for timeframe-supersession: higher timeframes win.
    pub fn priority(&self) -> u8 {
        match self {
            Timeframe::FifteenMin => 1,
            Timeframe::OneHour => 2,
            Timeframe::FourHour => 3,
            Timeframe::OneDay => 4,
        }
    }

    pub fn to_binance_string(&self) -> &'static str {
        match self {
            Timeframe::FifteenMin => "15m",
            Timeframe::OneHour => "1h",
            Timeframe::FourHour => "4h",
            Timeframe::OneDay => "1d",
        }
    }

    /// Alpha-Vantage has no native 4h granularity; the provider adapter
    /// synthesizes it from four consecutive 1h candles.
    pub fn to_alpha_vantage_interval(&self) -> &'static str {
        match self {
            Timeframe::FifteenMin => "15min",
            Timeframe::OneHour => "60min",
            Timeframe::FourHour => "60min",
            Timeframe::OneDay => "daily",
        }
    }

    pub fn all() -> [Timeframe; 4] {
        [
            Timeframe::FifteenMin,
            Timeframe::OneHour,
            Timeframe::FourHour,
            Timeframe::OneDay,
        ]
    }

    /// Whether a timestamp (ms) falls on this timeframe's period boundary.
    pub fn is_period_start(&self, timestamp_ms: i64) -> bool {
        let timestamp_sec = timestamp_ms / 1000;
        match self {
            Timeframe::OneDay => timestamp_sec % 86_400 == 0,
            _ => timestamp_sec % self.to_seconds() == 0,
        }
    }

    /// Start timestamp (ms) of the period containing `timestamp_ms`.
    pub fn period_start(&self, timestamp_ms: i64) -> i64 {
        let timestamp_sec = timestamp_ms / 1000;
        let period_start_sec = match self {
            Timeframe::OneDay => timestamp_sec - (timestamp_sec % 86_400),
            _ => timestamp_sec - (timestamp_sec % self.to_seconds()),
        };
        period_start_sec * 1000
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "15m" | "15min" | "fifteenmin" => Ok(Timeframe::FifteenMin),
            "1h" | "1hour" | "onehour" => Ok(Timeframe::OneHour),
            "4h" | "4hour" | "fourhour" => Ok(Timeframe::FourHour),
            "1d" | "1day" | "oneday" => Ok(Timeframe::OneDay),
            _ => Err(anyhow!(
                "invalid timeframe '{}': valid options are 15m, 1h, 4h, 1d",
                s
            )),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_binance_string())
    }
}
