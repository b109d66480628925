pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod heikin_ashi;
pub mod macd;
pub mod mfi;
pub mod parabolic_sar;
pub mod rsi;
pub mod snapshot;
pub mod supertrend;
pub mod volume;

pub use snapshot::IndicatorSnapshot;

/// A single indicator reading. `defined = false`
/// covers both "insufficient history" and "degenerate input" (flat-price
/// division by zero): either way scoring must treat the condition tied to
/// this value as failed, while the sentinel/neutral number is still carried
/// for diagnostics and display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorValue {
    pub value: f64,
    pub defined: bool,
}

impl IndicatorValue {
    pub fn defined(value: f64) -> Self {
        Self {
            value,
            defined: true,
        }
    }

    pub fn undefined(sentinel: f64) -> Self {
        Self {
            value: sentinel,
            defined: false,
        }
    }

    pub fn or_neutral(&self, neutral: f64) -> f64 {
        if self.defined {
            self.value
        } else {
            neutral
        }
    }
}

/// Builds the `ta` crate's OHLCV `DataItem` series from a candle slice,
/// skipping any candle whose values fail the crate's own validity check
/// (e.g. high < low from a malformed upstream payload) rather than
/// panicking — such a candle simply can't contribute to the indicator.
pub(crate) fn to_data_items(candles: &[crate::domain::candle::Candle]) -> Vec<ta::DataItem> {
    candles
        .iter()
        .filter_map(|c| {
            ta::DataItem::builder()
                .high(c.high_f64())
                .low(c.low_f64())
                .open(c.open_f64())
                .close(c.close_f64())
                .volume(c.volume_f64())
                .build()
                .ok()
        })
        .collect()
}
