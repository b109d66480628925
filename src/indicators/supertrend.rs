use super::to_data_items;
use crate::domain::candle::CandleSeries;
use ta::indicators::AverageTrueRange;
use ta::Next;

/// `{direction, level}`.
/// Not available in the `ta` crate; built from its `AverageTrueRange` plus
/// the standard final-band recurrence, replayed across the whole series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuperTrendValue {
    pub direction: i8,
    pub level: f64,
    pub defined: bool,
}

impl SuperTrendValue {
    fn undefined() -> Self {
        Self {
            direction: 0,
            level: 0.0,
            defined: false,
        }
    }
}

pub fn supertrend(series: &CandleSeries, period: usize, multiplier: f64) -> SuperTrendValue {
    let candles: Vec<_> = series.iter().copied().collect();
    if candles.len() < period + 2 {
        return SuperTrendValue::undefined();
    }
    let items = to_data_items(&candles);
    if items.len() != candles.len() {
        return SuperTrendValue::undefined();
    }

    let mut atr_indicator = match AverageTrueRange::new(period) {
        Ok(i) => i,
        Err(_) => return SuperTrendValue::undefined(),
    };

    let mut final_upper = f64::NAN;
    let mut final_lower = f64::NAN;
    let mut direction: i8 = 1;
    let mut level = 0.0;

    for (i, item) in items.iter().enumerate() {
        let atr = atr_indicator.next(item);
        if i < period {
            // ATR not yet warmed up; bands are meaningless before this point.
            continue;
        }

        let candle = &candles[i];
        let mid = (candle.high_f64() + candle.low_f64()) / 2.0;
        let basic_upper = mid + multiplier * atr;
        let basic_lower = mid - multiplier * atr;
        let prev_close = candles[i - 1].close_f64();

        final_upper = if final_upper.is_nan() || basic_upper < final_upper || prev_close > final_upper {
            basic_upper
        } else {
            final_upper
        };
        final_lower = if final_lower.is_nan() || basic_lower > final_lower || prev_close < final_lower {
            basic_lower
        } else {
            final_lower
        };

        direction = if candle.close_f64() > final_upper {
            1
        } else if candle.close_f64() < final_lower {
            -1
        } else {
            direction
        };

        level = if direction == 1 { final_lower } else { final_upper };
    }

    if final_upper.is_nan() || final_lower.is_nan() {
        return SuperTrendValue::undefined();
    }

    SuperTrendValue {
        direction,
        level,
        defined: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(t: i64, high: i64, low: i64, close: i64) -> crate::domain::candle::Candle {
        crate::domain::candle::Candle {
            open_time_ms: t,
            open: rust_decimal::Decimal::from(close),
            high: rust_decimal::Decimal::from(high),
            low: rust_decimal::Decimal::from(low),
            close: rust_decimal::Decimal::from(close),
            volume: dec!(10),
            close_time_ms: t + 60_000,
        }
    }

    #[test]
    fn insufficient_history_is_undefined() {
        let mut series = CandleSeries::new(40);
        for i in 0..5 {
            series.update(&[candle(i * 60_000, 101, 99, 100)]);
        }
        assert!(!supertrend(&series, 10, 3.0).defined);
    }

    #[test]
    fn strong_sustained_uptrend_flips_direction_positive() {
        let mut series = CandleSeries::new(60);
        for i in 0..40 {
            let base = 100 + i * 5;
            series.update(&[candle(i * 60_000, base + 2, base - 2, base)]);
        }
        let v = supertrend(&series, 10, 3.0);
        assert!(v.defined);
        assert_eq!(v.direction, 1);
        assert!(v.level < 100.0 + 39.0 * 5.0);
    }
}
