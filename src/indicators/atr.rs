use super::{to_data_items, IndicatorValue};
use crate::domain::candle::CandleSeries;
use ta::indicators::AverageTrueRange;
use ta::Next;

/// Wilder's true-range smoothing, replayed from scratch each call.
pub fn atr(series: &CandleSeries, period: usize) -> IndicatorValue {
    if series.len() < period + 1 {
        return IndicatorValue::undefined(0.0);
    }
    let candles: Vec<_> = series.iter().copied().collect();
    let items = to_data_items(&candles);
    if items.len() < period + 1 {
        return IndicatorValue::undefined(0.0);
    }

    let mut indicator = match AverageTrueRange::new(period) {
        Ok(i) => i,
        Err(_) => return IndicatorValue::undefined(0.0),
    };

    let mut last = 0.0;
    for item in &items {
        last = indicator.next(item);
    }
    IndicatorValue::defined(last)
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
    fn flat_series_yields_zero_range() {
        let mut series = CandleSeries::new(50);
        for i in 0..20 {
            series.update(&[candle(i * 60_000, 100, 100, 100)]);
        }
        let v = atr(&series, 14);
        assert!(v.defined);
        assert!(v.value.abs() < 1e-9);
    }

    #[test]
    fn widening_ranges_increase_atr() {
        let mut series = CandleSeries::new(50);
        for i in 0..20 {
            let spread = 5 + i;
            series.update(&[candle(i * 60_000, 100 + spread, 100 - spread, 100)]);
        }
        let v = atr(&series, 14);
        assert!(v.defined);
        assert!(v.value > 5.0);
    }
}
