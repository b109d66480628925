use super::IndicatorValue;
use crate::domain::candle::CandleSeries;
use ta::indicators::ExponentialMovingAverage;
use ta::Next;

/// Exponential moving average, smoothing `2 / (period + 1)`.
pub fn ema(series: &CandleSeries, period: usize) -> IndicatorValue {
    if series.len() < period {
        return IndicatorValue::undefined(0.0);
    }
    let mut indicator = match ExponentialMovingAverage::new(period) {
        Ok(i) => i,
        Err(_) => return IndicatorValue::undefined(0.0),
    };
    let mut last = 0.0;
    for candle in series.iter() {
        last = indicator.next(candle.close_f64());
    }
    IndicatorValue::defined(last)
}

/// The three EMA periods the scoring engine needs.
pub fn ema_triplet(series: &CandleSeries) -> (IndicatorValue, IndicatorValue, IndicatorValue) {
    (ema(series, 9), ema(series, 21), ema(series, 50))
}
