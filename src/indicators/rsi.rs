use super::IndicatorValue;
use crate::domain::candle::CandleSeries;
use ta::indicators::RelativeStrengthIndex;
use ta::Next;

const NEUTRAL: f64 = 50.0;

/// Wilder's-smoothed RSI over the full series,
/// replayed from scratch every call so the wrapper stays pure/deterministic
/// even though the underlying `ta` indicator is itself stateful.
///
/// A run of identical closes has zero gain *and* zero loss, which lands on
/// `ta`'s zero-average-loss branch (it reports 100.0, treating "no losses"
/// as maximally overbought). That reading is wrong for a market that never
/// moved at all, so a truly flat series is special-cased to the neutral
/// midpoint before ever constructing the indicator.
pub fn rsi(series: &CandleSeries, period: usize) -> IndicatorValue {
    if series.len() < period + 1 {
        return IndicatorValue::undefined(NEUTRAL);
    }
    if is_flat(series) {
        return IndicatorValue::defined(NEUTRAL);
    }

    let mut indicator = match RelativeStrengthIndex::new(period) {
        Ok(i) => i,
        Err(_) => return IndicatorValue::undefined(NEUTRAL),
    };

    let mut last = NEUTRAL;
    for candle in series.iter() {
        last = indicator.next(candle.close_f64());
    }
    IndicatorValue::defined(last)
}

fn is_flat(series: &CandleSeries) -> bool {
    let mut candles = series.iter();
    let Some(first) = candles.next() else { return false };
    let first_close = first.close_f64();
    candles.all(|c| c.close_f64() == first_close)
}

fn rsi_tail(series: &CandleSeries, period: usize, lookback: usize) -> Option<Vec<f64>> {
    let candles: Vec<_> = series.iter().copied().collect();
    if candles.len() < period + 1 + lookback {
        return None;
    }
    let mut indicator = match RelativeStrengthIndex::new(period) {
        Ok(i) => i,
        Err(_) => return None,
    };
    let mut values = Vec::with_capacity(candles.len());
    for candle in &candles {
        values.push(indicator.next(candle.close_f64()));
    }
    Some(values[values.len() - lookback..].to_vec())
}

/// RSI trend over the last `lookback` candles. Replays RSI at each
/// trailing point and compares the first to the last.
pub fn rsi_rising(series: &CandleSeries, period: usize, lookback: usize) -> bool {
    match rsi_tail(series, period, lookback) {
        Some(tail) => tail.first().map(|first| *tail.last().unwrap() > *first).unwrap_or(false),
        None => false,
    }
}

/// SHORT mirror of [`rsi_rising`].
pub fn rsi_falling(series: &CandleSeries, period: usize, lookback: usize) -> bool {
    match rsi_tail(series, period, lookback) {
        Some(tail) => tail.first().map(|first| *tail.last().unwrap() < *first).unwrap_or(false),
        None => false,
    }
}
