use crate::domain::candle::CandleSeries;
use ta::indicators::MovingAverageConvergenceDivergence as Macd;
use ta::Next;

/// MACD line/signal/histogram, plus the previous candle's histogram (needed
/// for crossover detection per the rule).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdValue {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
    pub histogram_prev: f64,
    pub defined: bool,
}

impl MacdValue {
    fn undefined() -> Self {
        Self {
            line: 0.0,
            signal: 0.0,
            histogram: 0.0,
            histogram_prev: 0.0,
            defined: false,
        }
    }

    /// Spec §4.6 LONG rule 1: `hist_prev ≤ 0 ∧ hist_cur > 0`.
    pub fn crossed_up(&self) -> bool {
        self.defined && self.histogram_prev <= 0.0 && self.histogram > 0.0
    }

    /// SHORT mirror: `hist_prev ≥ 0 ∧ hist_cur < 0`.
    pub fn crossed_down(&self) -> bool {
        self.defined && self.histogram_prev >= 0.0 && self.histogram < 0.0
    }
}

/// `macd(12, 26, 9)` replayed across the full series.
pub fn macd(series: &CandleSeries, fast: usize, slow: usize, signal: usize) -> MacdValue {
    let min_history = slow + signal;
    if series.len() < min_history {
        return MacdValue::undefined();
    }

    let mut indicator = match Macd::new(fast, slow, signal) {
        Ok(i) => i,
        Err(_) => return MacdValue::undefined(),
    };

    let mut histograms = Vec::with_capacity(series.len());
    let mut last = (0.0, 0.0, 0.0);
    for candle in series.iter() {
        let out = indicator.next(candle.close_f64());
        last = (out.macd, out.signal, out.histogram);
        histograms.push(out.histogram);
    }

    let histogram_prev = if histograms.len() >= 2 {
        histograms[histograms.len() - 2]
    } else {
        0.0
    };

    MacdValue {
        line: last.0,
        signal: last.1,
        histogram: last.2,
        histogram_prev,
        defined: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(t: i64, close: i64) -> crate::domain::candle::Candle {
        let d = rust_decimal::Decimal::from(close);
        crate::domain::candle::Candle {
            open_time_ms: t,
            open: d,
            high: d,
            low: d,
            close: d,
            volume: dec!(10),
            close_time_ms: t + 60_000,
        }
    }

    #[test]
    fn insufficient_history_is_undefined() {
        let mut series = CandleSeries::new(60);
        series.update(&[candle(0, 100)]);
        assert!(!macd(&series, 12, 26, 9).defined);
    }

    #[test]
    fn uptrend_eventually_produces_positive_histogram() {
        let mut series = CandleSeries::new(60);
        for i in 0..50 {
            series.update(&[candle(i * 60_000, 100 + i)]);
        }
        let m = macd(&series, 12, 26, 9);
        assert!(m.defined);
        assert!(m.histogram > 0.0);
    }
}
