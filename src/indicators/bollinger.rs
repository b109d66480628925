use crate::domain::candle::CandleSeries;
use ta::indicators::BollingerBands;
use ta::Next;

/// `bollinger(period=20, k=2)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerValue {
    pub upper: f64,
    pub mid: f64,
    pub lower: f64,
    pub defined: bool,
}

impl BollingerValue {
    fn undefined() -> Self {
        Self {
            upper: 0.0,
            mid: 0.0,
            lower: 0.0,
            defined: false,
        }
    }
}

pub fn bollinger(series: &CandleSeries, period: usize, k: f64) -> BollingerValue {
    if series.len() < period {
        return BollingerValue::undefined();
    }
    let mut indicator = match BollingerBands::new(period, k) {
        Ok(i) => i,
        Err(_) => return BollingerValue::undefined(),
    };
    let mut last = (0.0, 0.0, 0.0);
    for candle in series.iter() {
        let out = indicator.next(candle.close_f64());
        last = (out.upper, out.average, out.lower);
    }
    BollingerValue {
        upper: last.0,
        mid: last.1,
        lower: last.2,
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
    fn bands_straddle_mid_for_noisy_series() {
        let mut series = CandleSeries::new(60);
        for i in 0..30 {
            let wiggle = if i % 2 == 0 { 2 } else { -2 };
            series.update(&[candle(i * 60_000, 100 + wiggle)]);
        }
        let v = bollinger(&series, 20, 2.0);
        assert!(v.defined);
        assert!(v.lower < v.mid && v.mid < v.upper);
    }
}
