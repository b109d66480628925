use super::IndicatorValue;
use crate::domain::candle::CandleSeries;

/// `{avg, current, ratio}`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeStats {
    pub avg: f64,
    pub current: f64,
    pub ratio: IndicatorValue,
}

pub fn volume_stats(series: &CandleSeries, period: usize) -> VolumeStats {
    let candles: Vec<_> = series.iter().copied().collect();
    let current = candles.last().map(|c| c.volume_f64()).unwrap_or(0.0);

    if candles.len() < period {
        return VolumeStats {
            avg: 0.0,
            current,
            ratio: IndicatorValue::undefined(1.0),
        };
    }

    let window = &candles[candles.len() - period..];
    let avg = window.iter().map(|c| c.volume_f64()).sum::<f64>() / period as f64;

    let ratio = if avg == 0.0 {
        IndicatorValue::undefined(1.0)
    } else {
        IndicatorValue::defined(current / avg)
    };

    VolumeStats { avg, current, ratio }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(t: i64, volume: i64) -> crate::domain::candle::Candle {
        crate::domain::candle::Candle {
            open_time_ms: t,
            open: dec!(100),
            high: dec!(100),
            low: dec!(100),
            close: dec!(100),
            volume: rust_decimal::Decimal::from(volume),
            close_time_ms: t + 60_000,
        }
    }

    #[test]
    fn insufficient_history_marks_ratio_undefined() {
        let mut series = CandleSeries::new(30);
        series.update(&[candle(0, 10)]);
        let v = volume_stats(&series, 20);
        assert!(!v.ratio.defined);
    }

    #[test]
    fn volume_spike_raises_ratio_above_one() {
        let mut series = CandleSeries::new(30);
        for i in 0..20 {
            series.update(&[candle(i * 60_000, 10)]);
        }
        series.update(&[candle(20 * 60_000, 100)]);
        let v = volume_stats(&series, 20);
        assert!(v.ratio.defined);
        assert!(v.ratio.value > 3.0);
    }
}
