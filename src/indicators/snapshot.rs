use super::{adx, atr, bollinger, ema, heikin_ashi, macd, mfi, parabolic_sar, rsi, supertrend, volume};
use crate::domain::candle::CandleSeries;

/// Every indicator value evaluated on a series' most recent candle (spec
/// §3 `IndicatorSnapshot`). Produced fresh per scan, consumed only by the
/// `ScoringEngine` within the same `ScanTask` invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSnapshot {
    pub rsi: super::IndicatorValue,
    pub rsi_rising: bool,
    pub rsi_falling: bool,
    pub atr: super::IndicatorValue,
    pub ema9: super::IndicatorValue,
    pub ema21: super::IndicatorValue,
    pub ema50: super::IndicatorValue,
    pub macd: macd::MacdValue,
    pub adx: adx::AdxValue,
    pub heikin_ashi: heikin_ashi::HeikinAshiValue,
    pub supertrend: supertrend::SuperTrendValue,
    pub mfi: mfi::MfiValue,
    pub parabolic_sar: parabolic_sar::ParabolicSarValue,
    pub bollinger: bollinger::BollingerValue,
    pub volume: volume::VolumeStats,
    pub close: f64,
}

impl IndicatorSnapshot {
    /// Computes the full battery against a candle series. Returns `None` if
    /// the series is empty (no candle to anchor the snapshot to).
    pub fn compute(series: &CandleSeries) -> Option<Self> {
        let close = series.latest()?.close_f64();

        Some(Self {
            rsi: rsi::rsi(series, 14),
            rsi_rising: rsi::rsi_rising(series, 14, 3),
            rsi_falling: rsi::rsi_falling(series, 14, 3),
            atr: atr::atr(series, 14),
            ema9: ema::ema(series, 9),
            ema21: ema::ema(series, 21),
            ema50: ema::ema(series, 50),
            macd: macd::macd(series, 12, 26, 9),
            adx: adx::adx_di(series, 14),
            heikin_ashi: heikin_ashi::heikin_ashi_last(series),
            supertrend: supertrend::supertrend(series, 10, 3.0),
            mfi: mfi::mfi(series, 14),
            parabolic_sar: parabolic_sar::parabolic_sar(series, 0.02, 0.2),
            bollinger: bollinger::bollinger(series, 20, 2.0),
            volume: volume::volume_stats(series, 20),
            close,
        })
    }

    /// `EMA9 > EMA21 > EMA50`.
    pub fn emas_bullish_aligned(&self) -> bool {
        self.ema9.defined
            && self.ema21.defined
            && self.ema50.defined
            && self.ema9.value > self.ema21.value
            && self.ema21.value > self.ema50.value
    }

    /// SHORT mirror: `EMA9 < EMA21 < EMA50`.
    pub fn emas_bearish_aligned(&self) -> bool {
        self.ema9.defined
            && self.ema21.defined
            && self.ema50.defined
            && self.ema9.value < self.ema21.value
            && self.ema21.value < self.ema50.value
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
            high: d + dec!(1),
            low: d - dec!(1),
            close: d,
            volume: dec!(100),
            close_time_ms: t + 60_000,
        }
    }

    #[test]
    fn empty_series_yields_no_snapshot() {
        let series = CandleSeries::new(200);
        assert!(IndicatorSnapshot::compute(&series).is_none());
    }

    #[test]
    fn full_history_yields_a_complete_snapshot() {
        let mut series = CandleSeries::new(200);
        for i in 0..100 {
            series.update(&[candle(i * 60_000, 100 + i)]);
        }
        let snap = IndicatorSnapshot::compute(&series).unwrap();
        assert!(snap.rsi.defined);
        assert!(snap.macd.defined);
        assert!(snap.adx.defined);
        assert!(snap.heikin_ashi.defined);
        assert!(snap.supertrend.defined);
        assert!(snap.mfi.defined);
        assert!(snap.parabolic_sar.defined);
        assert!(snap.bollinger.defined);
        assert!(snap.emas_bullish_aligned());
    }
}
