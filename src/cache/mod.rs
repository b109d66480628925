use crate::domain::candle::{Candle, CandleSeries};
use crate::domain::timeframe::Timeframe;
use dashmap::DashMap;
use std::sync::{Arc, RwLock};

/// Per-`(symbol, timeframe)` ring buffer of closed candles.
///
/// Keyed by `dashmap` so that two scans touching different `(symbol,
/// timeframe)` pairs never contend on the same lock — generalizing the teacher's single
/// `RwLock<HashMap<...>>` `SpreadCache` pattern to one stripe per key.
pub struct CandleCache {
    default_capacity: usize,
    series: DashMap<(String, Timeframe), Arc<RwLock<CandleSeries>>>,
}

impl CandleCache {
    pub fn new(default_capacity: usize) -> Self {
        Self {
            default_capacity,
            series: DashMap::new(),
        }
    }

    /// Merges `candles` into the series for `(symbol, timeframe)`, creating
    /// it on first use. Returns whether the series' latest candle changed.
    pub fn update(&self, symbol: &str, timeframe: Timeframe, candles: &[Candle]) -> bool {
        let entry = self
            .series
            .entry((symbol.to_string(), timeframe))
            .or_insert_with(|| Arc::new(RwLock::new(CandleSeries::new(self.default_capacity))))
            .clone();

        let mut guard = entry.write().unwrap_or_else(|p| p.into_inner());
        guard.update(candles)
    }

    pub fn latest(&self, symbol: &str, timeframe: Timeframe) -> Option<Candle> {
        let entry = self.series.get(&(symbol.to_string(), timeframe))?;
        let guard = entry.read().unwrap_or_else(|p| p.into_inner());
        guard.latest().copied()
    }

    /// A read-only snapshot of the series (cloned out from under the lock
    /// stripe so callers can run indicator math without holding it).
    pub fn series(&self, symbol: &str, timeframe: Timeframe) -> Option<CandleSeries> {
        let entry = self.series.get(&(symbol.to_string(), timeframe))?;
        let guard = entry.read().unwrap_or_else(|p| p.into_inner());
        Some(guard.clone())
    }

    pub fn len(&self, symbol: &str, timeframe: Timeframe) -> usize {
        self.series(symbol, timeframe).map(|s| s.len()).unwrap_or(0)
    }

    pub fn tracked_keys(&self) -> usize {
        self.series.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(t: i64) -> Candle {
        let d = dec!(100);
        Candle {
            open_time_ms: t,
            open: d,
            high: d,
            low: d,
            close: d,
            volume: dec!(10),
            close_time_ms: t + 900_000,
        }
    }

    #[test]
    fn update_then_latest_round_trips() {
        let cache = CandleCache::new(200);
        assert!(cache.update("BTCUSDT", Timeframe::FifteenMin, &[candle(0), candle(900_000)]));
        let latest = cache.latest("BTCUSDT", Timeframe::FifteenMin).unwrap();
        assert_eq!(latest.open_time_ms, 900_000);
    }

    #[test]
    fn distinct_keys_are_independent() {
        let cache = CandleCache::new(200);
        cache.update("BTCUSDT", Timeframe::FifteenMin, &[candle(0)]);
        cache.update("ETHUSDT", Timeframe::FifteenMin, &[candle(0), candle(900_000)]);
        assert_eq!(cache.len("BTCUSDT", Timeframe::FifteenMin), 1);
        assert_eq!(cache.len("ETHUSDT", Timeframe::FifteenMin), 2);
    }

    #[test]
    fn series_snapshot_is_a_clone() {
        let cache = CandleCache::new(200);
        cache.update("BTCUSDT", Timeframe::OneHour, &[candle(0)]);
        let mut snap = cache.series("BTCUSDT", Timeframe::OneHour).unwrap();
        snap.update(&[candle(3_600_000)]);
        // mutating the snapshot must not affect the cached series
        assert_eq!(cache.len("BTCUSDT", Timeframe::OneHour), 1);
        assert_eq!(snap.len(), 2);
    }

    #[test]
    fn unknown_key_returns_none() {
        let cache = CandleCache::new(200);
        assert!(cache.latest("DOGEUSDT", Timeframe::OneDay).is_none());
        assert!(cache.series("DOGEUSDT", Timeframe::OneDay).is_none());
    }
}
