use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A single closed OHLCV observation.
///
/// Prices and volume are kept as [`Decimal`] to preserve at least 8 decimal
/// digits through serialization; indicator math converts to `f64`
/// at the point of use, as the hot path is permitted to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time_ms: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub close_time_ms: i64,
}

impl Candle {
    pub fn open_f64(&self) -> f64 {
        self.open.try_into().unwrap_or(0.0)
    }
    pub fn high_f64(&self) -> f64 {
        self.high.try_into().unwrap_or(0.0)
    }
    pub fn low_f64(&self) -> f64 {
        self.low.try_into().unwrap_or(0.0)
    }
    pub fn close_f64(&self) -> f64 {
        self.close.try_into().unwrap_or(0.0)
    }
    pub fn volume_f64(&self) -> f64 {
        self.volume.try_into().unwrap_or(0.0)
    }
}

/// Per-(symbol, timeframe) ordered, capped sequence of closed candles.
///
/// Invariants enforced by every mutating method:
/// - no duplicate `open_time_ms`
/// - strictly time-ascending (insertion order == chronological order)
/// - capped at `capacity`, oldest dropped first
/// - a partial/unclosed candle is never admitted (callers only ever pass
///   candles whose `close_time_ms` has elapsed; this type trusts that and
///   only rejects duplicates/out-of-order timestamps)
#[derive(Debug, Clone)]
pub struct CandleSeries {
    capacity: usize,
    candles: VecDeque<Candle>,
}

impl CandleSeries {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            candles: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn as_slice_contiguous(&mut self) -> &[Candle] {
        self.candles.make_contiguous()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candle> {
        self.candles.iter()
    }

    /// Merge new candles into the series. Duplicates (matching `open_time_ms`)
    /// are discarded; candles older than the current tail are discarded
    /// (the series never reorders itself). Oldest candles are evicted once
    /// `capacity` is exceeded.
    ///
    /// Returns whether the latest candle in the series changed as a result
    /// (new tail appended, or the existing tail candle's values were
    /// refreshed because it was re-delivered with updated values before
    /// its close — callers only pass closed candles, so this is effectively
    /// "was a new candle appended").
    pub fn update(&mut self, new_candles: &[Candle]) -> bool {
        let mut changed = false;
        let mut sorted: Vec<&Candle> = new_candles.iter().collect();
        sorted.sort_by_key(|c| c.open_time_ms);

        for candle in sorted {
            match self.candles.back() {
                None => {
                    self.candles.push_back(*candle);
                    changed = true;
                }
                Some(tail) if candle.open_time_ms > tail.open_time_ms => {
                    self.candles.push_back(*candle);
                    changed = true;
                }
                Some(tail) if candle.open_time_ms == tail.open_time_ms => {
                    // Re-delivery of the same period; ignore (idempotent).
                }
                _ => {
                    // Strictly older than tail, or a duplicate of an earlier
                    // entry: look it up explicitly to decide.
                    if !self
                        .candles
                        .iter()
                        .any(|c| c.open_time_ms == candle.open_time_ms)
                    {
                        // Out-of-order delivery we can't place without
                        // violating ascending order; drop it.
                        continue;
                    }
                }
            }
        }

        while self.candles.len() > self.capacity {
            self.candles.pop_front();
        }

        changed
    }

    /// Validates the invariants this series requires. Exposed for
    /// tests and for defensive assertions at cache-write boundaries.
    pub fn is_valid(&self) -> bool {
        let mut seen_times = std::collections::HashSet::new();
        let mut prev: Option<i64> = None;
        for c in &self.candles {
            if !seen_times.insert(c.open_time_ms) {
                return false;
            }
            if let Some(p) = prev {
                if c.open_time_ms <= p {
                    return false;
                }
            }
            prev = Some(c.open_time_ms);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(t: i64, close: Decimal) -> Candle {
        Candle {
            open_time_ms: t,
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(100),
            close_time_ms: t + 1000,
        }
    }

    #[test]
    fn rejects_duplicate_open_times() {
        let mut series = CandleSeries::new(10);
        series.update(&[candle(1000, dec!(1)), candle(1000, dec!(2))]);
        assert_eq!(series.len(), 1);
        assert!(series.is_valid());
    }

    #[test]
    fn caps_at_capacity_dropping_oldest() {
        let mut series = CandleSeries::new(3);
        for i in 0..5 {
            series.update(&[candle(i * 1000, dec!(1))]);
        }
        assert_eq!(series.len(), 3);
        assert_eq!(series.latest().unwrap().open_time_ms, 4000);
        assert!(series.is_valid());
    }

    #[test]
    fn stays_strictly_ascending() {
        let mut series = CandleSeries::new(10);
        series.update(&[candle(3000, dec!(1)), candle(1000, dec!(1)), candle(2000, dec!(1))]);
        assert!(series.is_valid());
        let times: Vec<i64> = series.iter().map(|c| c.open_time_ms).collect();
        assert_eq!(times, vec![1000, 2000, 3000]);
    }

    #[test]
    fn reports_whether_latest_changed() {
        let mut series = CandleSeries::new(10);
        assert!(series.update(&[candle(1000, dec!(1))]));
        assert!(!series.update(&[candle(1000, dec!(1))]));
        assert!(series.update(&[candle(2000, dec!(1))]));
    }
}
