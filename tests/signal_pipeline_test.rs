use chrono::Utc;
use rust_decimal::Decimal;
use signalscope::cache::CandleCache;
use signalscope::config::SignalConfig;
use signalscope::domain::candle::Candle;
use signalscope::domain::market::Market;
use signalscope::domain::signal::{Direction, EventKind};
use signalscope::domain::timeframe::Timeframe;
use signalscope::indicators::IndicatorSnapshot;
use signalscope::lifecycle::SignalLifecycleManager;
use signalscope::scoring::ScoringEngine;

fn bullish_candle(i: usize) -> Candle {
    let base = 100.0 + i as f64 * 0.6;
    let open_time = i as i64 * 3_600_000;
    Candle {
        open_time_ms: open_time,
        open: Decimal::from_f64_retain(base).unwrap(),
        high: Decimal::from_f64_retain(base + 1.0).unwrap(),
        low: Decimal::from_f64_retain(base - 0.5).unwrap(),
        close: Decimal::from_f64_retain(base + 0.8).unwrap(),
        volume: if i == 119 { Decimal::from(5000) } else { Decimal::from(100) },
        close_time_ms: open_time + 3_600_000,
    }
}

fn flat_candle(i: usize) -> Candle {
    let d = Decimal::from(100);
    Candle {
        open_time_ms: i as i64 * 3_600_000,
        open: d,
        high: d,
        low: d,
        close: d,
        volume: Decimal::from(100),
        close_time_ms: i as i64 * 3_600_000 + 3_600_000,
    }
}

/// Runs the real cache -> indicators -> scoring -> lifecycle chain (no
/// stubbed snapshot or hand-built `ActiveSignal`) over a sustained uptrend
/// and confirms whatever decision emerges is internally consistent.
#[tokio::test]
async fn uptrend_flows_end_to_end_through_cache_scoring_and_lifecycle() {
    let cache = CandleCache::new(200);
    let config = SignalConfig::default();

    for i in 0..120 {
        cache.update("BTCUSDT", Timeframe::OneHour, &[bullish_candle(i)]);
    }

    let series = cache.series("BTCUSDT", Timeframe::OneHour).unwrap();
    let snapshot = IndicatorSnapshot::compute(&series).unwrap();
    let latest = series.latest().copied().unwrap();

    let result = ScoringEngine::evaluate(
        "BTCUSDT",
        Market::Spot,
        Timeframe::OneHour,
        &latest,
        &snapshot,
        &config,
        Utc::now(),
    )
    .unwrap();
    assert!(result.confidence_long >= result.confidence_short);

    let lifecycle = SignalLifecycleManager::new();
    let events = lifecycle.reconcile("BTCUSDT", Market::Spot, &result, Utc::now(), &config);

    if let Some(signal) = &result.decision {
        assert_eq!(signal.direction, Direction::Long);
        assert!(signal.has_valid_price_triple());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Created);
        assert_eq!(lifecycle.active_signals().len(), 1);
    } else {
        assert!(events.is_empty());
        assert!(lifecycle.active_signals().is_empty());
    }
}

/// A flat market (every candle identical) must drive RSI to exactly 50,
/// ADX to 0, and never emit a signal, through the full pipeline rather
/// than a hand-built snapshot.
#[tokio::test]
async fn flat_market_never_emits_through_the_full_pipeline() {
    let cache = CandleCache::new(200);
    let config = SignalConfig::default();

    for i in 0..120 {
        cache.update("ETHUSDT", Timeframe::OneHour, &[flat_candle(i)]);
    }

    let series = cache.series("ETHUSDT", Timeframe::OneHour).unwrap();
    let snapshot = IndicatorSnapshot::compute(&series).unwrap();
    assert!((snapshot.rsi.value - 50.0).abs() < 1e-6);
    assert_eq!(snapshot.adx.adx, 0.0);

    let latest = series.latest().copied().unwrap();
    let result = ScoringEngine::evaluate(
        "ETHUSDT",
        Market::Spot,
        Timeframe::OneHour,
        &latest,
        &snapshot,
        &config,
        Utc::now(),
    )
    .unwrap();
    assert!(result.decision.is_none());

    let lifecycle = SignalLifecycleManager::new();
    let events = lifecycle.reconcile("ETHUSDT", Market::Spot, &result, Utc::now(), &config);
    assert!(events.is_empty());
}

/// Idempotent replay: reconciling the exact same scored result twice must
/// produce at most one `created` and zero `updated` events.
#[tokio::test]
async fn replaying_the_same_cycle_twice_is_idempotent() {
    let cache = CandleCache::new(200);
    let config = SignalConfig::default();

    for i in 0..120 {
        cache.update("BTCUSDT", Timeframe::OneHour, &[bullish_candle(i)]);
    }
    let series = cache.series("BTCUSDT", Timeframe::OneHour).unwrap();
    let snapshot = IndicatorSnapshot::compute(&series).unwrap();
    let latest = series.latest().copied().unwrap();

    let now = Utc::now();
    let result = ScoringEngine::evaluate("BTCUSDT", Market::Spot, Timeframe::OneHour, &latest, &snapshot, &config, now).unwrap();

    let lifecycle = SignalLifecycleManager::new();
    let first_pass = lifecycle.reconcile("BTCUSDT", Market::Spot, &result, now, &config);
    let second_pass = lifecycle.reconcile("BTCUSDT", Market::Spot, &result, now, &config);

    assert!(first_pass.len() <= 1);
    assert!(second_pass.iter().all(|e| e.kind != EventKind::Updated));
    assert!(second_pass.is_empty());
}
