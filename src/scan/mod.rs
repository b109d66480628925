use crate::cache::CandleCache;
use crate::config::SignalConfigRegistry;
use crate::domain::errors::ProviderErrorKind;
use crate::domain::market::Market;
use crate::domain::ports::{EventSink, MarketDataProvider};
use crate::domain::timeframe::Timeframe;
use crate::indicators::IndicatorSnapshot;
use crate::lifecycle::SignalLifecycleManager;
use crate::scoring::ScoringEngine;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Margin added to the longest indicator lookback when requesting candle
/// history.
const HISTORY_MARGIN: usize = 50;
const DEFAULT_BATCH_SIZE: usize = 20;

/// Outcome of one `ScanTask::run` invocation.
#[derive(Debug, Clone, Default)]
pub struct ScanCycleReport {
    pub market: Option<Market>,
    pub timeframe: Option<Timeframe>,
    pub symbols_total: usize,
    pub symbols_ok: usize,
    pub symbols_failed: usize,
    pub failures_by_kind: HashMap<String, usize>,
    pub signals_created: usize,
    pub signals_updated: usize,
    pub signals_deleted: usize,
    pub duration: Duration,
    pub soft_deadline_exceeded: bool,
}

/// One `(market, timeframe)` scan pipeline: universe discovery,
/// batch fetch, per-symbol snapshot/score/reconcile, then a lifecycle
/// sweep. Stateless itself — all mutable state lives in the shared
/// `CandleCache` / `SignalLifecycleManager` it is constructed with.
pub struct ScanTask {
    market: Market,
    timeframe: Timeframe,
    provider: Arc<dyn MarketDataProvider>,
    cache: Arc<CandleCache>,
    lifecycle: Arc<SignalLifecycleManager>,
    config_registry: Arc<SignalConfigRegistry>,
    event_sink: Arc<dyn EventSink>,
    top_n: usize,
    batch_size: usize,
    cycle_count: AtomicU64,
}

impl ScanTask {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        market: Market,
        timeframe: Timeframe,
        provider: Arc<dyn MarketDataProvider>,
        cache: Arc<CandleCache>,
        lifecycle: Arc<SignalLifecycleManager>,
        config_registry: Arc<SignalConfigRegistry>,
        event_sink: Arc<dyn EventSink>,
        top_n: usize,
    ) -> Self {
        Self {
            market,
            timeframe,
            provider,
            cache,
            lifecycle,
            config_registry,
            event_sink,
            top_n,
            batch_size: DEFAULT_BATCH_SIZE,
            cycle_count: AtomicU64::new(0),
        }
    }

    pub fn market(&self) -> Market {
        self.market
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Entire task retries up to 3 times
    /// with exponential backoff, but only when a cycle's universe fetch
    /// fails outright or every symbol in it fails — the signature of a
    /// total provider outage rather than scattered per-symbol errors.
    pub async fn run_with_retry(&self, soft_deadline: Duration) -> ScanCycleReport {
        const MAX_ATTEMPTS: u32 = 3;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let report = self.run(soft_deadline).await;
            let total_outage = report.symbols_total == 0 || report.symbols_ok == 0;
            if !total_outage || attempt >= MAX_ATTEMPTS {
                return report;
            }
            let backoff = Duration::from_secs(1 << (attempt - 1));
            warn!(
                market = %self.market,
                timeframe = %self.timeframe,
                attempt,
                "scan cycle found zero healthy symbols, retrying after {:?}",
                backoff
            );
            tokio::time::sleep(backoff).await;
        }
    }

    /// One full cycle.
    pub async fn run(&self, soft_deadline: Duration) -> ScanCycleReport {
        let cycle = self.cycle_count.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();
        let config = self.config_registry.get(self.market, self.timeframe);
        let history_limit = config.max_candles_cache.min(HISTORY_MARGIN + 150).max(HISTORY_MARGIN);

        let mut report = ScanCycleReport {
            market: Some(self.market),
            timeframe: Some(self.timeframe),
            ..Default::default()
        };

        let symbols = match self.provider.list_symbols(self.top_n).await {
            Ok(symbols) => symbols,
            Err(err) => {
                warn!(market = %self.market, timeframe = %self.timeframe, %err, "symbol universe fetch failed");
                report.duration = start.elapsed();
                return report;
            }
        };
        report.symbols_total = symbols.len();

        let fetch_result = self
            .provider
            .batch_fetch_candles(&symbols, self.timeframe, history_limit, self.batch_size)
            .await;

        for (symbol, err) in &fetch_result.errors {
            *report.failures_by_kind.entry(kind_label(err)).or_insert(0) += 1;
            warn!(%symbol, market = %self.market, timeframe = %self.timeframe, %err, "candle fetch failed");
        }
        report.symbols_failed = fetch_result.errors.len();

        for (symbol, candles) in &fetch_result.candles {
            if candles.is_empty() {
                continue;
            }
            self.cache.update(symbol, self.timeframe, candles);

            let Some(series) = self.cache.series(symbol, self.timeframe) else {
                continue;
            };
            let Some(snapshot) = IndicatorSnapshot::compute(&series) else {
                continue;
            };
            let Some(candle) = series.latest().copied() else {
                continue;
            };

            let now = Utc::now();
            let result = match ScoringEngine::evaluate(symbol, self.market, self.timeframe, &candle, &snapshot, &config, now) {
                Ok(result) => result,
                Err(err) => {
                    warn!(%symbol, market = %self.market, timeframe = %self.timeframe, %err, "scoring produced an unpriceable signal");
                    continue;
                }
            };

            let events = self.lifecycle.reconcile(symbol, self.market, &result, now, &config);
            for event in events {
                use crate::domain::signal::EventKind;
                match event.kind {
                    EventKind::Created => report.signals_created += 1,
                    EventKind::Updated => report.signals_updated += 1,
                    EventKind::Deleted => report.signals_deleted += 1,
                }
                self.event_sink.emit(event).await;
            }
            report.symbols_ok += 1;
        }

        let sweep_events = self.lifecycle.sweep(Utc::now(), &self.config_registry);
        for event in sweep_events {
            report.signals_deleted += 1;
            self.event_sink.emit(event).await;
        }

        report.duration = start.elapsed();
        report.soft_deadline_exceeded = report.duration > soft_deadline;
        if report.soft_deadline_exceeded {
            warn!(
                market = %self.market,
                timeframe = %self.timeframe,
                cycle,
                elapsed = ?report.duration,
                deadline = ?soft_deadline,
                "scan cycle exceeded its soft deadline"
            );
        }

        info!(
            market = %self.market,
            timeframe = %self.timeframe,
            cycle,
            symbols_total = report.symbols_total,
            symbols_ok = report.symbols_ok,
            symbols_failed = report.symbols_failed,
            created = report.signals_created,
            updated = report.signals_updated,
            deleted = report.signals_deleted,
            elapsed = ?report.duration,
            "scan cycle complete"
        );

        report
    }
}

fn kind_label(err: &ProviderErrorKind) -> String {
    match err {
        ProviderErrorKind::TransientNetwork(_) => "transient_network".to_string(),
        ProviderErrorKind::RateLimited { .. } => "rate_limited".to_string(),
        ProviderErrorKind::SymbolUnknown(_) => "symbol_unknown".to_string(),
        ProviderErrorKind::Auth(_) => "auth".to_string(),
        ProviderErrorKind::Provider(_) => "provider".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SignalConfig;
    use crate::domain::candle::Candle;
    use crate::domain::ports::BatchFetchResult;
    use crate::events::{BroadcastSink, CompositeSink};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::Mutex as StdMutex;

    struct StubProvider {
        symbols: Vec<String>,
        candles_by_symbol: StdMutex<HashMap<String, Vec<Candle>>>,
        fail_symbols: Vec<String>,
    }

    #[async_trait]
    impl MarketDataProvider for StubProvider {
        fn market(&self) -> Market {
            Market::Spot
        }

        async fn list_symbols(&self, top_n: usize) -> Result<Vec<String>, ProviderErrorKind> {
            Ok(self.symbols.iter().take(top_n).cloned().collect())
        }

        async fn fetch_candles(&self, symbol: &str, _timeframe: Timeframe, _limit: usize) -> Result<Vec<Candle>, ProviderErrorKind> {
            self.candles_by_symbol
                .lock()
                .unwrap()
                .get(symbol)
                .cloned()
                .ok_or_else(|| ProviderErrorKind::SymbolUnknown(symbol.to_string()))
        }

        async fn batch_fetch_candles(
            &self,
            symbols: &[String],
            timeframe: Timeframe,
            limit: usize,
            _batch_size: usize,
        ) -> BatchFetchResult {
            let mut out = BatchFetchResult::default();
            for symbol in symbols {
                if self.fail_symbols.contains(symbol) {
                    out.errors.insert(symbol.clone(), ProviderErrorKind::TransientNetwork("boom".into()));
                    continue;
                }
                match self.fetch_candles(symbol, timeframe, limit).await {
                    Ok(candles) => {
                        out.candles.insert(symbol.clone(), candles);
                    }
                    Err(e) => {
                        out.errors.insert(symbol.clone(), e);
                    }
                }
            }
            out
        }
    }

    fn flat_candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle {
                open_time_ms: i as i64 * 3_600_000,
                open: dec!(100),
                high: dec!(100),
                low: dec!(100),
                close: dec!(100),
                volume: dec!(10),
                close_time_ms: i as i64 * 3_600_000 + 3_600_000,
            })
            .collect()
    }

    fn build_task(provider: StubProvider) -> ScanTask {
        let registry = SignalConfigRegistry::new();
        registry.insert(Market::Spot, Timeframe::OneHour, SignalConfig::default());
        let sink = Arc::new(CompositeSink::new(vec![Arc::new(BroadcastSink::new(64))]));
        ScanTask::new(
            Market::Spot,
            Timeframe::OneHour,
            Arc::new(provider),
            Arc::new(CandleCache::new(200)),
            Arc::new(SignalLifecycleManager::new()),
            Arc::new(registry),
            sink,
            800,
        )
    }

    #[tokio::test]
    async fn cycle_with_no_signals_reports_all_symbols_ok() {
        let mut candles_by_symbol = HashMap::new();
        candles_by_symbol.insert("BTCUSDT".to_string(), flat_candles(120));
        let provider = StubProvider {
            symbols: vec!["BTCUSDT".to_string()],
            candles_by_symbol: StdMutex::new(candles_by_symbol),
            fail_symbols: vec![],
        };
        let task = build_task(provider);
        let report = task.run(Duration::from_secs(60)).await;
        assert_eq!(report.symbols_total, 1);
        assert_eq!(report.symbols_ok, 1);
        assert_eq!(report.symbols_failed, 0);
        assert_eq!(report.signals_created, 0);
    }

    #[tokio::test]
    async fn failed_symbol_fetch_is_recorded_without_aborting_the_cycle() {
        let mut candles_by_symbol = HashMap::new();
        candles_by_symbol.insert("BTCUSDT".to_string(), flat_candles(120));
        let provider = StubProvider {
            symbols: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
            candles_by_symbol: StdMutex::new(candles_by_symbol),
            fail_symbols: vec!["ETHUSDT".to_string()],
        };
        let task = build_task(provider);
        let report = task.run(Duration::from_secs(60)).await;
        assert_eq!(report.symbols_total, 2);
        assert_eq!(report.symbols_ok, 1);
        assert_eq!(report.symbols_failed, 1);
        assert_eq!(report.failures_by_kind.get("transient_network"), Some(&1));
    }

    #[tokio::test]
    async fn total_outage_triggers_retry_then_still_reports_zero() {
        let provider = StubProvider {
            symbols: vec!["BTCUSDT".to_string()],
            candles_by_symbol: StdMutex::new(HashMap::new()),
            fail_symbols: vec!["BTCUSDT".to_string()],
        };
        let task = build_task(provider);
        let report = task.run_with_retry(Duration::from_secs(60)).await;
        assert_eq!(report.symbols_ok, 0);
    }

    #[tokio::test]
    async fn exceeding_soft_deadline_is_flagged() {
        let mut candles_by_symbol = HashMap::new();
        candles_by_symbol.insert("BTCUSDT".to_string(), flat_candles(120));
        let provider = StubProvider {
            symbols: vec!["BTCUSDT".to_string()],
            candles_by_symbol: StdMutex::new(candles_by_symbol),
            fail_symbols: vec![],
        };
        let task = build_task(provider);
        let report = task.run(Duration::from_nanos(1)).await;
        assert!(report.soft_deadline_exceeded);
    }
}
