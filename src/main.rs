use clap::Parser;
use signalscope::cache::CandleCache;
use signalscope::config::{self, AppConfig};
use signalscope::domain::market::Market;
use signalscope::domain::ports::{EventSink, MarketDataProvider};
use signalscope::domain::timeframe::Timeframe;
use signalscope::events::{BroadcastSink, CompositeSink, LoggingDurableSink};
use signalscope::lifecycle::SignalLifecycleManager;
use signalscope::metrics::MetricsRegistry;
use signalscope::providers::{AlphaVantageProvider, BinanceProvider};
use signalscope::scan::ScanTask;
use signalscope::scheduler::Scheduler;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::prelude::*;

const BINANCE_SPOT_URL: &str = "https://api.binance.com";
const BINANCE_FUTURES_URL: &str = "https://fapi.binance.com";
const ALPHA_VANTAGE_URL: &str = "https://www.alphavantage.co/query";

/// Static curated universe for the vendor-sourced markets.
const FOREX_UNIVERSE: &[&str] = &[
    "EUR/USD", "GBP/USD", "USD/JPY", "USD/CHF", "AUD/USD", "USD/CAD", "NZD/USD", "EUR/GBP",
];
const COMMODITY_UNIVERSE: &[&str] = &["XAU/USD", "XAG/USD", "WTI/USD", "BRENT/USD"];

#[derive(Parser, Debug)]
#[command(name = "signalscope", about = "Real-time multi-market trading signal engine")]
struct Cli {
    /// Run every scheduled scan task exactly once and exit, instead of
    /// starting the long-running scheduler. Useful for smoke-testing a
    /// deployment's provider credentials and config before going live.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let app_config = AppConfig::from_env()?;
    init_tracing(&app_config.log_level);

    info!("signalscope starting up");

    let config_registry = Arc::new(config::build_signal_config_registry()?);
    let cache = Arc::new(CandleCache::new(512));
    let lifecycle = Arc::new(SignalLifecycleManager::new());
    let metrics = Arc::new(MetricsRegistry::new());

    let event_sink: Arc<dyn EventSink> = Arc::new(CompositeSink::new(vec![
        Arc::new(BroadcastSink::new(app_config.event_channel_capacity)),
        Arc::new(LoggingDurableSink::new()),
    ]));

    let http_timeout = Duration::from_secs(app_config.http_timeout_secs);

    let spot_provider: Arc<dyn MarketDataProvider> = Arc::new(BinanceProvider::new(
        Market::Spot,
        BINANCE_SPOT_URL,
        AppConfig::provider_api_key("binance_spot"),
        AppConfig::max_weight_per_minute("binance_spot"),
        http_timeout,
    ));
    let futures_provider: Arc<dyn MarketDataProvider> = Arc::new(BinanceProvider::new(
        Market::Futures,
        BINANCE_FUTURES_URL,
        AppConfig::provider_api_key("binance_futures"),
        AppConfig::max_weight_per_minute("binance_futures"),
        http_timeout,
    ));
    let forex_provider: Arc<dyn MarketDataProvider> = Arc::new(AlphaVantageProvider::new(
        Market::Forex,
        ALPHA_VANTAGE_URL,
        AppConfig::provider_api_key("alpha_vantage_forex").unwrap_or_default(),
        FOREX_UNIVERSE.iter().map(|s| s.to_string()).collect(),
        AppConfig::max_weight_per_minute("alpha_vantage"),
        http_timeout,
    ));
    let commodity_provider: Arc<dyn MarketDataProvider> = Arc::new(AlphaVantageProvider::new(
        Market::Commodity,
        ALPHA_VANTAGE_URL,
        AppConfig::provider_api_key("alpha_vantage_commodity").unwrap_or_default(),
        COMMODITY_UNIVERSE.iter().map(|s| s.to_string()).collect(),
        AppConfig::max_weight_per_minute("alpha_vantage"),
        http_timeout,
    ));

    let tasks = build_scan_tasks(
        &cache,
        &lifecycle,
        &config_registry,
        &event_sink,
        spot_provider,
        futures_provider,
        forex_provider,
        commodity_provider,
        app_config.batch_size,
    );

    if cli.dry_run {
        info!("dry run: executing every scan task once");
        for (task, _period, _offset) in &tasks {
            let report = task.run(Duration::from_secs(300)).await;
            info!(
                market = %task.market(),
                timeframe = %task.timeframe(),
                symbols_ok = report.symbols_ok,
                symbols_failed = report.symbols_failed,
                created = report.signals_created,
                "dry run cycle complete"
            );
        }
        return Ok(());
    }

    let mut scheduler = Scheduler::new();
    for (task, period, offset) in tasks {
        scheduler.schedule_scan(task, period, offset, metrics.clone());
    }
    scheduler.schedule_sweep(lifecycle.clone(), config_registry.clone(), Duration::from_secs(300));

    let status_lifecycle = lifecycle.clone();
    let status_metrics = metrics.clone();
    scheduler.schedule_health_check(Duration::from_secs(600), move || {
        let lifecycle = status_lifecycle.clone();
        let metrics = status_metrics.clone();
        tokio::spawn(async move {
            let status = metrics.status(&lifecycle, &HashMap::new()).await;
            info!(active_signal_keys = status.active_signal_counts.len(), "health check");
        });
    });

    info!("signalscope running; press ctrl-c to shut down");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, draining in-flight work");
    scheduler.shutdown().await;
    info!("signalscope stopped");

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn build_scan_tasks(
    cache: &Arc<CandleCache>,
    lifecycle: &Arc<SignalLifecycleManager>,
    config_registry: &Arc<config::SignalConfigRegistry>,
    event_sink: &Arc<dyn EventSink>,
    spot_provider: Arc<dyn MarketDataProvider>,
    futures_provider: Arc<dyn MarketDataProvider>,
    forex_provider: Arc<dyn MarketDataProvider>,
    commodity_provider: Arc<dyn MarketDataProvider>,
    batch_size: usize,
) -> Vec<(Arc<ScanTask>, Duration, i64)> {
    let _ = batch_size; // ScanTask uses its own internal default batch size today.
    let mut tasks = Vec::new();

    for timeframe in Timeframe::all() {
        let period = Duration::from_secs(timeframe.to_seconds() as u64);

        tasks.push((
            Arc::new(ScanTask::new(
                Market::Spot,
                timeframe,
                spot_provider.clone(),
                cache.clone(),
                lifecycle.clone(),
                config_registry.clone(),
                event_sink.clone(),
                AppConfig::scan_top_n(Market::Spot),
            )),
            period,
            0,
        ));
        tasks.push((
            Arc::new(ScanTask::new(
                Market::Futures,
                timeframe,
                futures_provider.clone(),
                cache.clone(),
                lifecycle.clone(),
                config_registry.clone(),
                event_sink.clone(),
                AppConfig::scan_top_n(Market::Futures),
            )),
            period,
            0,
        ));
        // Forex/commodities lag 10 minutes past each boundary.
        tasks.push((
            Arc::new(ScanTask::new(
                Market::Forex,
                timeframe,
                forex_provider.clone(),
                cache.clone(),
                lifecycle.clone(),
                config_registry.clone(),
                event_sink.clone(),
                AppConfig::scan_top_n(Market::Forex),
            )),
            period,
            600,
        ));
        tasks.push((
            Arc::new(ScanTask::new(
                Market::Commodity,
                timeframe,
                commodity_provider.clone(),
                cache.clone(),
                lifecycle.clone(),
                config_registry.clone(),
                event_sink.clone(),
                AppConfig::scan_top_n(Market::Commodity),
            )),
            period,
            600,
        ));
    }

    tasks
}

fn init_tracing(log_level: &str) {
    let level = log_level.parse::<Level>().unwrap_or(Level::INFO);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
