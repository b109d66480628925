use super::candle::Candle;
use super::errors::ProviderErrorKind;
use super::market::Market;
use super::signal::SignalEvent;
use super::timeframe::Timeframe;
use async_trait::async_trait;
use std::collections::HashMap;

/// Polymorphic OHLCV fetcher. Implementors: `BinanceProvider`
/// (Spot/Futures share an adapter with different base URLs) and
/// `AlphaVantageProvider` (Forex/Commodity).
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn market(&self) -> Market;

    /// The tradable universe for this provider. Crypto providers return a
    /// dynamically discovered top-N-by-volume list; forex/commodity
    /// providers return a static curated list.
    async fn list_symbols(&self, top_n: usize) -> Result<Vec<String>, ProviderErrorKind>;

    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, ProviderErrorKind>;

    /// Concurrent, rate-limited batch fetch: never more than
    /// `batch_size` sub-requests in flight, missing/failed symbols are
    /// reported in the parallel error map rather than failing the whole
    /// call.
    async fn batch_fetch_candles(
        &self,
        symbols: &[String],
        timeframe: Timeframe,
        limit: usize,
        batch_size: usize,
    ) -> BatchFetchResult;
}

#[derive(Debug, Default)]
pub struct BatchFetchResult {
    pub candles: HashMap<String, Vec<Candle>>,
    pub errors: HashMap<String, ProviderErrorKind>,
}

/// Durable + broadcast publication of signal lifecycle events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: SignalEvent);
}
