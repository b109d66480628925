use super::circuit_breaker::{CircuitBreaker, CircuitBreakerError};
use super::dedup::InFlightDedup;
use super::http_client_factory::{build_url_with_query, HttpClientFactory};
use crate::domain::candle::Candle;
use crate::domain::errors::ProviderErrorKind;
use crate::domain::market::Market;
use crate::domain::ports::{BatchFetchResult, MarketDataProvider};
use crate::domain::timeframe::Timeframe;
use crate::rate_limiter::RateLimiter;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest_middleware::ClientWithMiddleware;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Weight Binance charges per klines request, by timeframe. Daily candles span a year of history at `limit=1000` and cost more
/// server-side accounting than the intraday timeframes.
fn kline_weight(timeframe: Timeframe) -> u32 {
    match timeframe {
        Timeframe::FifteenMin | Timeframe::OneHour | Timeframe::FourHour => 2,
        Timeframe::OneDay => 5,
    }
}

/// Binance-style REST client, shared by the Spot and Futures market
/// variants: same klines
/// contract, different base URL and weight budget.
pub struct BinanceProvider {
    market: Market,
    client: ClientWithMiddleware,
    base_url: String,
    api_key: Option<String>,
    rate_limiter: Arc<RateLimiter>,
    circuit_breaker: Arc<CircuitBreaker>,
    dedup: InFlightDedup<(String, Timeframe), Result<Vec<Candle>, ProviderErrorKind>>,
}

impl BinanceProvider {
    pub fn new(
        market: Market,
        base_url: impl Into<String>,
        api_key: Option<String>,
        max_weight_per_minute: u32,
        http_timeout: Duration,
    ) -> Self {
        Self {
            market,
            client: HttpClientFactory::create_client(http_timeout),
            base_url: base_url.into(),
            api_key,
            rate_limiter: Arc::new(RateLimiter::new(max_weight_per_minute)),
            circuit_breaker: Arc::new(CircuitBreaker::new(
                format!("binance-{}", market),
                5,
                3,
                Duration::from_secs(60),
            )),
            dedup: InFlightDedup::new(),
        }
    }

    async fn fetch_once(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>, ProviderErrorKind> {
        let weight = kline_weight(timeframe);
        self.rate_limiter.acquire(weight).await;

        let outcome = self
            .circuit_breaker
            .call(self.fetch_klines(symbol, timeframe, limit))
            .await;

        match outcome {
            Ok(candles) => Ok(candles),
            Err(CircuitBreakerError::Open(msg)) => {
                warn!("binance provider circuit open for {symbol}: {msg}");
                Err(ProviderErrorKind::Provider(msg))
            }
            Err(CircuitBreakerError::Inner(kind)) => Err(kind),
        }
    }

    async fn fetch_klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, ProviderErrorKind> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let limit_str = limit.to_string();
        let url = build_url_with_query(
            &url,
            &[
                ("symbol", symbol),
                ("interval", timeframe.to_binance_string()),
                ("limit", &limit_str),
            ],
        );

        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.header("X-MBX-APIKEY", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderErrorKind::TransientNetwork(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(ProviderErrorKind::RateLimited {
                retry_after_secs: retry_after,
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderErrorKind::Auth(format!("binance auth failed: {status}")));
        }
        if status == reqwest::StatusCode::BAD_REQUEST {
            return Err(ProviderErrorKind::SymbolUnknown(symbol.to_string()));
        }
        if !status.is_success() {
            return Err(ProviderErrorKind::Provider(format!("unexpected status {status}")));
        }

        let raw: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| ProviderErrorKind::Provider(format!("malformed klines body: {e}")))?;

        let now_ms = chrono::Utc::now().timestamp_millis();
        let period_ms = timeframe.to_millis();

        let candles = raw
            .into_iter()
            .filter_map(|row| parse_kline_row(&row, period_ms))
            // A candle whose close time hasn't elapsed yet is still forming;
            // the series must never admit a partial candle.
            .filter(|c| c.close_time_ms <= now_ms)
            .collect();

        Ok(candles)
    }
}

fn parse_kline_row(row: &serde_json::Value, period_ms: i64) -> Option<Candle> {
    let arr = row.as_array()?;
    if arr.len() < 6 {
        return None;
    }
    let open_time_ms = arr[0].as_i64()?;
    let open = Decimal::from_str(arr[1].as_str()?).ok()?;
    let high = Decimal::from_str(arr[2].as_str()?).ok()?;
    let low = Decimal::from_str(arr[3].as_str()?).ok()?;
    let close = Decimal::from_str(arr[4].as_str()?).ok()?;
    let volume = Decimal::from_str(arr[5].as_str()?).ok()?;

    Some(Candle {
        open_time_ms,
        open,
        high,
        low,
        close,
        volume,
        close_time_ms: open_time_ms + period_ms,
    })
}

#[async_trait]
impl MarketDataProvider for BinanceProvider {
    fn market(&self) -> Market {
        self.market
    }

    async fn list_symbols(&self, top_n: usize) -> Result<Vec<String>, ProviderErrorKind> {
        self.rate_limiter.acquire(40).await;

        let url = format!("{}/api/v3/ticker/24hr", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderErrorKind::TransientNetwork(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderErrorKind::Provider(format!(
                "ticker/24hr failed with status {}",
                response.status()
            )));
        }

        let rows: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| ProviderErrorKind::Provider(format!("malformed ticker body: {e}")))?;

        let mut by_volume: Vec<(String, f64)> = rows
            .into_iter()
            .filter_map(|row| {
                let symbol = row.get("symbol")?.as_str()?.to_string();
                if !symbol.ends_with("USDT") {
                    return None;
                }
                let quote_volume: f64 = row.get("quoteVolume")?.as_str()?.parse().ok()?;
                Some((symbol, quote_volume))
            })
            .collect();

        by_volume.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(by_volume.into_iter().take(top_n).map(|(s, _)| s).collect())
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, ProviderErrorKind> {
        self.fetch_once(symbol, timeframe, limit).await
    }

    async fn batch_fetch_candles(
        &self,
        symbols: &[String],
        timeframe: Timeframe,
        limit: usize,
        batch_size: usize,
    ) -> BatchFetchResult {
        let results: Vec<(String, Result<Vec<Candle>, ProviderErrorKind>)> = stream::iter(symbols.iter().cloned())
            .map(|symbol| {
                let key = (symbol.clone(), timeframe);
                async move {
                    let result = self
                        .dedup
                        .get_or_fetch(key, || self.fetch_once(&symbol, timeframe, limit))
                        .await;
                    (symbol, result)
                }
            })
            .buffer_unordered(batch_size.max(1))
            .collect()
            .await;

        let mut out = BatchFetchResult::default();
        for (symbol, result) in results {
            match result {
                Ok(candles) => {
                    out.candles.insert(symbol, candles);
                }
                Err(kind) => {
                    out.errors.insert(symbol, kind);
                }
            }
        }
        info!(
            market = %self.market,
            timeframe = %timeframe,
            ok = out.candles.len(),
            failed = out.errors.len(),
            "batch_fetch_candles complete"
        );
        out
    }
}
