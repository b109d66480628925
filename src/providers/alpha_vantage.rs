use super::circuit_breaker::{CircuitBreaker, CircuitBreakerError};
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
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Alpha-Vantage-style REST client for the Forex and Commodity markets.
/// Both share this adapter:
/// the vendor has no notion of "market", only `from_symbol`/`to_symbol`
/// pairs, so the distinction lives entirely in which curated list the
/// caller passes as `symbols`.
pub struct AlphaVantageProvider {
    market: Market,
    client: ClientWithMiddleware,
    base_url: String,
    api_key: String,
    universe: Vec<String>,
    rate_limiter: Arc<RateLimiter>,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl AlphaVantageProvider {
    pub fn new(
        market: Market,
        base_url: impl Into<String>,
        api_key: String,
        universe: Vec<String>,
        max_weight_per_minute: u32,
        http_timeout: Duration,
    ) -> Self {
        Self {
            market,
            client: HttpClientFactory::create_client(http_timeout),
            base_url: base_url.into(),
            api_key,
            universe,
            rate_limiter: Arc::new(RateLimiter::new(max_weight_per_minute)),
            circuit_breaker: Arc::new(CircuitBreaker::new(
                format!("alpha-vantage-{}", market),
                5,
                3,
                Duration::from_secs(60),
            )),
        }
    }

    fn function_for(&self, timeframe: Timeframe) -> &'static str {
        match timeframe {
            Timeframe::OneDay => "FX_DAILY",
            _ => "FX_INTRADAY",
        }
    }

    async fn fetch_native(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<Candle>, ProviderErrorKind> {
        self.rate_limiter.acquire(1).await;

        let outcome = self
            .circuit_breaker
            .call(self.fetch_query(symbol, timeframe))
            .await;

        match outcome {
            Ok(candles) => Ok(candles),
            Err(CircuitBreakerError::Open(msg)) => {
                warn!("alpha-vantage circuit open for {symbol}: {msg}");
                Err(ProviderErrorKind::Provider(msg))
            }
            Err(CircuitBreakerError::Inner(kind)) => Err(kind),
        }
    }

    async fn fetch_query(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<Candle>, ProviderErrorKind> {
        let (from_symbol, to_symbol) = split_pair(symbol)?;
        let interval = timeframe.to_alpha_vantage_interval();

        let url = build_url_with_query(
            &self.base_url,
            &[
                ("function", self.function_for(timeframe)),
                ("from_symbol", from_symbol),
                ("to_symbol", to_symbol),
                ("interval", interval),
                ("apikey", self.api_key.as_str()),
            ],
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderErrorKind::TransientNetwork(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderErrorKind::RateLimited { retry_after_secs: None });
        }
        if !response.status().is_success() {
            return Err(ProviderErrorKind::Provider(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderErrorKind::Provider(format!("malformed body: {e}")))?;

        if body.get("Note").is_some() {
            return Err(ProviderErrorKind::RateLimited { retry_after_secs: None });
        }
        if body.get("Error Message").is_some() {
            return Err(ProviderErrorKind::SymbolUnknown(symbol.to_string()));
        }

        let series_key = body
            .as_object()
            .and_then(|obj| obj.keys().find(|k| k.contains("Time Series")))
            .cloned()
            .ok_or_else(|| ProviderErrorKind::Provider("missing time series key".into()))?;

        let series = body
            .get(&series_key)
            .and_then(|v| v.as_object())
            .ok_or_else(|| ProviderErrorKind::Provider("malformed time series".into()))?;

        let period_ms = Timeframe::OneHour.to_millis();
        let mut candles: Vec<Candle> = series
            .iter()
            .filter_map(|(ts, ohlc)| parse_fx_candle(ts, ohlc, period_ms))
            .collect();
        candles.sort_by_key(|c| c.open_time_ms);

        Ok(candles)
    }
}

fn split_pair(symbol: &str) -> Result<(&str, &str), ProviderErrorKind> {
    symbol
        .split_once('/')
        .ok_or_else(|| ProviderErrorKind::SymbolUnknown(symbol.to_string()))
}

fn parse_fx_candle(timestamp: &str, ohlc: &serde_json::Value, period_ms: i64) -> Option<Candle> {
    let open_time_ms = chrono::DateTime::parse_from_str(
        &format!("{timestamp} +0000"),
        "%Y-%m-%d %H:%M:%S %z",
    )
    .or_else(|_| chrono::DateTime::parse_from_str(&format!("{timestamp} 00:00:00 +0000"), "%Y-%m-%d %H:%M:%S %z"))
    .ok()?
    .timestamp_millis();

    let get = |key: &str| ohlc.get(key)?.as_str()?.parse::<Decimal>().ok();
    let open = get("1. open")?;
    let high = get("2. high")?;
    let low = get("3. low")?;
    let close = get("4. close")?;

    Some(Candle {
        open_time_ms,
        open,
        high,
        low,
        close,
        volume: Decimal::ZERO,
        close_time_ms: open_time_ms + period_ms,
    })
}

/// Synthesizes 4h candles from four consecutive native 1h candles (spec
/// §6.2: the vendor has no native 4h granularity). Only emits a 4h candle
/// once all four constituent hours are present and contiguous.
fn synthesize_four_hour(hourly: &[Candle]) -> Vec<Candle> {
    let by_time: BTreeMap<i64, Candle> = hourly.iter().map(|c| (c.open_time_ms, *c)).collect();
    let four_hour_ms = Timeframe::FourHour.to_millis();
    let one_hour_ms = Timeframe::OneHour.to_millis();

    let mut out = Vec::new();
    for (&bucket_start, first) in by_time.iter() {
        if bucket_start % four_hour_ms != 0 {
            continue;
        }
        let hours: Vec<&Candle> = (0..4)
            .map(|i| by_time.get(&(bucket_start + i * one_hour_ms)))
            .collect::<Option<Vec<_>>>()
            .unwrap_or_default();
        if hours.len() != 4 {
            continue;
        }

        let high = hours.iter().map(|c| c.high).fold(first.high, |acc, h| acc.max(h));
        let low = hours.iter().map(|c| c.low).fold(first.low, |acc, l| acc.min(l));
        let volume: Decimal = hours.iter().map(|c| c.volume).sum();

        out.push(Candle {
            open_time_ms: bucket_start,
            open: hours[0].open,
            high,
            low,
            close: hours[3].close,
            volume,
            close_time_ms: bucket_start + four_hour_ms,
        });
    }
    out
}

#[async_trait]
impl MarketDataProvider for AlphaVantageProvider {
    fn market(&self) -> Market {
        self.market
    }

    async fn list_symbols(&self, top_n: usize) -> Result<Vec<String>, ProviderErrorKind> {
        // Forex/commodity universes are static and curated, not discovered by rolling volume.
        Ok(self.universe.iter().take(top_n).cloned().collect())
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, ProviderErrorKind> {
        if timeframe == Timeframe::FourHour {
            let hourly = self.fetch_native(symbol, Timeframe::OneHour).await?;
            let mut synthesized = synthesize_four_hour(&hourly);
            synthesized.sort_by_key(|c| c.open_time_ms);
            if synthesized.len() > limit {
                synthesized = synthesized.split_off(synthesized.len() - limit);
            }
            return Ok(synthesized);
        }

        let mut candles = self.fetch_native(symbol, timeframe).await?;
        if candles.len() > limit {
            candles = candles.split_off(candles.len() - limit);
        }
        Ok(candles)
    }

    async fn batch_fetch_candles(
        &self,
        symbols: &[String],
        timeframe: Timeframe,
        limit: usize,
        batch_size: usize,
    ) -> BatchFetchResult {
        let results: Vec<(String, Result<Vec<Candle>, ProviderErrorKind>)> = stream::iter(symbols.iter().cloned())
            .map(|symbol| async move {
                let result = self.fetch_candles(&symbol, timeframe, limit).await;
                (symbol, result)
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
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn hour_candle(open_time_ms: i64, close: Decimal) -> Candle {
        Candle {
            open_time_ms,
            open: close,
            high: close + dec!(0.0010),
            low: close - dec!(0.0010),
            close,
            volume: dec!(100),
            close_time_ms: open_time_ms + 3_600_000,
        }
    }

    #[test]
    fn synthesizes_four_hour_only_when_all_four_hours_present() {
        let hourly = vec![
            hour_candle(0, dec!(1.1000)),
            hour_candle(3_600_000, dec!(1.1010)),
            hour_candle(7_200_000, dec!(1.0990)),
            hour_candle(10_800_000, dec!(1.1005)),
        ];
        let four_hour = synthesize_four_hour(&hourly);
        assert_eq!(four_hour.len(), 1);
        assert_eq!(four_hour[0].open, dec!(1.1000));
        assert_eq!(four_hour[0].close, dec!(1.1005));
    }

    #[test]
    fn missing_hour_drops_the_bucket() {
        let hourly = vec![
            hour_candle(0, dec!(1.1000)),
            hour_candle(3_600_000, dec!(1.1010)),
            hour_candle(10_800_000, dec!(1.1005)),
        ];
        assert!(synthesize_four_hour(&hourly).is_empty());
    }

    #[test]
    fn rejects_symbol_without_pair_separator() {
        assert!(split_pair("EURUSD").is_err());
        assert!(split_pair("EUR/USD").is_ok());
    }
}
