pub mod app_config;
pub mod signal_config;
pub mod volatility;

pub use app_config::AppConfig;
pub use signal_config::{ScoreWeights, SignalConfig, SignalConfigRegistry};
pub use volatility::VolatilityClass;

use crate::domain::errors::ConfigError;
use crate::domain::market::Market;
use crate::domain::timeframe::Timeframe;
use std::env;

/// Builds a `SignalConfigRegistry` covering every `(market, timeframe)` pair,
/// starting from `SignalConfig::default` and layering the per-pair env
/// overlays from (`MIN_CONFIDENCE_*`, `SL_ATR_MULT_*`,
/// `TP_ATR_MULT_*`, `SIGNAL_EXPIRY_MINUTES_*`) on top.
pub fn build_signal_config_registry() -> Result<SignalConfigRegistry, ConfigError> {
    let mut configs = Vec::new();

    for market in Market::all() {
        for timeframe in Timeframe::all() {
            let mut cfg = SignalConfig::default();
            let suffix = app_config::market_timeframe_suffix(market, timeframe);

            if let Some(v) = env_f64(&format!("MIN_CONFIDENCE_{suffix}")) {
                cfg.min_confidence = v;
            }
            if let Some(v) = env_f64(&format!("SL_ATR_MULT_{suffix}")) {
                cfg.sl_atr_multiplier = v;
            }
            if let Some(v) = env_f64(&format!("TP_ATR_MULT_{suffix}")) {
                cfg.tp_atr_multiplier = v;
            }
            if let Some(v) = env_i64(&format!(
                "SIGNAL_EXPIRY_MINUTES_{}",
                timeframe.to_binance_string().to_uppercase()
            )) {
                cfg.signal_expiry_minutes = v;
            }

            cfg.validate()?;
            configs.push(((market, timeframe), cfg));
        }
    }

    SignalConfigRegistry::with_default_for_all(configs)
}

fn env_f64(key: &str) -> Option<f64> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_i64(key: &str) -> Option<i64> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
