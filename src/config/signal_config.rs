use crate::domain::errors::ConfigError;
use crate::domain::market::Market;
use crate::domain::timeframe::Timeframe;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Per-indicator contribution to the weighted score. Field
/// names match the conditions in the LONG rule table; the mirrored SHORT
/// rules reuse the same weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub macd_crossover: f64,
    pub rsi_band: f64,
    pub close_vs_ema50: f64,
    pub adx_trend: f64,
    pub heikin_ashi: f64,
    pub volume_spike: f64,
    pub ema_alignment: f64,
    pub directional_index: f64,
    pub supertrend: f64,
    pub mfi: f64,
    pub parabolic_sar: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            macd_crossover: 1.5,
            rsi_band: 1.0,
            close_vs_ema50: 1.0,
            adx_trend: 1.0,
            heikin_ashi: 1.5,
            volume_spike: 1.0,
            ema_alignment: 0.5,
            directional_index: 0.5,
            supertrend: 1.9,
            mfi: 1.3,
            parabolic_sar: 1.1,
        }
    }
}

impl ScoreWeights {
    /// Sum of all configured weights: the denominator of `confidence`. Not
    /// hardcoded, since every weight is independently overridable.
    pub fn max_score(&self) -> f64 {
        self.macd_crossover
            + self.rsi_band
            + self.close_vs_ema50
            + self.adx_trend
            + self.heikin_ashi
            + self.volume_spike
            + self.ema_alignment
            + self.directional_index
            + self.supertrend
            + self.mfi
            + self.parabolic_sar
    }

    fn all(&self) -> [f64; 11] {
        [
            self.macd_crossover,
            self.rsi_band,
            self.close_vs_ema50,
            self.adx_trend,
            self.heikin_ashi,
            self.volume_spike,
            self.ema_alignment,
            self.directional_index,
            self.supertrend,
            self.mfi,
            self.parabolic_sar,
        ]
    }
}

/// Immutable bundle of thresholds, weights, and SL/TP multipliers for one
/// `(market, timeframe)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalConfig {
    pub long_rsi_min: f64,
    pub long_rsi_max: f64,
    pub short_rsi_min: f64,
    pub short_rsi_max: f64,
    pub long_adx_min: f64,
    pub short_adx_min: f64,
    pub long_volume_multiplier: f64,
    pub short_volume_multiplier: f64,
    pub sl_atr_multiplier: f64,
    pub tp_atr_multiplier: f64,
    pub min_confidence: f64,
    pub max_candles_cache: usize,
    pub signal_expiry_minutes: i64,
    /// Fraction of `min_confidence` below which an existing signal with no
    /// fresh corroborating scan is invalidated.
    pub invalidation_confidence_ratio: f64,
    /// Minimum |confidence delta| (or a material price change) required to
    /// emit `updated` rather than a silent liveness refresh.
    pub update_confidence_delta: f64,
    pub weights: ScoreWeights,
    pub use_volatility_aware: bool,
}

/// Longest indicator lookback among the kernel's 11 indicators (EMA50),
/// used by the `max_candles_cache` validation rule.
const LONGEST_INDICATOR_LOOKBACK: usize = 50;

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            long_rsi_min: 30.0,
            long_rsi_max: 65.0,
            short_rsi_min: 35.0,
            short_rsi_max: 70.0,
            long_adx_min: 20.0,
            short_adx_min: 20.0,
            long_volume_multiplier: 1.5,
            short_volume_multiplier: 1.5,
            sl_atr_multiplier: 3.0,
            tp_atr_multiplier: 7.0,
            min_confidence: 0.70,
            max_candles_cache: 200,
            signal_expiry_minutes: 240,
            invalidation_confidence_ratio: 0.7,
            update_confidence_delta: 0.05,
            weights: ScoreWeights::default(),
            use_volatility_aware: false,
        }
    }
}

impl SignalConfig {
    /// Construction-time validation. Fails with `ConfigError`,
    /// fatal at startup per the rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.long_rsi_min >= self.long_rsi_max {
            return Err(ConfigError::invalid(
                "long_rsi_min/max",
                "long_rsi_min must be < long_rsi_max",
            ));
        }
        if self.short_rsi_min >= self.short_rsi_max {
            return Err(ConfigError::invalid(
                "short_rsi_min/max",
                "short_rsi_min must be < short_rsi_max",
            ));
        }
        for w in self.weights.all() {
            if w < 0.0 {
                return Err(ConfigError::invalid("weights", "all weights must be >= 0"));
            }
        }
        if self.sl_atr_multiplier <= 0.0 {
            return Err(ConfigError::invalid(
                "sl_atr_multiplier",
                "must be > 0",
            ));
        }
        if self.tp_atr_multiplier <= self.sl_atr_multiplier {
            return Err(ConfigError::invalid(
                "tp_atr_multiplier",
                "must be > sl_atr_multiplier",
            ));
        }
        if !(self.min_confidence > 0.0 && self.min_confidence <= 1.0) {
            return Err(ConfigError::invalid(
                "min_confidence",
                "must be in (0, 1]",
            ));
        }
        if self.max_candles_cache < LONGEST_INDICATOR_LOOKBACK + 5 {
            return Err(ConfigError::invalid(
                "max_candles_cache",
                format!(
                    "must be >= longest indicator lookback + 5 ({})",
                    LONGEST_INDICATOR_LOOKBACK + 5
                ),
            ));
        }
        Ok(())
    }
}

/// Process-wide registry of validated `SignalConfig`s keyed by
/// `(market, timeframe)`. Hot-reloadable: `reload_config`
/// atomically swaps the whole map so in-flight scans keep using the config
/// snapshot they started with.
#[derive(Clone)]
pub struct SignalConfigRegistry {
    inner: Arc<RwLock<HashMap<(Market, Timeframe), Arc<SignalConfig>>>>,
}

impl SignalConfigRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_default_for_all(mut configs: Vec<((Market, Timeframe), SignalConfig)>) -> Result<Self, ConfigError> {
        let registry = Self::new();
        for (key, cfg) in configs.drain(..) {
            cfg.validate()?;
            registry.insert(key.0, key.1, cfg);
        }
        Ok(registry)
    }

    pub fn insert(&self, market: Market, timeframe: Timeframe, config: SignalConfig) {
        self.inner
            .write()
            .expect("signal config registry lock poisoned")
            .insert((market, timeframe), Arc::new(config));
    }

    pub fn get(&self, market: Market, timeframe: Timeframe) -> Arc<SignalConfig> {
        self.inner
            .read()
            .expect("signal config registry lock poisoned")
            .get(&(market, timeframe))
            .cloned()
            .unwrap_or_else(|| Arc::new(SignalConfig::default()))
    }

    /// Atomic swap of the entire registry contents. In-flight tasks keep the `Arc<SignalConfig>` they
    /// already cloned; the next task to call `get` observes the new values.
    pub fn reload(&self, new_configs: HashMap<(Market, Timeframe), SignalConfig>) -> Result<(), ConfigError> {
        let mut validated = HashMap::with_capacity(new_configs.len());
        for (key, cfg) in new_configs {
            cfg.validate()?;
            validated.insert(key, Arc::new(cfg));
        }
        *self.inner.write().expect("signal config registry lock poisoned") = validated;
        Ok(())
    }
}

impl Default for SignalConfigRegistry {
    fn default() -> Self {
        Self::new()
    }
}
