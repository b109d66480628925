use crate::config::{SignalConfig, VolatilityClass};
use crate::domain::candle::Candle;
use crate::domain::errors::ScoringError;
use crate::domain::market::Market;
use crate::domain::signal::{ActiveSignal, Direction};
use crate::domain::timeframe::Timeframe;
use crate::indicators::IndicatorSnapshot;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Both directions' confidence plus the winning decision, if any. Carrying
/// both confidences — not just the winner — lets
/// [`crate::lifecycle::SignalLifecycleManager`] re-score an existing
/// signal's own direction even on a cycle where neither direction wins
/// outright.
#[derive(Debug, Clone)]
pub struct ScoreResult {
    pub confidence_long: f64,
    pub confidence_short: f64,
    pub decision: Option<ActiveSignal>,
}

impl ScoreResult {
    pub fn confidence_for(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Long => self.confidence_long,
            Direction::Short => self.confidence_short,
        }
    }
}

/// Applies the weighted rule set to one symbol's
/// [`IndicatorSnapshot`] and produces a LONG/SHORT decision, or none.
pub struct ScoringEngine;

struct RuleOutcome {
    score: f64,
    conditions: HashMap<String, bool>,
}

impl ScoringEngine {
    pub fn evaluate(
        symbol: &str,
        market: Market,
        timeframe: Timeframe,
        candle: &Candle,
        snapshot: &IndicatorSnapshot,
        config: &SignalConfig,
        now: DateTime<Utc>,
    ) -> Result<ScoreResult, ScoringError> {
        let max_score = config.weights.max_score();

        let long_outcome = score_long(snapshot, config);
        let short_outcome = score_short(snapshot, config);

        let confidence_long = if max_score > 0.0 { long_outcome.score / max_score } else { 0.0 };
        let confidence_short = if max_score > 0.0 { short_outcome.score / max_score } else { 0.0 };

        let direction = if confidence_long >= config.min_confidence && confidence_long > confidence_short {
            Some((Direction::Long, confidence_long, long_outcome))
        } else if confidence_short >= config.min_confidence && confidence_short > confidence_long {
            Some((Direction::Short, confidence_short, short_outcome))
        } else {
            None
        };

        let decision = match direction {
            None => None,
            Some((direction, confidence, outcome)) => Some(build_active_signal(
                symbol, market, timeframe, direction, confidence, candle, snapshot, config, &outcome, now,
            )?),
        };

        Ok(ScoreResult {
            confidence_long,
            confidence_short,
            decision,
        })
    }
}

fn score_long(s: &IndicatorSnapshot, cfg: &SignalConfig) -> RuleOutcome {
    let w = &cfg.weights;
    let mut conditions = HashMap::new();
    let mut score = 0.0;

    let mut add = |name: &str, weight: f64, met: bool| {
        conditions.insert(name.to_string(), met);
        if met {
            score += weight;
        }
    };

    add("macd_crossover_up", w.macd_crossover, s.macd.crossed_up());
    let rsi_band = s.rsi.defined && s.rsi.value > cfg.long_rsi_min && s.rsi.value < cfg.long_rsi_max;
    add("rsi_long_band_or_rising", w.rsi_band, rsi_band || s.rsi_rising);
    add("close_above_ema50", w.close_vs_ema50, s.ema50.defined && s.close > s.ema50.value);
    add("adx_above_long_min", w.adx_trend, s.adx.defined && s.adx.adx > cfg.long_adx_min);
    add("heikin_ashi_bullish", w.heikin_ashi, s.heikin_ashi.defined && s.heikin_ashi.bullish);
    add(
        "volume_spike",
        w.volume_spike,
        s.volume.ratio.defined && s.volume.ratio.value >= cfg.long_volume_multiplier,
    );
    add("ema_alignment_bullish", w.ema_alignment, s.emas_bullish_aligned());
    add("plus_di_above_minus_di", w.directional_index, s.adx.defined && s.adx.plus_di > s.adx.minus_di);
    add("supertrend_up", w.supertrend, s.supertrend.defined && s.supertrend.direction == 1);
    add("mfi_below_80_and_rising", w.mfi, s.mfi.defined && s.mfi.value < 80.0 && s.mfi.rising);
    add(
        "psar_below_close",
        w.parabolic_sar,
        s.parabolic_sar.defined && s.parabolic_sar.trend == 1,
    );

    RuleOutcome { score, conditions }
}

fn score_short(s: &IndicatorSnapshot, cfg: &SignalConfig) -> RuleOutcome {
    let w = &cfg.weights;
    let mut conditions = HashMap::new();
    let mut score = 0.0;

    let mut add = |name: &str, weight: f64, met: bool| {
        conditions.insert(name.to_string(), met);
        if met {
            score += weight;
        }
    };

    add("macd_crossover_down", w.macd_crossover, s.macd.crossed_down());
    let rsi_band = s.rsi.defined && s.rsi.value > cfg.short_rsi_min && s.rsi.value < cfg.short_rsi_max;
    add("rsi_short_band_or_falling", w.rsi_band, rsi_band || s.rsi_falling);
    add("close_below_ema50", w.close_vs_ema50, s.ema50.defined && s.close < s.ema50.value);
    add("adx_above_short_min", w.adx_trend, s.adx.defined && s.adx.adx > cfg.short_adx_min);
    add("heikin_ashi_bearish", w.heikin_ashi, s.heikin_ashi.defined && !s.heikin_ashi.bullish);
    add(
        "volume_spike",
        w.volume_spike,
        s.volume.ratio.defined && s.volume.ratio.value >= cfg.short_volume_multiplier,
    );
    add("ema_alignment_bearish", w.ema_alignment, s.emas_bearish_aligned());
    add("minus_di_above_plus_di", w.directional_index, s.adx.defined && s.adx.minus_di > s.adx.plus_di);
    add("supertrend_down", w.supertrend, s.supertrend.defined && s.supertrend.direction == -1);
    add("mfi_above_20_and_falling", w.mfi, s.mfi.defined && s.mfi.value > 20.0 && !s.mfi.rising);
    add(
        "psar_above_close",
        w.parabolic_sar,
        s.parabolic_sar.defined && s.parabolic_sar.trend == -1,
    );

    RuleOutcome { score, conditions }
}

#[allow(clippy::too_many_arguments)]
fn build_active_signal(
    symbol: &str,
    market: Market,
    timeframe: Timeframe,
    direction: Direction,
    confidence: f64,
    candle: &Candle,
    snapshot: &IndicatorSnapshot,
    config: &SignalConfig,
    outcome: &RuleOutcome,
    now: DateTime<Utc>,
) -> Result<ActiveSignal, ScoringError> {
    let entry = candle.close;
    let atr = Decimal::from_f64_retain(snapshot.atr.or_neutral(0.0)).unwrap_or(Decimal::ZERO);

    let (mut sl_mult, mut tp_mult) = (
        Decimal::from_f64_retain(config.sl_atr_multiplier).unwrap_or(Decimal::ZERO),
        Decimal::from_f64_retain(config.tp_atr_multiplier).unwrap_or(Decimal::ZERO),
    );

    if config.use_volatility_aware {
        let scale = VolatilityClass::classify(atr, entry).stop_scale();
        sl_mult *= scale;
        tp_mult *= scale;
    }

    let (sl, tp) = match direction {
        Direction::Long => (entry - sl_mult * atr, entry + tp_mult * atr),
        Direction::Short => (entry + sl_mult * atr, entry - tp_mult * atr),
    };

    if sl <= Decimal::ZERO || tp <= Decimal::ZERO || sl == entry || tp == entry {
        return Err(ScoringError::Unpriceable {
            symbol: symbol.to_string(),
            entry: entry.to_string(),
            sl: sl.to_string(),
            tp: tp.to_string(),
        });
    }

    let matched: Vec<&str> = outcome
        .conditions
        .iter()
        .filter(|(_, met)| **met)
        .map(|(name, _)| name.as_str())
        .collect();
    let mut matched_sorted = matched;
    matched_sorted.sort_unstable();
    let description = format!("{} {} signal: {}", market, direction, matched_sorted.join(", "));

    Ok(ActiveSignal {
        symbol: symbol.to_string(),
        direction,
        market,
        timeframe,
        entry,
        sl,
        tp,
        confidence,
        conditions_met: outcome.conditions.clone(),
        created_at: now,
        last_updated: now,
        description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::candle::CandleSeries;
    use rust_decimal_macros::dec;

    fn bullish_series() -> CandleSeries {
        let mut series = CandleSeries::new(200);
        for i in 0..120 {
            let base = 100.0 + i as f64 * 0.6;
            let open_time = i as i64 * 3_600_000;
            let c = Candle {
                open_time_ms: open_time,
                open: Decimal::from_f64_retain(base).unwrap(),
                high: Decimal::from_f64_retain(base + 1.0).unwrap(),
                low: Decimal::from_f64_retain(base - 0.5).unwrap(),
                close: Decimal::from_f64_retain(base + 0.8).unwrap(),
                volume: if i == 119 { dec!(5000) } else { dec!(100) },
                close_time_ms: open_time + 3_600_000,
            };
            series.update(&[c]);
        }
        series
    }

    #[test]
    fn sustained_uptrend_emits_long_with_priced_sl_tp() {
        let series = bullish_series();
        let snapshot = IndicatorSnapshot::compute(&series).unwrap();
        let candle = *series.latest().unwrap();
        let config = SignalConfig::default();

        let result = ScoringEngine::evaluate(
            "BTCUSDT",
            Market::Spot,
            Timeframe::OneHour,
            &candle,
            &snapshot,
            &config,
            Utc::now(),
        )
        .unwrap();

        assert!(result.confidence_long > result.confidence_short);
        if let Some(signal) = result.decision {
            assert_eq!(signal.direction, Direction::Long);
            assert!(signal.has_valid_price_triple());
        }
    }

    #[test]
    fn flat_market_emits_no_signal() {
        let mut series = CandleSeries::new(200);
        for i in 0..120 {
            let d = dec!(100);
            series.update(&[Candle {
                open_time_ms: i as i64 * 3_600_000,
                open: d,
                high: d,
                low: d,
                close: d,
                volume: dec!(100),
                close_time_ms: i as i64 * 3_600_000 + 3_600_000,
            }]);
        }
        let snapshot = IndicatorSnapshot::compute(&series).unwrap();
        let candle = *series.latest().unwrap();
        let config = SignalConfig::default();

        let result = ScoringEngine::evaluate(
            "BTCUSDT",
            Market::Spot,
            Timeframe::OneHour,
            &candle,
            &snapshot,
            &config,
            Utc::now(),
        )
        .unwrap();
        assert!(result.decision.is_none());
    }

    #[test]
    fn tie_between_directions_emits_nothing() {
        let snapshot = IndicatorSnapshot {
            rsi: crate::indicators::IndicatorValue::undefined(50.0),
            rsi_rising: false,
            rsi_falling: false,
            atr: crate::indicators::IndicatorValue::defined(1.0),
            ema9: crate::indicators::IndicatorValue::undefined(0.0),
            ema21: crate::indicators::IndicatorValue::undefined(0.0),
            ema50: crate::indicators::IndicatorValue::undefined(0.0),
            macd: crate::indicators::macd::MacdValue {
                line: 0.0,
                signal: 0.0,
                histogram: 0.0,
                histogram_prev: 0.0,
                defined: false,
            },
            adx: crate::indicators::adx::AdxValue {
                adx: 0.0,
                plus_di: 0.0,
                minus_di: 0.0,
                defined: false,
            },
            heikin_ashi: crate::indicators::heikin_ashi::HeikinAshiValue {
                ha_open: 0.0,
                ha_close: 0.0,
                bullish: false,
                defined: false,
            },
            supertrend: crate::indicators::supertrend::SuperTrendValue {
                direction: 0,
                level: 0.0,
                defined: false,
            },
            mfi: crate::indicators::mfi::MfiValue {
                value: 50.0,
                rising: false,
                defined: false,
            },
            parabolic_sar: crate::indicators::parabolic_sar::ParabolicSarValue {
                sar: 0.0,
                trend: 0,
                defined: false,
            },
            bollinger: crate::indicators::bollinger::BollingerValue {
                upper: 0.0,
                mid: 0.0,
                lower: 0.0,
                defined: false,
            },
            volume: crate::indicators::volume::VolumeStats {
                avg: 0.0,
                current: 0.0,
                ratio: crate::indicators::IndicatorValue::undefined(1.0),
            },
            close: 100.0,
        };
        let candle = Candle {
            open_time_ms: 0,
            open: dec!(100),
            high: dec!(100),
            low: dec!(100),
            close: dec!(100),
            volume: dec!(10),
            close_time_ms: 60_000,
        };
        let config = SignalConfig::default();
        let result = ScoringEngine::evaluate(
            "BTCUSDT",
            Market::Spot,
            Timeframe::OneHour,
            &candle,
            &snapshot,
            &config,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(result.confidence_long, result.confidence_short);
        assert!(result.decision.is_none());
    }
}
