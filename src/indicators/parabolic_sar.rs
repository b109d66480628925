use crate::domain::candle::{Candle, CandleSeries};

/// `{sar, trend}`. Wilder's
/// stop-and-reverse trailing indicator; not in the `ta` crate, hand-rolled
/// and replayed over the whole series since each step depends on the prior
/// extreme point and acceleration factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParabolicSarValue {
    pub sar: f64,
    pub trend: i8,
    pub defined: bool,
}

impl ParabolicSarValue {
    fn undefined() -> Self {
        Self {
            sar: 0.0,
            trend: 0,
            defined: false,
        }
    }
}

pub fn parabolic_sar(series: &CandleSeries, step: f64, max: f64) -> ParabolicSarValue {
    let candles: Vec<Candle> = series.iter().copied().collect();
    if candles.len() < 2 {
        return ParabolicSarValue::undefined();
    }

    let mut trend: i8 = if candles[1].close_f64() >= candles[0].close_f64() { 1 } else { -1 };
    let mut sar = if trend == 1 { candles[0].low_f64() } else { candles[0].high_f64() };
    let mut ep = if trend == 1 { candles[0].high_f64() } else { candles[0].low_f64() };
    let mut af = step;

    for i in 1..candles.len() {
        let cur = &candles[i];
        let prior_low_1 = candles[i - 1].low_f64();
        let prior_high_1 = candles[i - 1].high_f64();
        let prior_low_2 = if i >= 2 { candles[i - 2].low_f64() } else { prior_low_1 };
        let prior_high_2 = if i >= 2 { candles[i - 2].high_f64() } else { prior_high_1 };

        let mut next_sar = sar + af * (ep - sar);

        if trend == 1 {
            next_sar = next_sar.min(prior_low_1).min(prior_low_2);
            if cur.low_f64() < next_sar {
                trend = -1;
                next_sar = ep;
                ep = cur.low_f64();
                af = step;
            } else if cur.high_f64() > ep {
                ep = cur.high_f64();
                af = (af + step).min(max);
            }
        } else {
            next_sar = next_sar.max(prior_high_1).max(prior_high_2);
            if cur.high_f64() > next_sar {
                trend = 1;
                next_sar = ep;
                ep = cur.high_f64();
                af = step;
            } else if cur.low_f64() < ep {
                ep = cur.low_f64();
                af = (af + step).min(max);
            }
        }

        sar = next_sar;
    }

    ParabolicSarValue {
        sar,
        trend,
        defined: true,
    }
}
