use crate::domain::candle::{Candle, CandleSeries};

/// `{ADX, +DI, -DI}`. The `ta` crate has no
/// directional-movement indicator, so this is a hand-rolled, from-scratch
/// Wilder's-smoothing implementation replayed over the whole series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdxValue {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
    pub defined: bool,
}

impl AdxValue {
    fn undefined() -> Self {
        Self {
            adx: 0.0,
            plus_di: 0.0,
            minus_di: 0.0,
            defined: false,
        }
    }
}

fn true_range(prev: &Candle, cur: &Candle) -> f64 {
    let hl = cur.high_f64() - cur.low_f64();
    let hc = (cur.high_f64() - prev.close_f64()).abs();
    let lc = (cur.low_f64() - prev.close_f64()).abs();
    hl.max(hc).max(lc)
}

/// Running Wilder sum smoothing used for +DM/-DM/TR: first element is the
/// plain sum of the first `period` values, each subsequent element drops
/// `1/period` of the running sum and adds the new raw value.
fn wilder_sum_smooth(values: &[f64], period: usize) -> Vec<f64> {
    if values.len() < period {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(values.len() - period + 1);
    let mut sum: f64 = values[..period].iter().sum();
    out.push(sum);
    for &v in &values[period..] {
        sum -= sum / period as f64;
        sum += v;
        out.push(sum);
    }
    out
}

/// Running Wilder average smoothing used to turn DX into ADX.
fn wilder_avg_smooth(values: &[f64], period: usize) -> Vec<f64> {
    if values.len() < period {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(values.len() - period + 1);
    let mut avg: f64 = values[..period].iter().sum::<f64>() / period as f64;
    out.push(avg);
    for &v in &values[period..] {
        avg = (avg * (period as f64 - 1.0) + v) / period as f64;
        out.push(avg);
    }
    out
}

pub fn adx_di(series: &CandleSeries, period: usize) -> AdxValue {
    let candles: Vec<Candle> = series.iter().copied().collect();
    if candles.len() < 2 * period + 2 {
        return AdxValue::undefined();
    }

    let mut plus_dm = Vec::with_capacity(candles.len() - 1);
    let mut minus_dm = Vec::with_capacity(candles.len() - 1);
    let mut tr = Vec::with_capacity(candles.len() - 1);

    for w in candles.windows(2) {
        let (prev, cur) = (&w[0], &w[1]);
        let up_move = cur.high_f64() - prev.high_f64();
        let down_move = prev.low_f64() - cur.low_f64();
        let pdm = if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 };
        let mdm = if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 };
        plus_dm.push(pdm);
        minus_dm.push(mdm);
        tr.push(true_range(prev, cur));
    }

    let smoothed_plus_dm = wilder_sum_smooth(&plus_dm, period);
    let smoothed_minus_dm = wilder_sum_smooth(&minus_dm, period);
    let smoothed_tr = wilder_sum_smooth(&tr, period);

    if smoothed_tr.is_empty() {
        return AdxValue::undefined();
    }

    let mut plus_di = Vec::with_capacity(smoothed_tr.len());
    let mut minus_di = Vec::with_capacity(smoothed_tr.len());
    for i in 0..smoothed_tr.len() {
        if smoothed_tr[i] == 0.0 {
            plus_di.push(0.0);
            minus_di.push(0.0);
        } else {
            plus_di.push(100.0 * smoothed_plus_dm[i] / smoothed_tr[i]);
            minus_di.push(100.0 * smoothed_minus_dm[i] / smoothed_tr[i]);
        }
    }

    let dx: Vec<f64> = plus_di
        .iter()
        .zip(minus_di.iter())
        .map(|(p, m)| {
            let sum = p + m;
            if sum == 0.0 { 0.0 } else { 100.0 * (p - m).abs() / sum }
        })
        .collect();

    let adx_series = wilder_avg_smooth(&dx, period);
    if adx_series.is_empty() {
        return AdxValue::undefined();
    }

    AdxValue {
        adx: *adx_series.last().unwrap(),
        plus_di: *plus_di.last().unwrap(),
        minus_di: *minus_di.last().unwrap(),
        defined: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(t: i64, high: i64, low: i64, close: i64) -> Candle {
        Candle {
            open_time_ms: t,
            open: rust_decimal::Decimal::from(close),
            high: rust_decimal::Decimal::from(high),
            low: rust_decimal::Decimal::from(low),
            close: rust_decimal::Decimal::from(close),
            volume: dec!(10),
            close_time_ms: t + 60_000,
        }
    }

    #[test]
    fn insufficient_history_is_undefined() {
        let mut series = CandleSeries::new(80);
        for i in 0..10 {
            series.update(&[candle(i * 60_000, 101, 99, 100)]);
        }
        assert!(!adx_di(&series, 14).defined);
    }

    #[test]
    fn sustained_uptrend_favors_plus_di() {
        let mut series = CandleSeries::new(80);
        for i in 0..40 {
            let base = 100 + i * 2;
            series.update(&[candle(i * 60_000, base + 2, base - 1, base)]);
        }
        let v = adx_di(&series, 14);
        assert!(v.defined);
        assert!(v.plus_di > v.minus_di);
        assert!(v.adx >= 0.0 && v.adx <= 100.0);
    }
}
