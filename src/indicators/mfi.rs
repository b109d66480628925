use crate::domain::candle::CandleSeries;

/// Money-Flow Index ∈ [0,100]. Volume-weighted
/// RSI variant; not in the `ta` crate, so hand-rolled from the typical-price
/// formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MfiValue {
    pub value: f64,
    pub rising: bool,
    pub defined: bool,
}

impl MfiValue {
    fn undefined() -> Self {
        Self {
            value: 50.0,
            rising: false,
            defined: false,
        }
    }
}

fn typical_price(c: &crate::domain::candle::Candle) -> f64 {
    (c.high_f64() + c.low_f64() + c.close_f64()) / 3.0
}

/// Computes MFI for every index from `period` onward, so the caller can
/// compare the last two values to determine "rising".
fn mfi_series(candles: &[crate::domain::candle::Candle], period: usize) -> Vec<f64> {
    if candles.len() < period + 1 {
        return Vec::new();
    }
    let typical: Vec<f64> = candles.iter().map(typical_price).collect();
    let raw_flow: Vec<f64> = typical
        .iter()
        .zip(candles.iter())
        .map(|(tp, c)| tp * c.volume_f64())
        .collect();

    let mut out = Vec::with_capacity(candles.len() - period);
    for i in period..candles.len() {
        let mut positive = 0.0;
        let mut negative = 0.0;
        for j in (i - period + 1)..=i {
            if typical[j] > typical[j - 1] {
                positive += raw_flow[j];
            } else if typical[j] < typical[j - 1] {
                negative += raw_flow[j];
            }
        }
        let mfi = if negative == 0.0 {
            100.0
        } else {
            let ratio = positive / negative;
            100.0 - 100.0 / (1.0 + ratio)
        };
        out.push(mfi);
    }
    out
}

pub fn mfi(series: &CandleSeries, period: usize) -> MfiValue {
    let candles: Vec<_> = series.iter().copied().collect();
    let values = mfi_series(&candles, period);
    match values.last() {
        None => MfiValue::undefined(),
        Some(&last) => {
            let rising = values.len() >= 2 && last > values[values.len() - 2];
            MfiValue {
                value: last,
                rising,
                defined: true,
            }
        }
    }
}
