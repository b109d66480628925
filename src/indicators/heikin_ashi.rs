use crate::domain::candle::CandleSeries;

/// `{ha_open, ha_close, bullish}` for the most recent candle. Heikin-Ashi candles are recursive (each HA open
/// depends on the previous HA candle), so the whole series must be replayed
/// from its first candle to get a correct last value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeikinAshiValue {
    pub ha_open: f64,
    pub ha_close: f64,
    pub bullish: bool,
    pub defined: bool,
}

impl HeikinAshiValue {
    fn undefined() -> Self {
        Self {
            ha_open: 0.0,
            ha_close: 0.0,
            bullish: false,
            defined: false,
        }
    }
}

pub fn heikin_ashi_last(series: &CandleSeries) -> HeikinAshiValue {
    let mut iter = series.iter();
    let first = match iter.next() {
        Some(c) => c,
        None => return HeikinAshiValue::undefined(),
    };

    let mut ha_open = (first.open_f64() + first.close_f64()) / 2.0;
    let mut ha_close = (first.open_f64() + first.high_f64() + first.low_f64() + first.close_f64()) / 4.0;

    for candle in iter {
        let next_close = (candle.open_f64() + candle.high_f64() + candle.low_f64() + candle.close_f64()) / 4.0;
        let next_open = (ha_open + ha_close) / 2.0;
        ha_open = next_open;
        ha_close = next_close;
    }

    HeikinAshiValue {
        ha_open,
        ha_close,
        bullish: ha_close > ha_open,
        defined: true,
    }
}
