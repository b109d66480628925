use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// ATR-ratio volatility regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolatilityClass {
    Low,
    Medium,
    High,
}

impl VolatilityClass {
    const LOW_UPPER_BPS: Decimal = dec!(100); // ATR/price < 1.00%
    const MEDIUM_UPPER_BPS: Decimal = dec!(300); // ATR/price < 3.00%

    /// Classify from `atr / price` expressed as a ratio (e.g. 0.015 for 1.5%).
    pub fn classify(atr: Decimal, price: Decimal) -> VolatilityClass {
        if price.is_zero() {
            return VolatilityClass::Medium;
        }
        let bps = (atr / price).abs() * dec!(10000);
        if bps < Self::LOW_UPPER_BPS {
            VolatilityClass::Low
        } else if bps < Self::MEDIUM_UPPER_BPS {
            VolatilityClass::Medium
        } else {
            VolatilityClass::High
        }
    }

    /// Multiplier applied on top of the configured SL/TP ATR multipliers
    /// when `use_volatility_aware` is set. Calmer markets get tighter stops,
    /// choppier markets get more room, so a fixed ATR multiple doesn't get
    /// stopped out by noise in equally fast regimes.
    pub fn stop_scale(&self) -> Decimal {
        match self {
            VolatilityClass::Low => dec!(0.85),
            VolatilityClass::Medium => dec!(1.0),
            VolatilityClass::High => dec!(1.25),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_low_medium_high() {
        assert_eq!(
            VolatilityClass::classify(dec!(50), dec!(10000)),
            VolatilityClass::Low
        );
        assert_eq!(
            VolatilityClass::classify(dec!(200), dec!(10000)),
            VolatilityClass::Medium
        );
        assert_eq!(
            VolatilityClass::classify(dec!(500), dec!(10000)),
            VolatilityClass::High
        );
    }

    #[test]
    fn zero_price_defaults_to_medium() {
        assert_eq!(
            VolatilityClass::classify(dec!(10), dec!(0)),
            VolatilityClass::Medium
        );
    }
}
