use super::market::Market;
use super::timeframe::Timeframe;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// Identity key for signal deduplication: at most one active
/// signal exists per `(symbol, direction, market)` at any time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignalKey {
    pub symbol: String,
    pub direction: Direction,
    pub market: Market,
}

impl SignalKey {
    pub fn new(symbol: impl Into<String>, direction: Direction, market: Market) -> Self {
        Self {
            symbol: symbol.into(),
            direction,
            market,
        }
    }
}

/// A currently-valid signal held by the lifecycle manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveSignal {
    pub symbol: String,
    pub direction: Direction,
    pub market: Market,
    pub timeframe: Timeframe,
    pub entry: Decimal,
    pub sl: Decimal,
    pub tp: Decimal,
    pub confidence: f64,
    pub conditions_met: HashMap<String, bool>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub description: String,
}

impl ActiveSignal {
    pub fn key(&self) -> SignalKey {
        SignalKey::new(self.symbol.clone(), self.direction, self.market)
    }

    /// Invariant: sl/entry/tp are all distinct and on the correct
    /// side of entry for the signal's direction.
    pub fn has_valid_price_triple(&self) -> bool {
        if self.sl == self.entry || self.tp == self.entry || self.sl == self.tp {
            return false;
        }
        match self.direction {
            Direction::Long => self.sl < self.entry && self.tp > self.entry,
            Direction::Short => self.sl > self.entry && self.tp < self.entry,
        }
    }

    /// Whether `other`'s entry/sl/tp differ "materially" from this signal's.
    /// A basis-point threshold avoids floating noise triggering spurious
    /// `updated` events.
    pub fn prices_changed_materially(&self, entry: Decimal, sl: Decimal, tp: Decimal) -> bool {
        const MATERIAL_BPS: Decimal = rust_decimal_macros::dec!(5); // 0.05%
        let rel_change = |a: Decimal, b: Decimal| -> bool {
            if a.is_zero() {
                return b != a;
            }
            ((a - b) / a).abs() * rust_decimal_macros::dec!(10000) >= MATERIAL_BPS
        };
        rel_change(self.entry, entry) || rel_change(self.sl, sl) || rel_change(self.tp, tp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidationReason {
    Invalidated,
    Expired,
    Superseded,
    Reversed,
}

impl fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InvalidationReason::Invalidated => "invalidated",
            InvalidationReason::Expired => "expired",
            InvalidationReason::Superseded => "superseded",
            InvalidationReason::Reversed => "reversed",
        };
        write!(f, "{}", s)
    }
}

/// Wire-format lifecycle event, emitted by the lifecycle
/// manager for both the broadcast and durable `EventSink` consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalEvent {
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<InvalidationReason>,
    pub ts: DateTime<Utc>,
    pub signal: ActiveSignal,
}

impl SignalEvent {
    pub fn created(signal: ActiveSignal, ts: DateTime<Utc>) -> Self {
        Self {
            kind: EventKind::Created,
            reason: None,
            ts,
            signal,
        }
    }

    pub fn updated(signal: ActiveSignal, ts: DateTime<Utc>) -> Self {
        Self {
            kind: EventKind::Updated,
            reason: None,
            ts,
            signal,
        }
    }

    pub fn deleted(signal: ActiveSignal, reason: InvalidationReason, ts: DateTime<Utc>) -> Self {
        Self {
            kind: EventKind::Deleted,
            reason: Some(reason),
            ts,
            signal,
        }
    }

    /// Idempotency key for the durable sink: at-least-once
    /// delivery is safe to dedupe on `(kind, identity, ts)`.
    pub fn idempotency_key(&self) -> String {
        format!(
            "{:?}:{}:{:?}:{:?}:{}",
            self.kind,
            self.signal.symbol,
            self.signal.direction,
            self.signal.market,
            self.ts.timestamp_millis()
        )
    }
}
