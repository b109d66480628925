use crate::config::{SignalConfig, SignalConfigRegistry};
use crate::domain::market::Market;
use crate::domain::signal::{ActiveSignal, InvalidationReason, SignalEvent};
use crate::scoring::ScoreResult;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;

/// Authoritative table of [`ActiveSignal`]s and the create/update/
/// invalidate/supersede/expire state machine that guards it.
///
/// In practice only one direction can win a scan for a given symbol, so
/// the table is keyed by `(symbol, market)` — not the full `(symbol,
/// direction, market)` identity triple — which is what makes
/// the reversal rule ("new direction ≠ old direction: delete old, insert
/// new") a lookup rather than a separate reconciliation pass across two
/// keys. This still satisfies invariant 2 (at most one active
/// signal per identity key) as a consequence: two directions for the same
/// `(symbol, market)` are never both resident at once.
pub struct SignalLifecycleManager {
    active: DashMap<(String, Market), ActiveSignal>,
}

impl SignalLifecycleManager {
    pub fn new() -> Self {
        Self {
            active: DashMap::new(),
        }
    }

    /// One symbol's reconciliation for one `(market, timeframe)` scan
    /// cycle. `result` carries both directions' re-scored
    /// confidence so an existing signal can be checked for invalidation
    /// even on a cycle where neither direction wins outright.
    pub fn reconcile(&self, symbol: &str, market: Market, result: &ScoreResult, now: DateTime<Utc>, config: &SignalConfig) -> Vec<SignalEvent> {
        let key = (symbol.to_string(), market);
        let existing = self.active.get(&key).map(|e| e.clone());

        match (existing, &result.decision) {
            (None, None) => Vec::new(),

            (None, Some(new)) => {
                self.active.insert(key, new.clone());
                vec![SignalEvent::created(new.clone(), now)]
            }

            (Some(old), None) => self.reconcile_no_new_decision(&key, old, result, now, config),

            (Some(old), Some(new)) => self.reconcile_with_new_decision(&key, old, new.clone(), now, config),
        }
    }

    fn reconcile_no_new_decision(
        &self,
        key: &(String, Market),
        old: ActiveSignal,
        result: &ScoreResult,
        now: DateTime<Utc>,
        config: &SignalConfig,
    ) -> Vec<SignalEvent> {
        let rescored = result.confidence_for(old.direction);
        let invalidation_floor = config.min_confidence * config.invalidation_confidence_ratio;

        if rescored < invalidation_floor {
            self.active.remove(key);
            return vec![SignalEvent::deleted(old, InvalidationReason::Invalidated, now)];
        }

        if minutes_since(old.last_updated, now) >= config.signal_expiry_minutes {
            self.active.remove(key);
            return vec![SignalEvent::deleted(old, InvalidationReason::Expired, now)];
        }

        Vec::new()
    }

    fn reconcile_with_new_decision(
        &self,
        key: &(String, Market),
        old: ActiveSignal,
        new: ActiveSignal,
        now: DateTime<Utc>,
        config: &SignalConfig,
    ) -> Vec<SignalEvent> {
        let p_new = new.timeframe.priority();
        let p_old = old.timeframe.priority();

        if p_new < p_old {
            // Lower-timeframe signal never displaces a higher one.
            return Vec::new();
        }

        if p_new > p_old {
            self.active.insert(key.clone(), new.clone());
            return vec![
                SignalEvent::deleted(old, InvalidationReason::Superseded, now),
                SignalEvent::created(new, now),
            ];
        }

        // Same timeframe priority.
        if new.direction != old.direction {
            self.active.insert(key.clone(), new.clone());
            return vec![
                SignalEvent::deleted(old, InvalidationReason::Reversed, now),
                SignalEvent::created(new, now),
            ];
        }

        let confidence_delta = (new.confidence - old.confidence).abs();
        let material_price_change = old.prices_changed_materially(new.entry, new.sl, new.tp);

        if confidence_delta >= config.update_confidence_delta || material_price_change {
            let mut updated = new;
            updated.created_at = old.created_at;
            self.active.insert(key.clone(), updated.clone());
            vec![SignalEvent::updated(updated, now)]
        } else {
            // Liveness-only refresh: keep the old values, bump the clock,
            // emit nothing.
            let mut bumped = old;
            bumped.last_updated = now;
            self.active.insert(key.clone(), bumped);
            Vec::new()
        }
    }

    /// Cheap cleanup invoked at the start of every scheduler tick (spec
    /// §4.7 `sweep`): removes any signal past its configured TTL with no
    /// recent update, independent of whether a scan touched it this cycle.
    pub fn sweep(&self, now: DateTime<Utc>, registry: &SignalConfigRegistry) -> Vec<SignalEvent> {
        let snapshot: Vec<(String, Market)> = self.active.iter().map(|e| e.key().clone()).collect();
        let mut events = Vec::new();

        for key in snapshot {
            let Some(signal) = self.active.get(&key).map(|e| e.clone()) else {
                continue;
            };
            let config = registry.get(signal.market, signal.timeframe);
            if minutes_since(signal.last_updated, now) >= config.signal_expiry_minutes {
                self.active.remove(&key);
                events.push(SignalEvent::deleted(signal, InvalidationReason::Expired, now));
            }
        }

        events
    }

    pub fn active_signals(&self) -> Vec<ActiveSignal> {
        self.active.iter().map(|e| e.value().clone()).collect()
    }

    /// `status` support: counts of active signals per
    /// `(market, timeframe)`.
    pub fn counts_by_market_timeframe(&self) -> HashMap<(Market, crate::domain::timeframe::Timeframe), usize> {
        let mut counts = HashMap::new();
        for entry in self.active.iter() {
            let signal = entry.value();
            *counts.entry((signal.market, signal.timeframe)).or_insert(0) += 1;
        }
        counts
    }
}

impl Default for SignalLifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

fn minutes_since(then: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - then).num_minutes()
}
