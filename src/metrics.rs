//! In-memory counters backing the `status` administrative operation
//!. Every field here is something an operator would want on
//! a dashboard or a health-check page; nothing here is persisted.

use crate::domain::market::Market;
use crate::domain::timeframe::Timeframe;
use crate::scan::ScanCycleReport;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::time::Duration;

/// Rolling counters for one `(market, timeframe)` scan task.
#[derive(Debug, Clone, Default)]
pub struct TaskMetrics {
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_duration: Option<Duration>,
    pub total_cycles: u64,
    pub total_symbols_failed: u64,
    pub total_signals_created: u64,
    pub total_signals_updated: u64,
    pub total_signals_deleted: u64,
}

/// Point-in-time answer to `status`: signal counts per
/// `(market, timeframe)`, per-task scan health, and rate-limiter headroom.
#[derive(Debug, Clone, Default)]
pub struct StatusSnapshot {
    pub active_signal_counts: HashMap<(Market, Timeframe), usize>,
    pub task_metrics: HashMap<(Market, Timeframe), TaskMetrics>,
    pub rate_limiter_usage: HashMap<String, (u32, Duration)>,
}

/// Process-wide metrics sink. Scan tasks report into it after every
/// cycle; `status` reads a consistent snapshot back out.
pub struct MetricsRegistry {
    tasks: DashMap<(Market, Timeframe), TaskMetrics>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self { tasks: DashMap::new() }
    }

    /// Called once per `ScanTask` cycle.
    pub fn record_cycle(&self, report: &ScanCycleReport) {
        let (Some(market), Some(timeframe)) = (report.market, report.timeframe) else {
            return;
        };
        let mut entry = self.tasks.entry((market, timeframe)).or_default();
        entry.total_cycles += 1;
        entry.total_symbols_failed += report.symbols_failed as u64;
        entry.total_signals_created += report.signals_created as u64;
        entry.total_signals_updated += report.signals_updated as u64;
        entry.total_signals_deleted += report.signals_deleted as u64;
        entry.last_duration = Some(report.duration);
        if report.symbols_ok > 0 {
            entry.last_success_at = Some(Utc::now());
        }
    }

    pub fn task_metrics(&self) -> HashMap<(Market, Timeframe), TaskMetrics> {
        self.tasks.iter().map(|e| (*e.key(), e.value().clone())).collect()
    }

    /// Combines the task-level counters kept here with the
    /// lifecycle manager's live table and each provider's rate-limiter
    /// headroom into the `status` answer.
    pub async fn status(
        &self,
        lifecycle: &crate::lifecycle::SignalLifecycleManager,
        rate_limiters: &HashMap<String, std::sync::Arc<crate::rate_limiter::RateLimiter>>,
    ) -> StatusSnapshot {
        let mut rate_limiter_usage = HashMap::new();
        for (name, limiter) in rate_limiters {
            rate_limiter_usage.insert(name.clone(), limiter.current_usage().await);
        }

        StatusSnapshot {
            active_signal_counts: lifecycle.counts_by_market_timeframe(),
            task_metrics: self.task_metrics(),
            rate_limiter_usage,
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
