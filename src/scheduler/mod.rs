use crate::scan::ScanTask;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Distinguishes scheduled ticks for the at-most-one-overlap guard (spec
/// §4.10): the guard key is `(task_kind, market, timeframe)`, so a scan and
/// a health check never contend with each other even if they happen to
/// land in the same second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Scan,
    SweepExpiredSignals,
    HealthCheck,
}

const SCAN_TIMING_TOLERANCE: Duration = Duration::from_secs(10);
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(30);
const CANCELLATION_DRAIN_WINDOW: Duration = Duration::from_secs(5);

/// How far past each timeframe boundary a recurring tick fires (spec
/// §4.10: forex/commodities run at `:10` past the boundary so their scan
/// always trails the crypto scan for the same timeframe).
fn boundary_delay_secs(period_secs: i64, offset_secs: i64, now: DateTime<Utc>) -> Duration {
    let period = period_secs.max(1);
    let now_secs = now.timestamp();
    let phase = ((now_secs - offset_secs) % period + period) % period;
    let remaining = if phase == 0 { 0 } else { period - phase };
    Duration::from_secs(remaining as u64)
}

/// Cooperative cancellation flag shared between the scheduler and a
/// running tick loop. Not `tokio_util::CancellationToken` — a plain
/// `AtomicBool` checked between await points is the whole contract spec
/// §4.10/§5 ask for, and it is what the loop bodies below actually poll.
#[derive(Clone)]
struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }
    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// RAII guard enforcing "at most one instance of this `(task_kind,
/// market, timeframe)` running at a time". A tick that finds
/// the flag already held skips itself and is counted as a miss rather
/// than queued.
struct OverlapGuard {
    flag: Arc<AtomicBool>,
}

impl OverlapGuard {
    fn try_acquire(flag: Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for OverlapGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Declarative schedule table driving every `ScanTask` plus
/// the two housekeeping ticks. Owns one `tokio` task per schedule row;
/// `shutdown` cancels them cooperatively and waits up to 30s before
/// force-aborting stragglers.
pub struct Scheduler {
    overlap_flags: DashMap<(TaskKind, String, String), Arc<AtomicBool>>,
    handles: Vec<JoinHandle<()>>,
    cancel: CancelFlag,
    misses: Arc<DashMap<(TaskKind, String, String), u64>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            overlap_flags: DashMap::new(),
            handles: Vec::new(),
            cancel: CancelFlag::new(),
            misses: Arc::new(DashMap::new()),
        }
    }

    fn guard_flag(&self, kind: TaskKind, market: &str, timeframe: &str) -> Arc<AtomicBool> {
        self.overlap_flags
            .entry((kind, market.to_string(), timeframe.to_string()))
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone()
    }

    /// Registers a recurring scan tick for one `(market, timeframe)`.
    /// `boundary_offset_secs` is 0 for crypto, 600 for forex/commodities.
    pub fn schedule_scan(
        &mut self,
        task: Arc<ScanTask>,
        period: Duration,
        boundary_offset_secs: i64,
        metrics: Arc<crate::metrics::MetricsRegistry>,
    ) {
        let market = task.market().to_string();
        let timeframe = task.timeframe().to_string();
        let key_label = (TaskKind::Scan, market.clone(), timeframe.clone());
        let flag = self.guard_flag(TaskKind::Scan, &market, &timeframe);
        let cancel = self.cancel.clone();
        let misses = self.misses.clone();
        let soft_deadline = period * 2;

        let handle = tokio::spawn(async move {
            loop {
                let delay = boundary_delay_secs(period.as_secs() as i64, boundary_offset_secs, Utc::now());
                if !sleep_cancellable(delay, &cancel).await {
                    break;
                }
                if cancel.is_cancelled() {
                    break;
                }

                let scheduled_for = Utc::now();
                match OverlapGuard::try_acquire(flag.clone()) {
                    None => {
                        *misses.entry(key_label.clone()).or_insert(0) += 1;
                        warn!(market = %market, timeframe = %timeframe, "scan tick skipped: previous cycle still running");
                    }
                    Some(_guard) => {
                        let lateness = (Utc::now() - scheduled_for).to_std().unwrap_or_default();
                        if lateness > SCAN_TIMING_TOLERANCE {
                            warn!(market = %market, timeframe = %timeframe, ?lateness, "scan tick started outside its timing tolerance");
                        }
                        let report = task.run_with_retry(soft_deadline).await;
                        metrics.record_cycle(&report);
                    }
                }
            }
            info!(market = %market, timeframe = %timeframe, "scan schedule loop exited");
        });

        self.handles.push(handle);
    }

    /// `sweep_expired_signals`: every 5 minutes, independent
    /// of whether any scan touched a given symbol this cycle.
    pub fn schedule_sweep(
        &mut self,
        lifecycle: Arc<crate::lifecycle::SignalLifecycleManager>,
        registry: Arc<crate::config::SignalConfigRegistry>,
        period: Duration,
    ) {
        let flag = self.guard_flag(TaskKind::SweepExpiredSignals, "*", "*");
        let cancel = self.cancel.clone();

        let handle = tokio::spawn(async move {
            loop {
                if !sleep_cancellable(period, &cancel).await || cancel.is_cancelled() {
                    break;
                }
                if let Some(_guard) = OverlapGuard::try_acquire(flag.clone()) {
                    let events = lifecycle.sweep(Utc::now(), &registry);
                    if !events.is_empty() {
                        info!(count = events.len(), "periodic sweep expired signals");
                    }
                }
            }
        });

        self.handles.push(handle);
    }

    /// `health_check`: every 10 minutes, reports provider
    /// rate-limiter headroom and lifecycle table size via the supplied
    /// closure so the scheduler stays decoupled from `metrics`' shape.
    pub fn schedule_health_check<F>(&mut self, period: Duration, check: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let flag = self.guard_flag(TaskKind::HealthCheck, "*", "*");
        let cancel = self.cancel.clone();

        let handle = tokio::spawn(async move {
            loop {
                if !sleep_cancellable(period, &cancel).await || cancel.is_cancelled() {
                    break;
                }
                if let Some(_guard) = OverlapGuard::try_acquire(flag.clone()) {
                    check();
                }
            }
        });

        self.handles.push(handle);
    }

    pub fn miss_count(&self, kind: TaskKind, market: &str, timeframe: &str) -> u64 {
        self.misses
            .get(&(kind, market.to_string(), timeframe.to_string()))
            .map(|v| *v)
            .unwrap_or(0)
    }

    /// Stops issuing new ticks and waits for in-flight ones to finish.
    /// In-flight HTTP fetches get `CANCELLATION_DRAIN_WINDOW`
    /// to unwind cooperatively before the hard abort.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        tokio::time::sleep(CANCELLATION_DRAIN_WINDOW).await;

        let handles = std::mem::take(&mut self.handles);
        let join_all = futures::future::join_all(handles.into_iter().map(|h| async move { let _ = h.await; }));
        if tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, join_all).await.is_err() {
            warn!("scheduler shutdown grace period elapsed; remaining tasks were force-aborted by process exit");
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Sleeps for `duration`, waking early (and returning `false`) if
/// cancellation is requested mid-sleep. Polls in small slices rather than
/// one long `tokio::time::sleep` so shutdown is observed promptly.
async fn sleep_cancellable(duration: Duration, cancel: &CancelFlag) -> bool {
    const SLICE: Duration = Duration::from_millis(200);
    let mut remaining = duration;
    while remaining > Duration::ZERO {
        if cancel.is_cancelled() {
            return false;
        }
        let step = remaining.min(SLICE);
        tokio::time::sleep(step).await;
        remaining = remaining.saturating_sub(step);
    }
    !cancel.is_cancelled()
}
