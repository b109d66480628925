use rand::Rng;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

/// Rolling 60-second request-weight budget shared by every caller of one
/// provider. All mutation of the window happens under a single
/// mutex; callers serialize through `acquire`, never racing each other's
/// view of the window.
pub struct RateLimiter {
    budget: u32,
    window: Mutex<VecDeque<(Instant, u32)>>,
}

const WINDOW: Duration = Duration::from_secs(60);
const BUFFER: Duration = Duration::from_millis(100);

impl RateLimiter {
    pub fn new(max_weight_per_minute: u32) -> Self {
        Self {
            budget: max_weight_per_minute,
            window: Mutex::new(VecDeque::new()),
        }
    }

    /// Blocks until `weight` can be added without exceeding the rolling
    /// budget, then records it. No failure path: callers attach their own
    /// cancellation/timeout around this call.
    pub async fn acquire(&self, weight: u32) {
        loop {
            let wait = {
                let mut window = self.window.lock().await;
                let now = Instant::now();
                evict_expired(&mut window, now);

                let used: u32 = window.iter().map(|(_, w)| w).sum();
                if used + weight <= self.budget {
                    window.push_back((now, weight));
                    None
                } else {
                    let oldest = window.front().map(|(ts, _)| *ts).unwrap_or(now);
                    let elapsed = now.saturating_duration_since(oldest);
                    let remaining = WINDOW.saturating_sub(elapsed);
                    let jitter = Duration::from_millis(rand::rng().random_range(0..50));
                    Some(remaining + BUFFER + jitter)
                }
            };

            match wait {
                None => return,
                Some(duration) => sleep(duration).await,
            }
        }
    }

    /// Non-blocking diagnostics: `(weight used in the current window, age of
    /// the oldest entry still counted)`.
    pub async fn current_usage(&self) -> (u32, Duration) {
        let mut window = self.window.lock().await;
        let now = Instant::now();
        evict_expired(&mut window, now);
        let used: u32 = window.iter().map(|(_, w)| w).sum();
        let age = window
            .front()
            .map(|(ts, _)| now.saturating_duration_since(*ts))
            .unwrap_or_default();
        (used, age)
    }

    pub fn budget(&self) -> u32 {
        self.budget
    }

    /// Clears the window. Test-only per the rule.
    pub async fn reset(&self) {
        self.window.lock().await.clear();
    }
}

fn evict_expired(window: &mut VecDeque<(Instant, u32)>, now: Instant) {
    while let Some(&(ts, _)) = window.front() {
        if now.saturating_duration_since(ts) >= WINDOW {
            window.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_within_budget_does_not_block() {
        let limiter = RateLimiter::new(100);
        let start = Instant::now();
        limiter.acquire(50).await;
        limiter.acquire(50).await;
        assert!(start.elapsed() < Duration::from_millis(50));
        let (used, _) = limiter.current_usage().await;
        assert_eq!(used, 100);
    }

    #[tokio::test]
    async fn reset_clears_the_window() {
        let limiter = RateLimiter::new(10);
        limiter.acquire(10).await;
        limiter.reset().await;
        let (used, _) = limiter.current_usage().await;
        assert_eq!(used, 0);
    }

    #[tokio::test]
    async fn current_usage_evicts_old_entries() {
        let limiter = RateLimiter::new(10);
        limiter.acquire(10).await;
        {
            let mut window = limiter.window.lock().await;
            if let Some(entry) = window.front_mut() {
                entry.0 = Instant::now() - Duration::from_secs(61);
            }
        }
        let (used, _) = limiter.current_usage().await;
        assert_eq!(used, 0);
    }
}
