//! Retention sweeping: bounds memory by dropping stale traffic and violations.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::RetentionConfig;
use crate::ratelimit::RateLimiter;

/// What a cleanup pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub identifiers_removed: usize,
    pub violations_removed: usize,
    pub expired_blocks_removed: usize,
}

impl RateLimiter {
    /// Drop events and violations older than `older_than_days` and forget
    /// identifiers with no remaining events.
    ///
    /// Admission decisions do not depend on sweeping; this only frees memory.
    pub fn cleanup(&self, older_than_days: u32) -> CleanupReport {
        let now = self.now();
        let now_secs = self.now_secs_lossy();
        let cutoff_secs = now_secs.saturating_sub(u64::from(older_than_days) * 86_400);
        let cutoff = self.lookback(Duration::days(i64::from(older_than_days)));

        let before = self.store().len();
        self.store().retain(|_, window| {
            window.prune(now_secs);
            window.drop_before(cutoff_secs);
            !window.is_empty_at(now_secs)
        });

        let report = CleanupReport {
            identifiers_removed: before.saturating_sub(self.store().len()),
            violations_removed: self.violation_log().drop_before(cutoff),
            expired_blocks_removed: self.blocklist().purge_expired(now),
        };

        info!(
            older_than_days = older_than_days,
            identifiers_removed = report.identifiers_removed,
            violations_removed = report.violations_removed,
            expired_blocks_removed = report.expired_blocks_removed,
            "Retention cleanup complete"
        );
        report
    }
}

/// Run cleanup every `interval` until `shutdown` resolves.
pub async fn run_sweeper<F>(
    limiter: Arc<RateLimiter>,
    interval: StdDuration,
    older_than_days: u32,
    shutdown: F,
) where
    F: Future<Output = ()> + Send,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    info!(
        interval_secs = interval.as_secs(),
        older_than_days = older_than_days,
        "Retention sweeper started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                limiter.cleanup(older_than_days);
            }
            _ = &mut shutdown => {
                debug!("Retention sweeper stopping");
                break;
            }
        }
    }
}

/// Spawn the sweeper on the current runtime using configured settings.
pub fn spawn_sweeper<F>(
    limiter: Arc<RateLimiter>,
    config: &RetentionConfig,
    shutdown: F,
) -> tokio::task::JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(run_sweeper(
        limiter,
        StdDuration::from_secs(config.interval_secs),
        config.older_than_days,
        shutdown,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::BouncerConfig;
    use crate::ratelimit::{LimitPolicy, LimitType};

    const T0: i64 = 1_700_000_000;

    fn limiter() -> (Arc<RateLimiter>, ManualClock) {
        let clock = ManualClock::at_secs(T0);
        let limiter =
            RateLimiter::with_clock(&BouncerConfig::default(), Arc::new(clock.clone())).unwrap();
        (Arc::new(limiter), clock)
    }

    #[test]
    fn test_cleanup_removes_idle_identifiers() {
        let (limiter, clock) = limiter();
        limiter.check("old", LimitType::Ip).unwrap();
        clock.advance_secs(2 * 86_400);
        limiter.check("fresh", LimitType::Ip).unwrap();

        let report = limiter.cleanup(7);
        assert_eq!(report.identifiers_removed, 1);
        assert_eq!(limiter.tracked_identifiers(), 1);

        let now = (T0 + 2 * 86_400) as u64;
        let oldest = limiter.store().read("fresh", |w| w.oldest_at(now)).flatten();
        assert!(oldest.unwrap() >= now - 7 * 86_400);
    }

    #[test]
    fn test_cleanup_keeps_recent_traffic() {
        let (limiter, clock) = limiter();
        limiter.check("a", LimitType::Ip).unwrap();
        clock.advance_secs(2 * 3_600);

        assert_eq!(limiter.cleanup(1), CleanupReport::default());
        assert_eq!(limiter.identifier_usage("a", 24).total_requests, 1);
    }

    #[test]
    fn test_cleanup_drops_old_violations() {
        let (limiter, clock) = limiter();
        limiter
            .set_custom_limit("a", LimitType::Ip, LimitPolicy::new(1, 10, 100))
            .unwrap();
        limiter.check("a", LimitType::Ip).unwrap();
        limiter.check("a", LimitType::Ip).unwrap();
        clock.advance_secs(8 * 86_400);

        let report = limiter.cleanup(7);
        assert_eq!(report.violations_removed, 1);
        assert_eq!(report.identifiers_removed, 1);
        assert!(limiter.violations(24 * 30, None).is_empty());
    }

    #[test]
    fn test_cleanup_with_huge_horizon_keeps_everything() {
        let (limiter, clock) = limiter();
        limiter
            .set_custom_limit("a", LimitType::Ip, LimitPolicy::new(1, 10, 100))
            .unwrap();
        limiter.check("a", LimitType::Ip).unwrap();
        limiter.check("a", LimitType::Ip).unwrap();
        clock.advance_secs(3_600);

        assert_eq!(limiter.cleanup(u32::MAX), CleanupReport::default());
        assert_eq!(limiter.tracked_identifiers(), 1);
        assert_eq!(limiter.violations(24, None).len(), 1);
    }

    #[tokio::test]
    async fn test_sweeper_runs_until_shutdown() {
        let (limiter, clock) = limiter();
        limiter.check("a", LimitType::Ip).unwrap();
        clock.advance_secs(2 * 86_400);

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(run_sweeper(
            limiter.clone(),
            StdDuration::from_millis(10),
            1,
            async move {
                let _ = rx.await;
            },
        ));

        tokio::time::sleep(StdDuration::from_millis(50)).await;
        assert_eq!(limiter.tracked_identifiers(), 0);

        tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
