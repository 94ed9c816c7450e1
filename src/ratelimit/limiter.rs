//! Core rate limiter implementation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, trace, warn};

use super::abuse::{self, AbuseSuspect};
use super::backend::AdmissionBackend;
use super::blocklist::{BlockEntry, BlockList, BlockOrigin};
use super::decision::{Decision, Remaining};
use super::policy::{LimitPolicy, LimitType, PolicyResolver};
use super::store::EventStore;
use super::violations::{Violation, ViolationLog};
use super::window::Period;
use crate::clock::{Clock, SystemClock};
use crate::config::{AbuseConfig, AnalyticsConfig, BouncerConfig};
use crate::error::{BouncerError, Result};

/// Reason recorded for manual blocks without an explicit reason.
const DEFAULT_BLOCK_REASON: &str = "manual block";

enum Outcome {
    Admitted(Remaining),
    Exceeded { period: Period, count: u64, limit: u64 },
}

/// The admission-control service object.
///
/// Thread-safe; the host process owns one instance and shares it via `Arc`.
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    store: EventStore,
    policies: PolicyResolver,
    blocklist: BlockList,
    violations: ViolationLog,
    abuse: AbuseConfig,
    analytics: AnalyticsConfig,
}

impl RateLimiter {
    /// Create a rate limiter with default settings and the system clock.
    pub fn new() -> Self {
        Self::build(&BouncerConfig::default(), Arc::new(SystemClock::new()))
    }

    /// Create a rate limiter from configuration, installing configured overrides.
    pub fn from_config(config: &BouncerConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Create a rate limiter that reads time from `clock`.
    pub fn with_clock(config: &BouncerConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let limiter = Self::build(config, clock);
        for o in &config.limits.overrides {
            limiter
                .policies
                .set_custom_limit(&o.identifier, o.limit_type, o.policy)?;
        }
        Ok(limiter)
    }

    fn build(config: &BouncerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            store: EventStore::new(),
            policies: PolicyResolver::new(config.limits.default),
            blocklist: BlockList::new(),
            violations: ViolationLog::new(config.violations.capacity),
            abuse: config.abuse.clone(),
            analytics: config.analytics.clone(),
        }
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// The instant `by` before now, saturating at the earliest representable time.
    pub(crate) fn lookback(&self, by: Duration) -> DateTime<Utc> {
        self.now()
            .checked_sub_signed(by)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Current time in Unix seconds; read paths clamp pre-epoch clocks to zero.
    pub(crate) fn now_secs_lossy(&self) -> u64 {
        u64::try_from(self.now().timestamp()).unwrap_or(0)
    }

    /// Decide whether `identifier` may proceed, recording the outcome.
    ///
    /// Blocked identifiers are rejected before any counting. Tiers are
    /// evaluated finest first and the first exhausted tier is reported.
    /// Quota outcomes are never errors; `Err` means the limiter itself is
    /// unhealthy and the caller should apply its failure mode.
    pub fn check(&self, identifier: &str, limit_type: LimitType) -> Result<Decision> {
        let now = self.now();
        let now_secs = u64::try_from(now.timestamp()).map_err(|_| {
            BouncerError::Internal(format!("clock reports {} before the Unix epoch", now))
        })?;

        trace!(identifier = %identifier, limit_type = %limit_type, "Checking rate limit");

        if self.blocklist.is_blocked(identifier, now) {
            debug!(identifier = %identifier, "Rejected blocked identifier");
            return Ok(Decision::blocked());
        }

        let policy = self.policies.resolve(identifier, limit_type);

        let outcome = self.store.with_window(identifier, limit_type, |window| {
            window.prune(now_secs);

            let mut counts = [0u64; 3];
            for (i, period) in Period::ALL.into_iter().enumerate() {
                let count = window.count(period);
                let limit = policy.limit_for(period);
                if count >= limit {
                    return Outcome::Exceeded {
                        period,
                        count,
                        limit,
                    };
                }
                counts[i] = count;
            }

            window.record(now_secs);
            Outcome::Admitted(Remaining {
                minute: policy.requests_per_minute.saturating_sub(counts[0] + 1),
                hour: policy.requests_per_hour.saturating_sub(counts[1] + 1),
                day: policy.requests_per_day.saturating_sub(counts[2] + 1),
            })
        });

        match outcome {
            Outcome::Admitted(remaining) => Ok(Decision::allowed(remaining)),
            Outcome::Exceeded {
                period,
                count,
                limit,
            } => {
                debug!(
                    identifier = %identifier,
                    period = %period,
                    count = count,
                    limit = limit,
                    "Rate limit exceeded"
                );
                self.violations.append(Violation {
                    identifier: identifier.to_string(),
                    period,
                    current_count: count,
                    limit,
                    timestamp: now,
                });
                Ok(Decision::exceeded(period, limit, count))
            }
        }
    }

    /// Install or replace a whole-policy override.
    pub fn set_custom_limit(
        &self,
        identifier: &str,
        limit_type: LimitType,
        policy: LimitPolicy,
    ) -> Result<()> {
        self.policies.set_custom_limit(identifier, limit_type, policy)
    }

    /// Remove an override; a missing override is a no-op.
    pub fn remove_custom_limit(&self, identifier: &str, limit_type: LimitType) -> bool {
        self.policies.remove_custom_limit(identifier, limit_type)
    }

    /// Effective policy for an identifier.
    pub fn policy_for(&self, identifier: &str, limit_type: LimitType) -> LimitPolicy {
        self.policies.resolve(identifier, limit_type)
    }

    pub fn policies(&self) -> &PolicyResolver {
        &self.policies
    }

    /// Block an identifier until it is explicitly unblocked.
    ///
    /// Returns `true` if it was not already blocked.
    pub fn block(&self, identifier: &str, reason: Option<&str>) -> Result<bool> {
        self.blocklist.block(
            identifier,
            reason.unwrap_or(DEFAULT_BLOCK_REASON),
            BlockOrigin::Manual,
            self.now(),
            None,
        )
    }

    pub fn unblock(&self, identifier: &str) -> bool {
        self.blocklist.unblock(identifier)
    }

    pub fn is_blocked(&self, identifier: &str) -> bool {
        self.blocklist.is_blocked(identifier, self.now())
    }

    /// Active block list entries.
    pub fn blocked(&self) -> Vec<BlockEntry> {
        self.blocklist.entries(self.now())
    }

    pub(crate) fn blocklist(&self) -> &BlockList {
        &self.blocklist
    }

    pub(crate) fn violation_log(&self) -> &ViolationLog {
        &self.violations
    }

    pub(crate) fn store(&self) -> &EventStore {
        &self.store
    }

    pub(crate) fn analytics_config(&self) -> &AnalyticsConfig {
        &self.analytics
    }

    /// Forget all tracked traffic for an identifier.
    pub fn reset_identifier(&self, identifier: &str) -> bool {
        let removed = self.store.remove(identifier);
        if removed {
            debug!(identifier = %identifier, "Identifier history reset");
        }
        removed
    }

    /// Number of identifiers with tracked traffic.
    pub fn tracked_identifiers(&self) -> usize {
        self.store.len()
    }

    /// Identifiers whose current traffic exceeds `multiplier` times their policy,
    /// highest score first.
    pub fn find_suspects(&self, multiplier: f64) -> Vec<AbuseSuspect> {
        let now = self.now();
        let now_secs = self.now_secs_lossy();

        let samples: Vec<(String, LimitType, u64, u64)> = self
            .store
            .iter()
            .map(|entry| {
                let window = entry.value();
                (
                    entry.key().clone(),
                    window.limit_type(),
                    window.count_at(Period::Minute, now_secs),
                    window.count_at(Period::Hour, now_secs),
                )
            })
            .collect();

        let mut suspects: Vec<AbuseSuspect> = samples
            .into_iter()
            .filter_map(|(identifier, limit_type, minute, hour)| {
                let policy = self.policies.resolve(&identifier, limit_type);
                let (score, reasons) = abuse::score(minute, hour, &policy, multiplier)?;
                let is_blocked = self.blocklist.is_blocked(&identifier, now);
                Some(AbuseSuspect {
                    identifier,
                    abuse_score: score,
                    reasons,
                    minute_requests: minute,
                    hour_requests: hour,
                    is_blocked,
                })
            })
            .collect();

        abuse::rank(&mut suspects);
        suspects
    }

    /// Suspects under the configured multiplier.
    pub fn suspects(&self) -> Vec<AbuseSuspect> {
        self.find_suspects(self.abuse.multiplier)
    }

    /// Block every unblocked suspect scoring at least `threshold_score`.
    ///
    /// Never invoked by [`check`](Self::check); run it from a periodic job or
    /// an admin action. Returns the newly blocked identifiers.
    pub fn auto_block(&self, threshold_score: u32) -> Vec<String> {
        let now = self.now();
        let expires_at = self
            .abuse
            .auto_block_ttl_secs
            .and_then(|ttl| i64::try_from(ttl).ok())
            .map(|ttl| now + Duration::seconds(ttl));

        let mut blocked = Vec::new();
        for suspect in self.suspects() {
            if suspect.abuse_score < threshold_score || suspect.is_blocked {
                continue;
            }
            let reason = abuse::auto_block_reason(suspect.abuse_score);
            match self.blocklist.block_if_absent(
                &suspect.identifier,
                &reason,
                BlockOrigin::Auto,
                now,
                expires_at,
            ) {
                Ok(true) => {
                    warn!(
                        identifier = %suspect.identifier,
                        score = suspect.abuse_score,
                        reasons = ?suspect.reasons,
                        "Auto-blocked abusive identifier"
                    );
                    blocked.push(suspect.identifier);
                }
                Ok(false) => {}
                Err(e) => warn!(identifier = %suspect.identifier, error = %e, "Auto-block failed"),
            }
        }
        blocked
    }

    /// Auto-block using the configured threshold.
    pub fn auto_block_configured(&self) -> Vec<String> {
        self.auto_block(self.abuse.auto_block_threshold)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl AdmissionBackend for RateLimiter {
    fn try_check(&self, identifier: &str, limit_type: LimitType) -> Result<Decision> {
        self.check(identifier, limit_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::ratelimit::backend::{FailSafe, FailureMode};

    const T0: i64 = 1_700_000_000;

    fn limiter_with(config: BouncerConfig) -> (RateLimiter, ManualClock) {
        let clock = ManualClock::at_secs(T0);
        let limiter = RateLimiter::with_clock(&config, Arc::new(clock.clone())).unwrap();
        (limiter, clock)
    }

    fn limiter() -> (RateLimiter, ManualClock) {
        limiter_with(BouncerConfig::default())
    }

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = RateLimiter::new();
        assert_eq!(limiter.tracked_identifiers(), 0);
    }

    #[test]
    fn test_first_check_reports_remaining() {
        let (limiter, _) = limiter();
        let decision = limiter.check("10.0.0.1", LimitType::Ip).unwrap();

        assert!(decision.allowed);
        assert_eq!(
            decision.remaining,
            Some(Remaining {
                minute: 59,
                hour: 999,
                day: 9_999
            })
        );
        assert_eq!(limiter.tracked_identifiers(), 1);
    }

    #[test]
    fn test_minute_quota() {
        let (limiter, _) = limiter();
        for _ in 0..60 {
            assert!(limiter.check("10.0.0.1", LimitType::Ip).unwrap().allowed);
        }

        let decision = limiter.check("10.0.0.1", LimitType::Ip).unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.period, Some(Period::Minute));
        assert_eq!(decision.retry_after, Some(60));
        assert_eq!(decision.limit, Some(60));
        assert_eq!(decision.current, Some(60));
        assert_eq!(limiter.violation_log().len(), 1);
    }

    #[test]
    fn test_rejections_are_not_counted() {
        let (limiter, clock) = limiter();
        for _ in 0..70 {
            limiter.check("10.0.0.1", LimitType::Ip).unwrap();
        }

        clock.advance_secs(61);
        let decision = limiter.check("10.0.0.1", LimitType::Ip).unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining.unwrap().hour, 1_000 - 60 - 1);
    }

    #[test]
    fn test_finest_tier_reported_first() {
        let (limiter, _) = limiter();
        limiter
            .set_custom_limit("10.0.0.2", LimitType::Ip, LimitPolicy::new(5, 5, 100))
            .unwrap();
        for _ in 0..5 {
            assert!(limiter.check("10.0.0.2", LimitType::Ip).unwrap().allowed);
        }

        let decision = limiter.check("10.0.0.2", LimitType::Ip).unwrap();
        assert_eq!(decision.period, Some(Period::Minute));
    }

    #[test]
    fn test_hour_tier_after_minute_rolls() {
        let (limiter, clock) = limiter();
        limiter
            .set_custom_limit("10.0.0.3", LimitType::Ip, LimitPolicy::new(5, 8, 100))
            .unwrap();
        for _ in 0..5 {
            assert!(limiter.check("10.0.0.3", LimitType::Ip).unwrap().allowed);
        }
        clock.advance_secs(61);
        for _ in 0..3 {
            assert!(limiter.check("10.0.0.3", LimitType::Ip).unwrap().allowed);
        }

        let decision = limiter.check("10.0.0.3", LimitType::Ip).unwrap();
        assert_eq!(decision.period, Some(Period::Hour));
        assert_eq!(decision.retry_after, Some(3_600));
        assert_eq!(decision.current, Some(8));
    }

    #[test]
    fn test_day_tier_rejection() {
        let (limiter, clock) = limiter();
        limiter
            .set_custom_limit("10.0.0.4", LimitType::Ip, LimitPolicy::new(100, 100, 10))
            .unwrap();
        for _ in 0..10 {
            assert!(limiter.check("10.0.0.4", LimitType::Ip).unwrap().allowed);
        }
        clock.advance_secs(2 * 3_600);

        let decision = limiter.check("10.0.0.4", LimitType::Ip).unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.period, Some(Period::Day));
        assert_eq!(decision.retry_after, Some(86_400));
        assert_eq!(decision.limit, Some(10));
        assert_eq!(decision.current, Some(10));
    }

    /// Fill `period` with a burst at the last second of a bucket, then check
    /// the window edge one second before and exactly at the window length.
    fn assert_burst_held_for_full_window(period: Period, policy: LimitPolicy) {
        let (limiter, clock) = limiter();
        limiter
            .set_custom_limit("edge", LimitType::Ip, policy)
            .unwrap();
        // T0 + 99 is the last second of both a 60s and a 900s bucket.
        clock.advance_secs(99);
        let limit = policy.limit_for(period);
        for _ in 0..limit {
            assert!(limiter.check("edge", LimitType::Ip).unwrap().allowed);
        }

        clock.advance_secs(period.window_secs() as i64 - 1);
        let decision = limiter.check("edge", LimitType::Ip).unwrap();
        assert!(!decision.allowed, "{} burst released early", period);
        assert_eq!(decision.period, Some(period));
        assert_eq!(decision.current, Some(limit));

        clock.advance_secs(1);
        assert!(limiter.check("edge", LimitType::Ip).unwrap().allowed);
    }

    #[test]
    fn test_hour_window_edge() {
        assert_burst_held_for_full_window(Period::Hour, LimitPolicy::new(100, 10, 1_000));
    }

    #[test]
    fn test_day_window_edge() {
        assert_burst_held_for_full_window(Period::Day, LimitPolicy::new(100, 100, 10));
    }

    #[test]
    fn test_minute_window_edge() {
        assert_burst_held_for_full_window(Period::Minute, LimitPolicy::new(10, 100, 1_000));
    }

    #[test]
    fn test_user_override_precedence() {
        let (limiter, _) = limiter();
        limiter
            .set_custom_limit("user_42", LimitType::User, LimitPolicy::new(5, 100, 1_000))
            .unwrap();
        for _ in 0..5 {
            assert!(limiter.check("user_42", LimitType::User).unwrap().allowed);
        }
        assert!(!limiter.check("user_42", LimitType::User).unwrap().allowed);

        // The same string checked as an IP falls back to the default policy.
        assert_eq!(
            limiter.policy_for("user_42", LimitType::Ip),
            LimitPolicy::default()
        );
    }

    #[test]
    fn test_block_precedence() {
        let (limiter, _) = limiter();
        limiter.block("10.0.0.9", None).unwrap();

        let decision = limiter.check("10.0.0.9", LimitType::Ip).unwrap();
        assert!(decision.is_blocked());
        assert_eq!(limiter.tracked_identifiers(), 0);
        assert!(limiter.violation_log().is_empty());
        assert_eq!(limiter.blocked()[0].reason, "manual block");

        assert!(limiter.unblock("10.0.0.9"));
        assert!(limiter.check("10.0.0.9", LimitType::Ip).unwrap().allowed);
    }

    #[test]
    fn test_block_applies_to_user_identifiers() {
        let (limiter, _) = limiter();
        limiter.block("user_5", Some("chargeback")).unwrap();
        assert!(limiter.check("user_5", LimitType::User).unwrap().is_blocked());
    }

    #[test]
    fn test_remove_custom_limit_without_override() {
        let (limiter, _) = limiter();
        assert!(!limiter.remove_custom_limit("nobody", LimitType::Ip));
    }

    #[test]
    fn test_invalid_custom_limit_rejected() {
        let (limiter, _) = limiter();
        assert!(limiter
            .set_custom_limit("10.0.0.1", LimitType::Ip, LimitPolicy::new(0, 1, 1))
            .is_err());
    }

    #[test]
    fn test_configured_overrides_installed() {
        let mut config = BouncerConfig::default();
        config.limits.overrides.push(crate::config::OverrideConfig {
            identifier: "user_1".to_string(),
            limit_type: LimitType::User,
            policy: LimitPolicy::new(1, 10, 100),
        });
        let (limiter, _) = limiter_with(config);

        assert!(limiter.check("user_1", LimitType::User).unwrap().allowed);
        assert!(!limiter.check("user_1", LimitType::User).unwrap().allowed);
    }

    #[test]
    fn test_reset_identifier() {
        let (limiter, _) = limiter();
        for _ in 0..60 {
            limiter.check("10.0.0.1", LimitType::Ip).unwrap();
        }
        assert!(limiter.reset_identifier("10.0.0.1"));
        assert!(limiter.check("10.0.0.1", LimitType::Ip).unwrap().allowed);
        assert!(!limiter.reset_identifier("10.9.9.9"));
    }

    #[test]
    fn test_pre_epoch_clock_is_internal_fault() {
        let (limiter, clock) = limiter();
        clock.set(DateTime::from_timestamp(-10, 0).unwrap());

        assert!(matches!(
            limiter.check("10.0.0.1", LimitType::Ip),
            Err(BouncerError::Internal(_))
        ));

        let guard = FailSafe::new(Arc::new(limiter), FailureMode::FailOpen);
        assert!(guard.admit("10.0.0.1", LimitType::Ip).allowed);
    }

    #[test]
    fn test_concurrent_checks_never_over_admit() {
        let (limiter, _) = limiter();
        limiter
            .set_custom_limit("shared", LimitType::Ip, LimitPolicy::new(50, 1_000, 10_000))
            .unwrap();

        let limiter = &limiter;
        let admitted: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..16)
                .map(|_| {
                    s.spawn(move || {
                        (0..20)
                            .filter(|_| limiter.check("shared", LimitType::Ip).unwrap().allowed)
                            .count()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(admitted, 50);
        assert_eq!(limiter.violation_log().len(), 16 * 20 - 50);
    }

    #[test]
    fn test_concurrent_checks_respect_day_quota() {
        let (limiter, clock) = limiter();
        limiter
            .set_custom_limit("shared", LimitType::Ip, LimitPolicy::new(1_000, 1_000, 60))
            .unwrap();

        let limiter = &limiter;
        let mut admitted = 0;
        // Spread the traffic over several hours so only the day tier binds.
        for _ in 0..4 {
            admitted += std::thread::scope(|s| {
                let handles: Vec<_> = (0..8)
                    .map(|_| {
                        s.spawn(move || {
                            (0..5)
                                .filter(|_| limiter.check("shared", LimitType::Ip).unwrap().allowed)
                                .count()
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).sum::<usize>()
            });
            clock.advance_secs(3 * 3_600);
        }

        assert_eq!(admitted, 60);
        let violations = limiter.violation_log().query(DateTime::<Utc>::MIN_UTC, None);
        assert_eq!(violations.len(), 4 * 8 * 5 - 60);
        assert!(violations.iter().all(|v| v.period == Period::Day));
    }

    #[test]
    fn test_find_suspects_scores_and_orders() {
        let (limiter, _) = limiter();
        limiter
            .set_custom_limit("burst", LimitType::Ip, LimitPolicy::new(10, 20, 1_000))
            .unwrap();
        limiter
            .set_custom_limit("steady", LimitType::Ip, LimitPolicy::new(1_000, 10, 1_000))
            .unwrap();
        for _ in 0..30 {
            limiter.check("burst", LimitType::Ip).unwrap();
        }
        for _ in 0..25 {
            limiter.check("steady", LimitType::Ip).unwrap();
        }

        // Admission stops at the quota, so widen it to let traffic through.
        assert!(limiter.find_suspects(2.0).is_empty());

        limiter
            .set_custom_limit("burst", LimitType::Ip, LimitPolicy::new(100, 100, 1_000))
            .unwrap();
        for _ in 0..40 {
            limiter.check("burst", LimitType::Ip).unwrap();
        }
        limiter
            .set_custom_limit("burst", LimitType::Ip, LimitPolicy::new(10, 20, 1_000))
            .unwrap();
        limiter
            .set_custom_limit("steady", LimitType::Ip, LimitPolicy::new(1_000, 4, 1_000))
            .unwrap();

        let suspects = limiter.find_suspects(2.0);
        assert_eq!(suspects.len(), 2);
        assert_eq!(suspects[0].identifier, "burst");
        assert_eq!(suspects[0].abuse_score, 5);
        assert_eq!(suspects[0].minute_requests, 50);
        assert_eq!(suspects[1].identifier, "steady");
        assert_eq!(suspects[1].abuse_score, 2);
    }

    #[test]
    fn test_auto_block_blocks_high_scores_once() {
        let (limiter, _) = limiter();
        limiter
            .set_custom_limit("10.0.0.7", LimitType::Ip, LimitPolicy::new(100, 100, 1_000))
            .unwrap();
        for _ in 0..50 {
            limiter.check("10.0.0.7", LimitType::Ip).unwrap();
        }
        limiter
            .set_custom_limit("10.0.0.7", LimitType::Ip, LimitPolicy::new(10, 10, 1_000))
            .unwrap();

        assert_eq!(limiter.auto_block(5), vec!["10.0.0.7".to_string()]);
        assert!(limiter.auto_block(5).is_empty());

        let entry = &limiter.blocked()[0];
        assert_eq!(entry.reason, "auto-blocked: score 5");
        assert_eq!(entry.origin, BlockOrigin::Auto);
        assert!(limiter.check("10.0.0.7", LimitType::Ip).unwrap().is_blocked());
    }

    #[test]
    fn test_auto_block_respects_threshold() {
        let (limiter, _) = limiter();
        limiter
            .set_custom_limit("10.0.0.8", LimitType::Ip, LimitPolicy::new(100, 1_000, 1_000))
            .unwrap();
        for _ in 0..30 {
            limiter.check("10.0.0.8", LimitType::Ip).unwrap();
        }
        limiter
            .set_custom_limit("10.0.0.8", LimitType::Ip, LimitPolicy::new(10, 1_000, 1_000))
            .unwrap();

        assert!(limiter.auto_block(5).is_empty());
        assert_eq!(limiter.auto_block(3), vec!["10.0.0.8".to_string()]);
    }

    #[test]
    fn test_auto_block_ttl_expires() {
        let mut config = BouncerConfig::default();
        config.abuse.auto_block_ttl_secs = Some(600);
        let (limiter, clock) = limiter_with(config);
        limiter
            .set_custom_limit("10.0.0.6", LimitType::Ip, LimitPolicy::new(100, 100, 1_000))
            .unwrap();
        for _ in 0..30 {
            limiter.check("10.0.0.6", LimitType::Ip).unwrap();
        }
        limiter
            .set_custom_limit("10.0.0.6", LimitType::Ip, LimitPolicy::new(10, 10, 1_000))
            .unwrap();

        assert_eq!(limiter.auto_block(5).len(), 1);
        clock.advance_secs(599);
        assert!(limiter.is_blocked("10.0.0.6"));
        clock.advance_secs(1);
        assert!(!limiter.is_blocked("10.0.0.6"));
    }
}
