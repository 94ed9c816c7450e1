//! Usage, violation and abuse reporting for operator dashboards.

use chrono::Duration;
use serde::Serialize;

use crate::ratelimit::{AbuseSuspect, LimitPolicy, LimitType, RateLimiter, Violation};

/// Usage of a single identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentifierUsage {
    pub identifier: String,
    pub total_requests: u64,
    pub requests_per_hour: f64,
    pub custom_limits: Option<LimitPolicy>,
    pub is_blocked: bool,
}

/// One entry of the top-talkers list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopTalker {
    pub identifier: String,
    pub requests: u64,
    pub requests_per_hour: f64,
}

/// Usage across all tracked identifiers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalUsage {
    pub total_identifiers: usize,
    pub total_requests: u64,
    pub top_users: Vec<TopTalker>,
    pub blocked_count: usize,
    pub custom_limits_count: usize,
}

/// Result of [`RateLimiter::usage_stats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UsageStats {
    Identifier(IdentifierUsage),
    Global(GlobalUsage),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViolationSummary {
    pub total: usize,
    /// Violations from the last hour, newest first
    pub recent: Vec<Violation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbuseOverview {
    pub suspects_count: usize,
    pub blocked_count: usize,
    pub top_suspects: Vec<AbuseSuspect>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LimitsOverview {
    pub default: LimitPolicy,
    pub custom_users: usize,
    pub custom_ips: usize,
}

/// Combined report consumed by the admin dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub usage: GlobalUsage,
    pub violations: ViolationSummary,
    pub abuse: AbuseOverview,
    pub limits: LimitsOverview,
}

fn per_hour(requests: u64, hours: u32) -> f64 {
    if hours == 0 {
        0.0
    } else {
        requests as f64 / f64::from(hours)
    }
}

impl RateLimiter {
    /// Requests recorded for `identifier` in the last `hours`.
    fn requests_within(&self, identifier: &str, hours: u32) -> u64 {
        if hours == 0 {
            return 0;
        }
        let now_secs = self.now_secs_lossy();
        let span = u64::from(hours) * 3_600;
        self.store()
            .read(identifier, |w| w.count_within(now_secs, span))
            .unwrap_or(0)
    }

    /// Usage for one identifier, or for all identifiers when `identifier` is `None`.
    pub fn usage_stats(&self, identifier: Option<&str>, hours: u32) -> UsageStats {
        match identifier {
            Some(id) => UsageStats::Identifier(self.identifier_usage(id, hours)),
            None => UsageStats::Global(self.global_usage(hours)),
        }
    }

    pub fn identifier_usage(&self, identifier: &str, hours: u32) -> IdentifierUsage {
        let total_requests = self.requests_within(identifier, hours);
        IdentifierUsage {
            identifier: identifier.to_string(),
            total_requests,
            requests_per_hour: per_hour(total_requests, hours),
            custom_limits: self.policies().custom_limit(identifier),
            is_blocked: self.is_blocked(identifier),
        }
    }

    /// Totals over every tracked identifier plus the top talkers by volume.
    pub fn global_usage(&self, hours: u32) -> GlobalUsage {
        let now_secs = self.now_secs_lossy();
        let span = u64::from(hours) * 3_600;

        let mut talkers: Vec<TopTalker> = if hours == 0 {
            Vec::new()
        } else {
            self.store()
                .iter()
                .filter_map(|entry| {
                    let requests = entry.value().count_within(now_secs, span);
                    (requests > 0).then(|| TopTalker {
                        identifier: entry.key().clone(),
                        requests,
                        requests_per_hour: per_hour(requests, hours),
                    })
                })
                .collect()
        };

        let total_requests: u64 = talkers.iter().map(|t| t.requests).sum();
        talkers.sort_by(|a, b| {
            b.requests
                .cmp(&a.requests)
                .then_with(|| a.identifier.cmp(&b.identifier))
        });
        talkers.truncate(self.analytics_config().top_n);

        GlobalUsage {
            total_identifiers: self.tracked_identifiers(),
            total_requests,
            top_users: talkers,
            blocked_count: self.blocklist().len(self.now()),
            custom_limits_count: self.policies().custom_count(LimitType::User)
                + self.policies().custom_count(LimitType::Ip),
        }
    }

    /// Violations from the last `hours`, optionally for one identifier, newest first.
    pub fn violations(&self, hours: u32, identifier: Option<&str>) -> Vec<Violation> {
        let since = self.lookback(Duration::hours(i64::from(hours)));
        self.violation_log().query(since, identifier)
    }

    /// Usage, violations and abuse state composed into one report.
    pub fn abuse_summary(&self, hours: u32) -> AnalyticsReport {
        let suspects = self.suspects();
        let since = self.lookback(Duration::hours(i64::from(hours)));

        AnalyticsReport {
            usage: self.global_usage(hours),
            violations: ViolationSummary {
                total: self.violation_log().count_since(since),
                recent: self.violations(1, None),
            },
            abuse: AbuseOverview {
                suspects_count: suspects.len(),
                blocked_count: self.blocklist().len(self.now()),
                top_suspects: suspects
                    .into_iter()
                    .take(self.analytics_config().top_suspects)
                    .collect(),
            },
            limits: LimitsOverview {
                default: self.policies().default_policy(),
                custom_users: self.policies().custom_count(LimitType::User),
                custom_ips: self.policies().custom_count(LimitType::Ip),
            },
        }
    }
}
