//! Abuse scoring for identifiers whose traffic far exceeds their policy.

use serde::{Deserialize, Serialize};

use super::policy::LimitPolicy;

/// Score added when the minute count exceeds `limit * multiplier`.
pub const MINUTE_WEIGHT: u32 = 3;
/// Score added when the hour count exceeds `limit * multiplier`.
pub const HOUR_WEIGHT: u32 = 2;

/// An identifier currently flagged as abusive. Derived on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbuseSuspect {
    pub identifier: String,
    pub abuse_score: u32,
    pub reasons: Vec<String>,
    pub minute_requests: u64,
    pub hour_requests: u64,
    pub is_blocked: bool,
}

/// Score a traffic sample against `policy`.
///
/// Returns `None` when no tier exceeds its threshold.
pub fn score(
    minute_requests: u64,
    hour_requests: u64,
    policy: &LimitPolicy,
    multiplier: f64,
) -> Option<(u32, Vec<String>)> {
    let mut total = 0;
    let mut reasons = Vec::new();

    if minute_requests as f64 > policy.requests_per_minute as f64 * multiplier {
        total += MINUTE_WEIGHT;
        reasons.push(format!(
            "minute: {}/{}",
            minute_requests, policy.requests_per_minute
        ));
    }

    if hour_requests as f64 > policy.requests_per_hour as f64 * multiplier {
        total += HOUR_WEIGHT;
        reasons.push(format!("hour: {}/{}", hour_requests, policy.requests_per_hour));
    }

    (total > 0).then_some((total, reasons))
}

/// Order suspects by descending score; ties break on identifier.
pub fn rank(suspects: &mut [AbuseSuspect]) {
    suspects.sort_by(|a, b| {
        b.abuse_score
            .cmp(&a.abuse_score)
            .then_with(|| a.identifier.cmp(&b.identifier))
    });
}

/// Block reason recorded for automatic blocks.
pub fn auto_block_reason(score: u32) -> String {
    format!("auto-blocked: score {}", score)
}
