//! Admission decisions returned by the limiter.

use serde::{Deserialize, Serialize};

use super::window::Period;

/// Reason attached to decisions for blocked identifiers.
pub const BLOCKED_REASON: &str = "blocked";

/// Remaining quota per tier after an admitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remaining {
    pub minute: u64,
    pub hour: u64,
    pub day: u64,
}

/// Outcome of a single admission check.
///
/// Serializes to the shape HTTP front-ends forward to clients: absent fields
/// are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<u64>,
    /// Seconds the client should wait before retrying
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining: Option<Remaining>,
}

impl Decision {
    /// An admitted request.
    pub fn allowed(remaining: Remaining) -> Self {
        Self {
            allowed: true,
            reason: None,
            limit: None,
            current: None,
            retry_after: None,
            period: None,
            remaining: Some(remaining),
        }
    }

    /// A request rejected because its identifier is blocked.
    pub fn blocked() -> Self {
        Self::denied(BLOCKED_REASON)
    }

    /// A request rejected because `period`'s quota is used up.
    pub fn exceeded(period: Period, limit: u64, current: u64) -> Self {
        Self {
            allowed: false,
            reason: Some(format!("rate limit exceeded ({})", period)),
            limit: Some(limit),
            current: Some(current),
            retry_after: Some(period.window_secs()),
            period: Some(period),
            remaining: None,
        }
    }

    /// A bare rejection carrying only a reason.
    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            limit: None,
            current: None,
            retry_after: None,
            period: None,
            remaining: None,
        }
    }

    /// An admission granted without consulting any quota.
    pub fn unchecked() -> Self {
        Self {
            allowed: true,
            reason: None,
            limit: None,
            current: None,
            retry_after: None,
            period: None,
            remaining: None,
        }
    }

    pub fn is_blocked(&self) -> bool {
        !self.allowed && self.reason.as_deref() == Some(BLOCKED_REASON)
    }

    /// HTTP status a front-end should answer with.
    pub fn http_status(&self) -> u16 {
        if self.allowed {
            200
        } else {
            429
        }
    }
}
