//! Limit policies and per-identifier override resolution.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::window::Period;
use crate::error::{BouncerError, Result};

/// How an identifier was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitType {
    /// Raw client IP address
    Ip,
    /// Authenticated user, keyed as `user_<id>`
    User,
}

impl LimitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitType::Ip => "ip",
            LimitType::User => "user",
        }
    }
}

impl fmt::Display for LimitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LimitType {
    type Err = BouncerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ip" => Ok(LimitType::Ip),
            "user" => Ok(LimitType::User),
            other => Err(BouncerError::Config(format!("unknown limit type '{}'", other))),
        }
    }
}

/// Build the identifier used for an authenticated user.
pub fn user_key(id: impl fmt::Display) -> String {
    format!("user_{}", id)
}

/// Quotas for the three tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitPolicy {
    pub requests_per_minute: u64,
    pub requests_per_hour: u64,
    pub requests_per_day: u64,
}

impl Default for LimitPolicy {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            requests_per_hour: 1_000,
            requests_per_day: 10_000,
        }
    }
}

impl LimitPolicy {
    pub fn new(requests_per_minute: u64, requests_per_hour: u64, requests_per_day: u64) -> Self {
        Self {
            requests_per_minute,
            requests_per_hour,
            requests_per_day,
        }
    }

    /// Quota for a single tier.
    pub fn limit_for(&self, period: Period) -> u64 {
        match period {
            Period::Minute => self.requests_per_minute,
            Period::Hour => self.requests_per_hour,
            Period::Day => self.requests_per_day,
        }
    }

    /// Reject policies that could never admit a request.
    pub fn validate(&self) -> Result<()> {
        for period in Period::ALL {
            if self.limit_for(period) == 0 {
                return Err(BouncerError::InvalidPolicy(format!(
                    "requests_per_{} must be positive",
                    period
                )));
            }
        }
        Ok(())
    }
}

/// Resolves the effective policy for an identifier.
///
/// An override replaces the default policy as a whole; fields are never merged.
pub struct PolicyResolver {
    default: LimitPolicy,
    overrides: RwLock<HashMap<(LimitType, String), LimitPolicy>>,
}

impl PolicyResolver {
    /// Create a resolver with no overrides.
    pub fn new(default: LimitPolicy) -> Self {
        Self {
            default,
            overrides: RwLock::new(HashMap::new()),
        }
    }

    /// The global default policy.
    pub fn default_policy(&self) -> LimitPolicy {
        self.default
    }

    /// Effective policy: an override of the matching type, else the default.
    pub fn resolve(&self, identifier: &str, limit_type: LimitType) -> LimitPolicy {
        self.overrides
            .read()
            .get(&(limit_type, identifier.to_string()))
            .copied()
            .unwrap_or(self.default)
    }

    /// Install or replace an override. Idempotent.
    pub fn set_custom_limit(
        &self,
        identifier: &str,
        limit_type: LimitType,
        policy: LimitPolicy,
    ) -> Result<()> {
        if identifier.is_empty() {
            return Err(BouncerError::InvalidIdentifier(
                "identifier must not be empty".to_string(),
            ));
        }
        policy.validate()?;

        debug!(
            identifier = %identifier,
            limit_type = %limit_type,
            per_minute = policy.requests_per_minute,
            per_hour = policy.requests_per_hour,
            per_day = policy.requests_per_day,
            "Custom limit set"
        );
        self.overrides
            .write()
            .insert((limit_type, identifier.to_string()), policy);
        Ok(())
    }

    /// Remove an override. A missing override is a no-op.
    ///
    /// Returns whether an override was removed.
    pub fn remove_custom_limit(&self, identifier: &str, limit_type: LimitType) -> bool {
        let removed = self
            .overrides
            .write()
            .remove(&(limit_type, identifier.to_string()))
            .is_some();
        if removed {
            debug!(identifier = %identifier, limit_type = %limit_type, "Custom limit removed");
        }
        removed
    }

    /// The override for `identifier`, checking user overrides before IP ones.
    pub fn custom_limit(&self, identifier: &str) -> Option<LimitPolicy> {
        let overrides = self.overrides.read();
        overrides
            .get(&(LimitType::User, identifier.to_string()))
            .or_else(|| overrides.get(&(LimitType::Ip, identifier.to_string())))
            .copied()
    }

    /// Number of overrides of the given type.
    pub fn custom_count(&self, limit_type: LimitType) -> usize {
        self.overrides
            .read()
            .keys()
            .filter(|(t, _)| *t == limit_type)
            .count()
    }
}
