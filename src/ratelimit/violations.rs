//! Bounded history of rejected admission attempts.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::window::Period;

/// Default number of violations kept.
pub const DEFAULT_CAPACITY: usize = 1_000;

/// A quota rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub identifier: String,
    pub period: Period,
    pub current_count: u64,
    pub limit: u64,
    pub timestamp: DateTime<Utc>,
}

/// Fixed-capacity ring buffer of violations; the oldest entry is evicted first.
#[derive(Debug)]
pub struct ViolationLog {
    capacity: usize,
    entries: Mutex<VecDeque<Violation>>,
}

impl ViolationLog {
    /// Create a log holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a violation, silently evicting the oldest when full.
    pub fn append(&self, violation: Violation) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(violation);
    }

    /// Violations strictly newer than `since`, optionally for one identifier,
    /// newest first.
    pub fn query(&self, since: DateTime<Utc>, identifier: Option<&str>) -> Vec<Violation> {
        let entries = self.entries.lock();
        let mut matched: Vec<Violation> = entries
            .iter()
            .rev()
            .filter(|v| v.timestamp > since)
            .filter(|v| identifier.map_or(true, |id| v.identifier == id))
            .cloned()
            .collect();
        // Appends are not strictly time ordered when callers race on the clock.
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matched
    }

    /// Number of violations strictly newer than `since`.
    pub fn count_since(&self, since: DateTime<Utc>) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|v| v.timestamp > since)
            .count()
    }

    /// Drop violations older than `cutoff`, returning how many were removed.
    pub fn drop_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|v| v.timestamp >= cutoff);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for ViolationLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(identifier: &str, secs: i64) -> Violation {
        Violation {
            identifier: identifier.to_string(),
            period: Period::Minute,
            current_count: 60,
            limit: 60,
            timestamp: DateTime::from_timestamp(secs, 0).unwrap(),
        }
    }

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_append_evicts_oldest_when_full() {
        let log = ViolationLog::new(3);
        for i in 0..5 {
            log.append(violation("a", i));
        }

        assert_eq!(log.len(), 3);
        let all = log.query(t(-1), None);
        assert_eq!(all.first().unwrap().timestamp, t(4));
        assert_eq!(all.last().unwrap().timestamp, t(2));
    }

    #[test]
    fn test_query_filters_by_time_and_identifier() {
        let log = ViolationLog::default();
        log.append(violation("a", 10));
        log.append(violation("b", 20));
        log.append(violation("a", 30));

        assert_eq!(log.query(t(15), None).len(), 2);
        let only_a = log.query(t(0), Some("a"));
        assert_eq!(only_a.len(), 2);
        assert_eq!(only_a[0].timestamp, t(30));
        assert!(log.query(t(30), None).is_empty());
    }

    #[test]
    fn test_drop_before() {
        let log = ViolationLog::default();
        log.append(violation("a", 10));
        log.append(violation("a", 100));

        assert_eq!(log.drop_before(t(50)), 1);
        assert_eq!(log.len(), 1);
        assert_eq!(log.count_since(t(0)), 1);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let log = ViolationLog::new(0);
        log.append(violation("a", 1));
        log.append(violation("b", 2));
        assert_eq!(log.capacity(), 1);
        assert_eq!(log.query(t(0), None)[0].identifier, "b");
    }
}
