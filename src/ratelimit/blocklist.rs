//! Explicit deny-set of identifiers.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{BouncerError, Result};

/// Who put an identifier on the block list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockOrigin {
    Manual,
    Auto,
}

/// A single block list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEntry {
    pub identifier: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    pub origin: BlockOrigin,
    /// `None` means the block holds until an explicit unblock
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl BlockEntry {
    fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expiry| now < expiry)
    }
}

/// Concurrent set of blocked identifiers with O(1) membership checks.
///
/// Entries with an expiry are treated as absent once it passes and are
/// purged on the next lookup.
#[derive(Debug, Default)]
pub struct BlockList {
    entries: DashMap<String, BlockEntry>,
}

impl BlockList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block `identifier`, replacing any existing entry.
    ///
    /// Returns `true` if the identifier was not already blocked.
    pub fn block(
        &self,
        identifier: &str,
        reason: &str,
        origin: BlockOrigin,
        now: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let entry = Self::new_entry(identifier, reason, origin, now, expires_at)?;
        let previous = self.entries.insert(identifier.to_string(), entry);
        let newly_blocked = previous.map_or(true, |prev| !prev.is_active(now));

        Self::log_blocked(identifier, reason, origin, expires_at);
        Ok(newly_blocked)
    }

    /// Block `identifier` only if it has no active entry.
    ///
    /// The check and the insert happen under the same shard lock, so an
    /// existing block is never replaced. Returns whether an entry was added.
    pub fn block_if_absent(
        &self,
        identifier: &str,
        reason: &str,
        origin: BlockOrigin,
        now: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let entry = Self::new_entry(identifier, reason, origin, now, expires_at)?;
        match self.entries.entry(identifier.to_string()) {
            Entry::Occupied(mut slot) => {
                if slot.get().is_active(now) {
                    return Ok(false);
                }
                slot.insert(entry);
            }
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
        }

        Self::log_blocked(identifier, reason, origin, expires_at);
        Ok(true)
    }

    fn new_entry(
        identifier: &str,
        reason: &str,
        origin: BlockOrigin,
        now: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<BlockEntry> {
        if identifier.is_empty() {
            return Err(BouncerError::InvalidIdentifier(
                "cannot block an empty identifier".to_string(),
            ));
        }
        Ok(BlockEntry {
            identifier: identifier.to_string(),
            reason: reason.to_string(),
            timestamp: now,
            origin,
            expires_at,
        })
    }

    fn log_blocked(
        identifier: &str,
        reason: &str,
        origin: BlockOrigin,
        expires_at: Option<DateTime<Utc>>,
    ) {
        info!(
            identifier = %identifier,
            reason = %reason,
            origin = ?origin,
            expires_at = ?expires_at,
            "Identifier blocked"
        );
    }

    /// Remove a block. Returns whether an entry was removed.
    pub fn unblock(&self, identifier: &str) -> bool {
        let removed = self.entries.remove(identifier).is_some();
        if removed {
            info!(identifier = %identifier, "Identifier unblocked");
        }
        removed
    }

    /// Whether `identifier` is currently blocked.
    pub fn is_blocked(&self, identifier: &str, now: DateTime<Utc>) -> bool {
        let active = match self.entries.get(identifier) {
            Some(entry) => entry.is_active(now),
            None => return false,
        };
        if !active {
            self.entries
                .remove_if(identifier, |_, entry| !entry.is_active(now));
            info!(identifier = %identifier, "Block expired");
        }
        active
    }

    /// Active entries, oldest block first.
    pub fn entries(&self, now: DateTime<Utc>) -> Vec<BlockEntry> {
        let mut entries: Vec<BlockEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.is_active(now))
            .map(|entry| entry.value().clone())
            .collect();
        entries.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.identifier.cmp(&b.identifier))
        });
        entries
    }

    /// Number of active entries.
    pub fn len(&self, now: DateTime<Utc>) -> usize {
        self.entries.iter().filter(|entry| entry.is_active(now)).count()
    }

    /// Drop expired entries, returning how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_active(now));
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_block_and_unblock() {
        let list = BlockList::new();
        assert!(!list.is_blocked("1.2.3.4", t(0)));

        assert!(list.block("1.2.3.4", "manual block", BlockOrigin::Manual, t(0), None).unwrap());
        assert!(list.is_blocked("1.2.3.4", t(0)));
        assert!(list.is_blocked("1.2.3.4", t(10 * 365 * 86_400)));

        assert!(list.unblock("1.2.3.4"));
        assert!(!list.is_blocked("1.2.3.4", t(1)));
        assert!(!list.unblock("1.2.3.4"));
    }

    #[test]
    fn test_reblock_is_not_new() {
        let list = BlockList::new();
        assert!(list.block("a", "first", BlockOrigin::Manual, t(0), None).unwrap());
        assert!(!list.block("a", "second", BlockOrigin::Manual, t(1), None).unwrap());
        assert_eq!(list.entries(t(2))[0].reason, "second");
    }

    #[test]
    fn test_block_rejects_empty_identifier() {
        let list = BlockList::new();
        assert!(list.block("", "x", BlockOrigin::Manual, t(0), None).is_err());
    }

    #[test]
    fn test_expiring_block() {
        let list = BlockList::new();
        let expiry = t(0) + Duration::seconds(60);
        list.block("b", "auto-blocked: score 5", BlockOrigin::Auto, t(0), Some(expiry))
            .unwrap();

        assert!(list.is_blocked("b", t(59)));
        assert!(!list.is_blocked("b", t(60)));
        assert_eq!(list.len(t(60)), 0);
        assert_eq!(list.purge_expired(t(60)), 0);
    }

    #[test]
    fn test_block_if_absent_keeps_existing_block() {
        let list = BlockList::new();
        list.block("a", "manual block", BlockOrigin::Manual, t(0), None).unwrap();

        let added = list
            .block_if_absent("a", "auto-blocked: score 5", BlockOrigin::Auto, t(1), Some(t(60)))
            .unwrap();
        assert!(!added);

        let entry = &list.entries(t(120))[0];
        assert_eq!(entry.origin, BlockOrigin::Manual);
        assert_eq!(entry.expires_at, None);
        assert!(list.is_blocked("a", t(120)));
    }

    #[test]
    fn test_block_if_absent_replaces_expired_entry() {
        let list = BlockList::new();
        list.block("a", "r", BlockOrigin::Auto, t(0), Some(t(5))).unwrap();

        assert!(list
            .block_if_absent("a", "again", BlockOrigin::Auto, t(10), Some(t(20)))
            .unwrap());
        assert!(list.block_if_absent("b", "r", BlockOrigin::Auto, t(10), None).unwrap());
        assert!(list.is_blocked("a", t(15)));
        assert_eq!(list.entries(t(15))[0].reason, "again");
    }

    #[test]
    fn test_purge_expired() {
        let list = BlockList::new();
        list.block("x", "r", BlockOrigin::Auto, t(0), Some(t(5))).unwrap();
        list.block("y", "r", BlockOrigin::Manual, t(0), None).unwrap();

        assert_eq!(list.purge_expired(t(10)), 1);
        assert_eq!(list.entries(t(10)).len(), 1);
    }
}
