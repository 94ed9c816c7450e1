//! Sharded identifier -> traffic history map.

use dashmap::mapref::multiple::RefMulti;
use dashmap::DashMap;

use super::policy::LimitType;
use super::window::EventWindow;

/// Concurrent store of per-identifier event windows.
///
/// Backed by a sharded map: operations on one identifier hold only that
/// identifier's shard lock, so admission for a single identifier is
/// serialized while unrelated identifiers proceed in parallel.
#[derive(Debug, Default)]
pub struct EventStore {
    windows: DashMap<String, EventWindow>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` on the identifier's window while holding its shard lock,
    /// creating the window if needed.
    pub fn with_window<R>(
        &self,
        identifier: &str,
        limit_type: LimitType,
        f: impl FnOnce(&mut EventWindow) -> R,
    ) -> R {
        let mut entry = self
            .windows
            .entry(identifier.to_string())
            .or_insert_with(|| EventWindow::new(limit_type));
        let window = entry.value_mut();
        window.set_limit_type(limit_type);
        f(window)
    }

    /// Read the identifier's window if it is tracked.
    pub fn read<R>(&self, identifier: &str, f: impl FnOnce(&EventWindow) -> R) -> Option<R> {
        self.windows.get(identifier).map(|window| f(window.value()))
    }

    /// Iterate over all tracked windows.
    ///
    /// The store must not be mutated from the same thread while an item is held.
    pub fn iter(&self) -> impl Iterator<Item = RefMulti<'_, String, EventWindow>> {
        self.windows.iter()
    }

    /// Stop tracking an identifier. Returns whether it was tracked.
    pub fn remove(&self, identifier: &str) -> bool {
        self.windows.remove(identifier).is_some()
    }

    /// Keep only windows for which `f` returns `true`.
    pub fn retain(&self, f: impl FnMut(&String, &mut EventWindow) -> bool) {
        self.windows.retain(f);
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.windows.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
