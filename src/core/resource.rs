//! All-or-nothing exclusive lock registry over opaque resource keys.
//!
//! This is the single synchronization point that keeps two tasks from driving
//! the same serial port, bridge process or power channel at once.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Opaque token naming one exclusive resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Wrap a resource name.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the key as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Registry of currently locked resource keys.
#[derive(Debug, Default)]
pub struct ResourceCoordinator {
    locked: Mutex<HashSet<ResourceKey>>,
}

impl ResourceCoordinator {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock every key, or none of them if any is already held.
    pub fn try_acquire(&self, keys: &BTreeSet<ResourceKey>) -> bool {
        let mut locked = self.locked.lock();
        if keys.iter().any(|key| locked.contains(key)) {
            tracing::debug!(requested = keys.len(), "resource acquisition refused");
            return false;
        }
        locked.extend(keys.iter().cloned());
        true
    }

    /// Unlock the keys. Keys that are not locked are ignored.
    pub fn release(&self, keys: &BTreeSet<ResourceKey>) {
        let mut locked = self.locked.lock();
        for key in keys {
            locked.remove(key);
        }
    }

    /// Whether a single key is currently held.
    pub fn is_locked(&self, key: &ResourceKey) -> bool {
        self.locked.lock().contains(key)
    }

    /// Snapshot of the held keys, sorted.
    pub fn locked_keys(&self) -> Vec<ResourceKey> {
        let mut keys: Vec<_> = self.locked.lock().iter().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(names: &[&str]) -> BTreeSet<ResourceKey> {
        names.iter().map(|n| ResourceKey::from(*n)).collect()
    }

    #[test]
    fn acquire_is_all_or_nothing() {
        let coordinator = ResourceCoordinator::new();
        assert!(coordinator.try_acquire(&keys(&["uart0"])));

        assert!(!coordinator.try_acquire(&keys(&["uart0", "psu"])));
        assert!(!coordinator.is_locked(&ResourceKey::from("psu")));
        assert_eq!(coordinator.locked_keys(), vec![ResourceKey::from("uart0")]);
    }

    #[test]
    fn release_then_acquire_succeeds() {
        let coordinator = ResourceCoordinator::new();
        let set = keys(&["uart0", "bridge"]);
        assert!(coordinator.try_acquire(&set));
        coordinator.release(&set);
        assert!(coordinator.try_acquire(&set));
    }

    #[test]
    fn release_is_idempotent() {
        let coordinator = ResourceCoordinator::new();
        let set = keys(&["uart0"]);
        coordinator.release(&set);
        assert!(coordinator.try_acquire(&set));
        coordinator.release(&set);
        coordinator.release(&set);
        assert!(coordinator.locked_keys().is_empty());
    }

    #[test]
    fn empty_set_always_acquires() {
        let coordinator = ResourceCoordinator::new();
        assert!(coordinator.try_acquire(&keys(&["uart0"])));
        assert!(coordinator.try_acquire(&BTreeSet::new()));
    }

    #[test]
    fn disjoint_sets_coexist() {
        let coordinator = ResourceCoordinator::new();
        assert!(coordinator.try_acquire(&keys(&["uart0"])));
        assert!(coordinator.try_acquire(&keys(&["uart1", "psu"])));
        assert_eq!(coordinator.locked_keys().len(), 3);
    }
}
