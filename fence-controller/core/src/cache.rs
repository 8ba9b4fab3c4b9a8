use ahash::AHashSet as HashSet;

/// Caches the fencing policy of each namespace.
///
/// A namespace that is in neither set is known to be unfenced (or has never
/// been seen). A namespace may be both enabled and stale when its last known
/// value was `true` but a subsequent refresh failed.
#[derive(Debug, Default)]
pub struct PolicyCache {
    enabled: HashSet<String>,
    stale: HashSet<String>,
}

/// The cached policy of a single namespace.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Policy {
    pub enabled: bool,

    /// Set when the cached value could not be confirmed; lookups must bypass
    /// the cache until a namespace reconciliation succeeds.
    pub stale: bool,
}

// === impl PolicyCache ===

impl PolicyCache {
    pub fn lookup(&self, namespace: &str) -> Policy {
        Policy {
            enabled: self.enabled.contains(namespace),
            stale: self.stale.contains(namespace),
        }
    }

    pub fn set_policy(&mut self, namespace: &str, enabled: bool) {
        if enabled {
            self.enabled.insert(namespace.to_string());
        } else {
            self.enabled.remove(namespace);
        }
    }

    pub fn mark_stale(&mut self, namespace: &str) {
        self.stale.insert(namespace.to_string());
    }

    pub fn clear_stale(&mut self, namespace: &str) {
        self.stale.remove(namespace);
    }

    /// Drops all state for a namespace that no longer exists.
    pub fn forget(&mut self, namespace: &str) {
        self.enabled.remove(namespace);
        self.stale.remove(namespace);
    }
}
