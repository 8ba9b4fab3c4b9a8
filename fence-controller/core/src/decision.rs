use crate::{FenceLabel, PolicyCache};
use anyhow::Result;
use std::future::Future;

/// Decides whether a service should be fenced.
///
/// An explicit service label always wins. Otherwise the namespace policy
/// applies. It is read from the cache unless the cached namespace is stale,
/// in which case `lookup` fetches the namespace's current label. `lookup` is
/// only polled in the stale case. A failed or empty lookup leaves the service
/// unfenced for this decision; the cache is never updated here.
pub async fn decide<F>(label: FenceLabel, namespace: &str, cache: &PolicyCache, lookup: F) -> bool
where
    F: Future<Output = Result<Option<FenceLabel>>>,
{
    if let Some(fenced) = label.explicit() {
        return fenced;
    }

    let policy = cache.lookup(namespace);
    if !policy.stale {
        return policy.enabled;
    }

    match lookup.await {
        Ok(Some(label)) => label.is_enabled(),
        Ok(None) => false,
        Err(error) => {
            tracing::warn!(%namespace, %error, "Failed to look up stale namespace");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    async fn unreachable_lookup() -> Result<Option<FenceLabel>> {
        panic!("namespace lookup must not be performed")
    }

    async fn unavailable() -> Result<Option<FenceLabel>> {
        Err(anyhow!("connection refused"))
    }

    async fn live(label: Option<FenceLabel>) -> Result<Option<FenceLabel>> {
        Ok(label)
    }

    #[tokio::test]
    async fn explicit_label_ignores_namespace() {
        let mut cache = PolicyCache::default();
        assert!(decide(FenceLabel::Enabled, "ns-0", &cache, unreachable_lookup()).await);

        cache.set_policy("ns-0", true);
        assert!(!decide(FenceLabel::Disabled, "ns-0", &cache, unreachable_lookup()).await);

        // Even a stale namespace is not consulted.
        cache.mark_stale("ns-0");
        assert!(!decide(FenceLabel::Disabled, "ns-0", &cache, unreachable_lookup()).await);
        cache.set_policy("ns-0", false);
        assert!(decide(FenceLabel::Enabled, "ns-0", &cache, unreachable_lookup()).await);
    }

    #[tokio::test]
    async fn unset_label_uses_cache() {
        let mut cache = PolicyCache::default();
        assert!(!decide(FenceLabel::Unset, "ns-0", &cache, unreachable_lookup()).await);

        cache.set_policy("ns-0", true);
        assert!(decide(FenceLabel::Unset, "ns-0", &cache, unreachable_lookup()).await);
        assert!(!decide(FenceLabel::Unset, "ns-1", &cache, unreachable_lookup()).await);
    }

    #[tokio::test]
    async fn stale_namespace_bypasses_cache() {
        let mut cache = PolicyCache::default();
        cache.mark_stale("ns-0");

        assert!(decide(FenceLabel::Unset, "ns-0", &cache, live(Some(FenceLabel::Enabled))).await);

        cache.set_policy("ns-0", true);
        assert!(!decide(FenceLabel::Unset, "ns-0", &cache, live(Some(FenceLabel::Disabled))).await);

        assert!(!decide(FenceLabel::Unset, "ns-0", &cache, live(Some(FenceLabel::Unset))).await);

        assert!(!decide(FenceLabel::Unset, "ns-0", &cache, live(None)).await);

        // The lookup never writes through to the cache.
        assert!(cache.lookup("ns-0").enabled);
        assert!(cache.lookup("ns-0").stale);
    }

    #[tokio::test]
    async fn failed_lookup_is_unfenced() {
        let mut cache = PolicyCache::default();
        cache.set_policy("ns-0", true);
        cache.mark_stale("ns-0");

        assert!(!decide(FenceLabel::Unset, "ns-0", &cache, unavailable()).await);
        assert!(cache.lookup("ns-0").enabled);
    }
}
