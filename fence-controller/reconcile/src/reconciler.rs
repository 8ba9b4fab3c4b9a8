use crate::FenceLifecycle;
use anyhow::Result;
use fence_controller_core::{
    decide, FenceLabel, FenceStore, PolicyCache, ResourceId, ServiceRef, SidecarScope,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument};

/// Reconciles fence records when services or namespaces change.
///
/// All reconciliations are serialized by a single lock that also guards the
/// namespace policy cache. A namespace cascade holds the lock for its entire
/// fan-out, so no service is evaluated against a partially applied policy.
pub struct Reconciler<S, P = ()> {
    fences: Arc<FenceLifecycle<S, P>>,
    cache: Mutex<PolicyCache>,
}

// === impl Reconciler ===

impl<S, P> Reconciler<S, P>
where
    S: FenceStore,
    P: SidecarScope,
{
    pub fn new(fences: Arc<FenceLifecycle<S, P>>) -> Self {
        Self {
            fences,
            cache: Mutex::new(PolicyCache::default()),
        }
    }

    #[cfg(test)]
    pub(crate) async fn policy(&self, namespace: &str) -> fence_controller_core::Policy {
        self.cache.lock().await.lookup(namespace)
    }

    /// Converges the fence record for a single service.
    ///
    /// A service that no longer exists is treated as unfenced so that a
    /// record it leaves behind is cleaned up.
    #[instrument(skip_all, fields(namespace = %id.namespace, name = %id.name))]
    pub async fn reconcile_service(&self, id: &ResourceId) -> Result<()> {
        let res = self.service(id).await;
        self.fences.metrics().reconciled("service", &res);
        res
    }

    /// Applies a namespace's fencing policy to all of its services.
    ///
    /// The new policy is written to the cache before any service is
    /// reconciled. If the cascade fails, the previous policy is restored and
    /// the namespace is marked stale so that services in it are evaluated
    /// against the live namespace until a namespace reconciliation succeeds.
    #[instrument(skip(self))]
    pub async fn reconcile_namespace(&self, namespace: &str) -> Result<()> {
        let res = self.namespace(namespace).await;
        self.fences.metrics().reconciled("namespace", &res);
        res
    }

    async fn service(&self, id: &ResourceId) -> Result<()> {
        let cache = self.cache.lock().await;

        let svc = self
            .fences
            .store()
            .get_service(id)
            .await
            .inspect_err(|error| error!(%error, "Failed to get Service"))?;
        if svc.is_none() {
            debug!("Service not found");
        }

        self.refresh_service(&cache, id, svc.as_ref()).await
    }

    async fn namespace(&self, name: &str) -> Result<()> {
        let mut cache = self.cache.lock().await;

        let ns = self
            .fences
            .store()
            .get_namespace(name)
            .await
            .inspect_err(|error| error!(%error, "Failed to get Namespace"))?;

        // Deletions are not cascaded: each service's own deletion cleans up
        // its record.
        let Some(ns) = ns else {
            debug!("Namespace not found");
            cache.forget(name);
            return Ok(());
        };

        let fenced = ns.fenced.is_enabled();
        let prev = cache.lookup(name).enabled;
        if fenced == prev {
            cache.clear_stale(name);
            return Ok(());
        }

        info!(fenced, "Namespace fencing policy changed");
        cache.set_policy(name, fenced);
        match self.cascade(&cache, name).await {
            Ok(()) => {
                cache.clear_stale(name);
                Ok(())
            }
            Err(error) => {
                cache.set_policy(name, prev);
                cache.mark_stale(name);
                Err(error)
            }
        }
    }

    async fn cascade(&self, cache: &PolicyCache, namespace: &str) -> Result<()> {
        let services = self
            .fences
            .store()
            .list_services(namespace)
            .await
            .inspect_err(|error| error!(%error, "Failed to list Services"))?;

        for svc in &services {
            self.refresh_service(cache, &svc.id, Some(svc))
                .await
                .inspect_err(|error| {
                    error!(service = %svc.id.name, %error, "Failed to reconcile Service")
                })?;
        }
        Ok(())
    }

    // Callers must hold the cache lock.
    async fn refresh_service(
        &self,
        cache: &PolicyCache,
        id: &ResourceId,
        svc: Option<&ServiceRef>,
    ) -> Result<()> {
        let fenced = match svc {
            Some(svc) => {
                decide(
                    svc.fenced,
                    &id.namespace,
                    cache,
                    self.lookup_namespace(&id.namespace),
                )
                .await
            }
            None => false,
        };
        self.fences.converge(id, fenced).await
    }

    async fn lookup_namespace(&self, name: &str) -> Result<Option<FenceLabel>> {
        let ns = self.fences.store().get_namespace(name).await?;
        Ok(ns.map(|ns| ns.fenced))
    }
}
