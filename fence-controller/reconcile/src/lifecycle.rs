use crate::metrics::{Metrics, Write};
use anyhow::Result;
use fence_controller_core::{
    Fence, FenceStore, MetricStatus, Ownership, ResourceId, RevisionScope, SidecarScope,
};
use tracing::{debug, error, info};

/// Creates, deletes, and updates fence records.
///
/// Records outside of this controller's revision scope are never modified.
pub struct FenceLifecycle<S, P = ()> {
    store: S,
    sidecars: P,
    scope: RevisionScope,
    metrics: Metrics,
}

// === impl FenceLifecycle ===

impl<S, P> FenceLifecycle<S, P>
where
    S: FenceStore,
    P: SidecarScope,
{
    pub fn new(store: S, sidecars: P, scope: RevisionScope, metrics: Metrics) -> Self {
        Self {
            store,
            sidecars,
            scope,
            metrics,
        }
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    pub(crate) fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Brings the service's fence record in line with the fencing decision.
    ///
    /// A record is only created when the service is fenced and only deleted
    /// when the service is not fenced and the record was created by this
    /// controller. Failing to delete a record is logged but not returned, so
    /// that disabling fencing remains best-effort.
    pub async fn converge(&self, id: &ResourceId, fenced: bool) -> Result<()> {
        let fence = self.get(id).await?;

        let Some(fence) = fence else {
            if fenced {
                return self.create(id).await;
            }
            return Ok(());
        };

        if !self.in_scope(&fence) {
            return Ok(());
        }

        match (fence.ownership, fenced) {
            (Ownership::Controller, false) => {
                let res = self.store.delete_fence(id).await;
                self.metrics.fence_write(Write::Delete, &res);
                match res {
                    Ok(()) => info!(namespace = %id.namespace, name = %id.name, "Deleted ServiceFence"),
                    Err(error) => {
                        error!(namespace = %id.namespace, name = %id.name, %error, "Failed to delete ServiceFence")
                    }
                }
            }
            (Ownership::Controller, true) if fence.enabled => self.refresh_sidecar(&fence).await,
            (Ownership::External, false) => {
                debug!(namespace = %id.namespace, name = %id.name, "Leaving externally created ServiceFence in place")
            }
            _ => {}
        }

        Ok(())
    }

    /// Replaces the record's status with the latest observation.
    ///
    /// Observations for services without a record are dropped.
    pub async fn apply_observation(&self, id: &ResourceId, status: MetricStatus) -> Result<()> {
        let Some(mut fence) = self.get(id).await? else {
            info!(namespace = %id.namespace, name = %id.name, "ServiceFence not found, skipping observation");
            return Ok(());
        };

        if !self.in_scope(&fence) {
            return Ok(());
        }

        if fence.enabled {
            self.refresh_sidecar(&fence).await;
        }

        fence.status = status;
        let res = self.store.update_fence_status(&fence).await;
        self.metrics.fence_write(Write::UpdateStatus, &res);
        res.inspect_err(|error| {
            error!(namespace = %id.namespace, name = %id.name, %error, "Failed to update ServiceFence status")
        })
    }

    async fn get(&self, id: &ResourceId) -> Result<Option<Fence>> {
        self.store.get_fence(id).await.inspect_err(|error| {
            error!(namespace = %id.namespace, name = %id.name, %error, "Failed to get ServiceFence")
        })
    }

    async fn create(&self, id: &ResourceId) -> Result<()> {
        let fence = Fence::controller_owned(id.clone(), &self.scope);
        let res = self.store.create_fence(&fence).await;
        self.metrics.fence_write(Write::Create, &res);
        match res {
            Ok(()) => {
                info!(namespace = %id.namespace, name = %id.name, "Created ServiceFence");
                Ok(())
            }
            Err(error) => {
                error!(namespace = %id.namespace, name = %id.name, %error, "Failed to create ServiceFence");
                Err(error)
            }
        }
    }

    fn in_scope(&self, fence: &Fence) -> bool {
        if self.scope.contains(fence.revision.as_deref()) {
            return true;
        }
        info!(
            namespace = %fence.id.namespace,
            name = %fence.id.name,
            revision = ?fence.revision,
            "ServiceFence belongs to another revision, skipping",
        );
        false
    }

    async fn refresh_sidecar(&self, fence: &Fence) {
        if let Err(error) = self.sidecars.refresh(fence).await {
            error!(namespace = %fence.id.namespace, name = %fence.id.name, %error, "Failed to refresh sidecar scope");
        }
    }
}
