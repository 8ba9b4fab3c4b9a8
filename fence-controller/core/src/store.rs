use crate::{Fence, NamespaceRef, ResourceId, ServiceRef};
use anyhow::Result;

/// Models the resource store that persists services, namespaces, and fence
/// records.
///
/// Lookups return `Ok(None)` when the resource does not exist; absence is
/// never an error.
#[async_trait::async_trait]
pub trait FenceStore: Send + Sync {
    async fn get_service(&self, id: &ResourceId) -> Result<Option<ServiceRef>>;

    async fn list_services(&self, namespace: &str) -> Result<Vec<ServiceRef>>;

    async fn get_namespace(&self, name: &str) -> Result<Option<NamespaceRef>>;

    async fn get_fence(&self, id: &ResourceId) -> Result<Option<Fence>>;

    async fn create_fence(&self, fence: &Fence) -> Result<()>;

    /// Deletes a fence record. Deleting a record that no longer exists
    /// succeeds.
    async fn delete_fence(&self, id: &ResourceId) -> Result<()>;

    /// Replaces the record's status with `fence.status`.
    async fn update_fence_status(&self, fence: &Fence) -> Result<()>;
}

/// Narrows sidecar configuration for an enabled fence record.
#[async_trait::async_trait]
pub trait SidecarScope: Send + Sync {
    async fn refresh(&self, fence: &Fence) -> Result<()>;
}

/// Leaves sidecar configuration untouched.
#[async_trait::async_trait]
impl SidecarScope for () {
    async fn refresh(&self, _: &Fence) -> Result<()> {
        Ok(())
    }
}
