use crate::{
    core::{Fence, FenceStore, MetricStatus, NamespaceRef, ResourceId, ServiceRef},
    k8s::{self, Api, ListParams, PostParams, ServiceFence, ServiceFenceStatus},
};
use anyhow::Result;

const FIELD_MANAGER: &str = "fence-controller";

/// Reads services and namespaces and writes `ServiceFence` records through
/// the Kubernetes API.
#[derive(Clone)]
pub struct KubeStore {
    client: k8s::Client,
}

// === impl KubeStore ===

impl KubeStore {
    pub fn new(client: k8s::Client) -> Self {
        Self { client }
    }

    fn fences(&self, namespace: &str) -> Api<ServiceFence> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait::async_trait]
impl FenceStore for KubeStore {
    async fn get_service(&self, id: &ResourceId) -> Result<Option<ServiceRef>> {
        let api = Api::<k8s::Service>::namespaced(self.client.clone(), &id.namespace);
        let svc = api.get_opt(&id.name).await?;
        Ok(svc.as_ref().and_then(k8s::service_ref))
    }

    async fn list_services(&self, namespace: &str) -> Result<Vec<ServiceRef>> {
        let api = Api::<k8s::Service>::namespaced(self.client.clone(), namespace);
        let svcs = api.list(&ListParams::default()).await?;
        Ok(svcs.items.iter().filter_map(k8s::service_ref).collect())
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<NamespaceRef>> {
        let api = Api::<k8s::Namespace>::all(self.client.clone());
        let ns = api.get_opt(name).await?;
        Ok(ns.as_ref().map(k8s::namespace_ref))
    }

    async fn get_fence(&self, id: &ResourceId) -> Result<Option<Fence>> {
        let fence = self.fences(&id.namespace).get_opt(&id.name).await?;
        Ok(fence.as_ref().and_then(ServiceFence::to_fence))
    }

    async fn create_fence(&self, fence: &Fence) -> Result<()> {
        self.fences(&fence.id.namespace)
            .create(&post_params(), &ServiceFence::from_fence(fence))
            .await?;
        Ok(())
    }

    async fn delete_fence(&self, id: &ResourceId) -> Result<()> {
        match self
            .fences(&id.namespace)
            .delete(&id.name, &Default::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(k8s::Error::Api(rsp)) if rsp.code == 404 => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    async fn update_fence_status(&self, fence: &Fence) -> Result<()> {
        let api = self.fences(&fence.id.namespace);
        let Some(current) = api.get_opt(&fence.id.name).await? else {
            return Ok(());
        };

        // The fetched object carries its resource version, so a concurrent
        // write to the same record fails with a conflict.
        let body = serde_json::to_vec(&with_status(current, &fence.status))?;
        match api.replace_status(&fence.id.name, &post_params(), body).await {
            Ok(_) => Ok(()),
            Err(k8s::Error::Api(rsp)) if rsp.code == 404 => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    }
}

/// Replaces the record's metric status wholesale.
fn with_status(mut fence: ServiceFence, status: &MetricStatus) -> ServiceFence {
    fence.status = Some(ServiceFenceStatus {
        metric_status: status.clone(),
    });
    fence
}
