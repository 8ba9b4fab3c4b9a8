use crate::{labels, ObjectMeta, ResourceExt};
use fence_controller_core::{Fence, MetricStatus, ResourceId};

/// Fences a `Service` so that its sidecars only carry configuration for
/// destinations it talks to.
///
/// The schema is owned by the installed CRD, so none is generated here.
#[derive(Clone, Debug, Default, PartialEq, kube::CustomResource, serde::Deserialize, serde::Serialize)]
#[kube(
    group = "microservice.slime.io",
    version = "v1alpha1",
    kind = "ServiceFence",
    status = "ServiceFenceStatus",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceFenceSpec {
    #[serde(default)]
    pub enable: bool,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceFenceStatus {
    #[serde(default, skip_serializing_if = "MetricStatus::is_empty")]
    pub metric_status: MetricStatus,
}

// === impl ServiceFence ===

impl ServiceFence {
    /// Describes the record for the lifecycle manager. Returns `None` for an
    /// object without a namespace.
    pub fn to_fence(&self) -> Option<Fence> {
        let labels = self.labels();
        Some(Fence {
            id: ResourceId::new(self.namespace()?, self.name_any()),
            enabled: self.spec.enable,
            ownership: labels::ownership(labels),
            revision: labels::revision(labels).map(ToString::to_string),
            status: self
                .status
                .as_ref()
                .map(|s| s.metric_status.clone())
                .unwrap_or_default(),
        })
    }

    /// Builds a new record from its domain description.
    pub fn from_fence(fence: &Fence) -> Self {
        Self {
            metadata: ObjectMeta {
                namespace: Some(fence.id.namespace.clone()),
                name: Some(fence.id.name.clone()),
                labels: Some(labels::fence_labels(fence)),
                ..Default::default()
            },
            spec: ServiceFenceSpec {
                enable: fence.enabled,
            },
            status: None,
        }
    }
}
