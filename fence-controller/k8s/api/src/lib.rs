#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod labels;
pub mod service_fence;

pub use self::service_fence::{ServiceFence, ServiceFenceSpec, ServiceFenceStatus};
use fence_controller_core::{NamespaceRef, ResourceId, ServiceRef};
pub use k8s_openapi::api::{
    self,
    core::v1::{Namespace, Service},
};
pub use kube::{
    api::{Api, DeleteParams, ListParams, ObjectMeta, PostParams, Resource, ResourceExt},
    Client, Error,
};

/// Describes a `Service` for the fencing decision.
///
/// Returns `None` for an object without a namespace, which the API server
/// never produces for services.
pub fn service_ref(svc: &Service) -> Option<ServiceRef> {
    let namespace = svc.namespace()?;
    Some(ServiceRef {
        id: ResourceId::new(namespace, svc.name_any()),
        fenced: labels::fence_label(svc.labels()),
    })
}

pub fn namespace_ref(ns: &Namespace) -> NamespaceRef {
    NamespaceRef {
        name: ns.name_any(),
        fenced: labels::fence_label(ns.labels()),
    }
}
