//! Fence Controller
//!
//! The fence controller narrows the set of destinations a sidecar proxy is
//! configured for. Each `Service` may be fenced, in which case a fence record
//! with the same namespace and name holds whether scoping is active and the
//! traffic observed for the service.
//!
//! Whether a service is fenced is decided from layered policy:
//!
//! - A `Service` label explicitly enables or disables fencing.
//! - Otherwise, the `Namespace` label applies to all of its services. The
//!   namespace policy is cached; a namespace whose last refresh failed is
//!   marked stale and looked up directly until a refresh succeeds.
//!
//! ```text
//! [ Namespace ] -> [ PolicyCache ] -> decide(..) <- [ Service ]
//!                                         |
//!                                     [ Fence ] <- observations
//! ```
//!
//! This crate holds the store-agnostic model. Persistence is reached through
//! the [`FenceStore`] trait.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod cache;
mod decision;
pub mod fence;
pub mod observation;
mod store;

pub use self::{
    cache::{Policy, PolicyCache},
    decision::decide,
    fence::{Fence, FenceLabel, MetricStatus, NamespaceRef, Ownership, RevisionScope, ServiceRef},
    store::{FenceStore, SidecarScope},
};

/// Identifies a namespaced resource.
///
/// Services and their fence records share the same identifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId {
    pub namespace: String,
    pub name: String,
}

impl ResourceId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
