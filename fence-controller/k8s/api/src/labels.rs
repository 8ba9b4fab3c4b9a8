use fence_controller_core::{Fence, FenceLabel, Ownership};
use std::collections::BTreeMap;

pub type Map = BTreeMap<String, String>;

/// Explicitly enables (`"true"`) or disables (`"false"`) fencing on a
/// `Service` or on every service in a `Namespace`.
pub const SERVICE_FENCED: &str = "slime.io/serviceFenced";

/// Marks a fence record created by this controller.
pub const CREATED_BY: &str = "app.kubernetes.io/created-by";
pub const FENCE_CONTROLLER: &str = "fence-controller";

/// Scopes a fence record to a controller revision.
pub const REVISION: &str = "istio.io/rev";

pub fn fence_label(labels: &Map) -> FenceLabel {
    FenceLabel::from_value(labels.get(SERVICE_FENCED).map(String::as_str))
}

pub fn ownership(labels: &Map) -> Ownership {
    match labels.get(CREATED_BY).map(String::as_str) {
        Some(FENCE_CONTROLLER) => Ownership::Controller,
        _ => Ownership::External,
    }
}

pub fn revision(labels: &Map) -> Option<&str> {
    labels.get(REVISION).map(String::as_str)
}

/// Builds the labels that describe a fence record's ownership and revision.
pub fn fence_labels(fence: &Fence) -> Map {
    let mut labels = Map::new();
    if fence.is_controller_owned() {
        labels.insert(CREATED_BY.to_string(), FENCE_CONTROLLER.to_string());
    }
    if let Some(rev) = fence.revision.as_ref() {
        labels.insert(REVISION.to_string(), rev.clone());
    }
    labels
}
