use crate::ResourceId;
use std::collections::BTreeMap;

/// Maps an observed series (rendered as a label-set string) to its latest
/// value.
pub type MetricStatus = BTreeMap<String, String>;

/// The value of a fencing label on a `Service` or `Namespace`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FenceLabel {
    Enabled,
    Disabled,
    #[default]
    Unset,
}

/// Indicates who created a fence record. The controller never deletes a
/// record it did not create.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Ownership {
    Controller,
    External,
}

/// A service as seen by the fencing decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceRef {
    pub id: ResourceId,
    pub fenced: FenceLabel,
}

/// A namespace as seen by the fencing decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamespaceRef {
    pub name: String,
    pub fenced: FenceLabel,
}

/// The persisted fencing state of a single service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fence {
    pub id: ResourceId,
    pub enabled: bool,
    pub ownership: Ownership,
    pub revision: Option<String>,
    pub status: MetricStatus,
}

/// Partitions fence records between controller instances.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RevisionScope {
    revision: String,

    /// When set, records without a revision belong to no instance but the
    /// unrevisioned one.
    strict: bool,
}

// === impl FenceLabel ===

impl FenceLabel {
    pub const TRUE: &'static str = "true";
    pub const FALSE: &'static str = "false";

    /// Parses a label value. Unrecognized values are treated as unset.
    pub fn from_value(value: Option<&str>) -> Self {
        match value {
            Some(Self::TRUE) => Self::Enabled,
            Some(Self::FALSE) => Self::Disabled,
            _ => Self::Unset,
        }
    }

    /// Returns the explicit value, if any.
    pub fn explicit(self) -> Option<bool> {
        match self {
            Self::Enabled => Some(true),
            Self::Disabled => Some(false),
            Self::Unset => None,
        }
    }

    pub fn is_enabled(self) -> bool {
        self == Self::Enabled
    }
}

// === impl Fence ===

impl Fence {
    /// Builds an enabled record owned by this controller.
    pub fn controller_owned(id: ResourceId, scope: &RevisionScope) -> Self {
        Self {
            id,
            enabled: true,
            ownership: Ownership::Controller,
            revision: scope.label().map(ToString::to_string),
            status: MetricStatus::new(),
        }
    }

    pub fn is_controller_owned(&self) -> bool {
        self.ownership == Ownership::Controller
    }
}

// === impl RevisionScope ===

impl RevisionScope {
    pub fn new(revision: impl Into<String>, strict: bool) -> Self {
        Self {
            revision: revision.into(),
            strict,
        }
    }

    /// The revision label to stamp on records created by this instance.
    pub fn label(&self) -> Option<&str> {
        if self.revision.is_empty() {
            return None;
        }
        Some(&self.revision)
    }

    pub fn contains(&self, revision: Option<&str>) -> bool {
        let revision = revision.unwrap_or_default();
        revision == self.revision || (!self.strict && revision.is_empty())
    }
}
