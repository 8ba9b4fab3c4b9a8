use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

#[derive(Clone, Debug)]
pub struct Metrics {
    reconciles: Family<ReconcileLabels, Counter>,
    fence_writes: Family<WriteLabels, Counter>,
    observations: Family<ObservationLabels, Counter>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ReconcileLabels {
    kind: &'static str,
    result: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct WriteLabels {
    op: &'static str,
    result: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ObservationLabels {
    subscription: String,
    result: &'static str,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Write {
    Create,
    Delete,
    UpdateStatus,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Observed {
    Applied,
    Malformed,
    Failed,
}

// === impl Metrics ===

impl Metrics {
    pub fn register(reg: &mut Registry) -> Self {
        let reconciles = Family::default();
        reg.register(
            "reconciles",
            "Count of service and namespace reconciliations",
            reconciles.clone(),
        );

        let fence_writes = Family::default();
        reg.register(
            "fence_writes",
            "Count of ServiceFence writes issued to the API server",
            fence_writes.clone(),
        );

        let observations = Family::default();
        reg.register(
            "observations",
            "Count of traffic observation events received per subscription",
            observations.clone(),
        );

        Self {
            reconciles,
            fence_writes,
            observations,
        }
    }

    pub(crate) fn reconciled<T, E>(&self, kind: &'static str, res: &Result<T, E>) {
        self.reconciles
            .get_or_create(&ReconcileLabels {
                kind,
                result: result(res.is_ok()),
            })
            .inc();
    }

    pub(crate) fn fence_write<T, E>(&self, write: Write, res: &Result<T, E>) {
        let op = match write {
            Write::Create => "create",
            Write::Delete => "delete",
            Write::UpdateStatus => "update_status",
        };
        self.fence_writes
            .get_or_create(&WriteLabels {
                op,
                result: result(res.is_ok()),
            })
            .inc();
    }

    pub(crate) fn observed(&self, subscription: &str, observed: Observed) {
        self.observations
            .get_or_create(&ObservationLabels::new(subscription, observed))
            .inc();
    }

    #[cfg(test)]
    pub(crate) fn observed_count(&self, subscription: &str, observed: Observed) -> u64 {
        self.observations
            .get_or_create(&ObservationLabels::new(subscription, observed))
            .get()
    }
}

impl ObservationLabels {
    fn new(subscription: &str, observed: Observed) -> Self {
        let result = match observed {
            Observed::Applied => "applied",
            Observed::Malformed => "malformed",
            Observed::Failed => "failed",
        };
        Self {
            subscription: subscription.to_string(),
            result,
        }
    }
}

fn result(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "error"
    }
}
