use crate::{metrics::Observed, FenceLifecycle};
use fence_controller_core::{observation::Event, FenceStore, SidecarScope};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A named stream of traffic observations.
///
/// Observations update a fence record's status without taking the
/// reconciliation lock: a status written to a record that was concurrently
/// deleted is simply lost.
#[derive(Debug)]
pub struct Subscription {
    name: String,
    events: mpsc::Receiver<Event>,
}

// === impl Subscription ===

impl Subscription {
    pub fn new(name: impl Into<String>, capacity: usize) -> (mpsc::Sender<Event>, Self) {
        let (tx, events) = mpsc::channel(capacity);
        let sub = Self {
            name: name.into(),
            events,
        };
        (tx, sub)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Applies observations until the subscription closes or shutdown is
    /// signaled. An observation that is already being applied when shutdown
    /// is signaled is allowed to complete.
    pub async fn run<S, P>(self, fences: Arc<FenceLifecycle<S, P>>, shutdown: drain::Watch)
    where
        S: FenceStore,
        P: SidecarScope,
    {
        let Self { name, mut events } = self;
        let shutdown = shutdown.signaled();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                release = &mut shutdown => {
                    info!(subscription = %name, "Stopping observation subscription");
                    drop(release);
                    return;
                }
                event = events.recv() => match event {
                    Some(event) => observe(&name, &fences, event).await,
                    None => {
                        info!(subscription = %name, "Observation subscription closed");
                        return;
                    }
                },
            }
        }
    }
}

async fn observe<S, P>(subscription: &str, fences: &FenceLifecycle<S, P>, event: Event)
where
    S: FenceStore,
    P: SidecarScope,
{
    let (id, status) = match event.into_status() {
        Ok(update) => update,
        Err(error) => {
            warn!(%subscription, %error, "Dropping malformed observation");
            fences.metrics().observed(subscription, Observed::Malformed);
            return;
        }
    };

    debug!(%subscription, namespace = %id.namespace, name = %id.name, series = status.len(), "Applying observation");
    let observed = match fences.apply_observation(&id, status).await {
        Ok(()) => Observed::Applied,
        Err(_) => Observed::Failed,
    };
    fences.metrics().observed(subscription, observed);
}
