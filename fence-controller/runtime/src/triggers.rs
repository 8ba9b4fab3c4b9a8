use crate::{
    core::{FenceStore, ResourceId, SidecarScope},
    k8s::{self, ResourceExt},
    reconcile::Reconciler,
};
use anyhow::Result;
use futures::prelude::*;
use kube::runtime::watcher;
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};
use tokio::{sync::mpsc, time};
use tracing::{debug, info_span, Instrument};

const MAX_REQUEUE_DELAY: time::Duration = time::Duration::from_secs(300);

/// Identifies the reconciliation an observed change calls for.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Trigger {
    Service(ResourceId),
    Namespace(String),
}

/// A watched resource whose changes trigger reconciliations.
pub(crate) trait Triggers {
    fn trigger(&self) -> Option<Trigger>;
}

/// Feeds triggers to a reconciler.
///
/// At most one task runs per trigger. A trigger received while its task is
/// running is merged into that task, which runs again once it completes. A
/// failed trigger is retried with exponential backoff until it succeeds.
pub(crate) struct Dispatcher<S, P> {
    reconciler: Arc<Reconciler<S, P>>,
    tx: mpsc::Sender<Trigger>,
    rx: mpsc::Receiver<Trigger>,
    backoff: Backoff,
}

// Maps each active trigger to whether it must run again.
type Active = Arc<Mutex<HashMap<Trigger, bool>>>;

#[derive(Copy, Clone, Debug)]
struct Backoff {
    min: time::Duration,
    max: time::Duration,
}

// === impl Trigger ===

impl Trigger {
    fn name(&self) -> &str {
        match self {
            Self::Service(id) => &id.name,
            Self::Namespace(name) => name,
        }
    }
}

// === impl Triggers ===

impl Triggers for k8s::Service {
    fn trigger(&self) -> Option<Trigger> {
        let id = ResourceId::new(self.namespace()?, self.name_any());
        Some(Trigger::Service(id))
    }
}

impl Triggers for k8s::ServiceFence {
    fn trigger(&self) -> Option<Trigger> {
        let id = ResourceId::new(self.namespace()?, self.name_any());
        Some(Trigger::Service(id))
    }
}

impl Triggers for k8s::Namespace {
    fn trigger(&self) -> Option<Trigger> {
        Some(Trigger::Namespace(self.name_any()))
    }
}

/// Converts watch events into triggers until the watch ends or the
/// dispatcher goes away.
pub(crate) async fn forward<T, E>(events: E, triggers: mpsc::Sender<Trigger>)
where
    T: Triggers,
    E: Stream<Item = watcher::Event<T>>,
{
    tokio::pin!(events);
    while let Some(event) = events.next().await {
        let obj = match event {
            watcher::Event::Apply(obj)
            | watcher::Event::InitApply(obj)
            | watcher::Event::Delete(obj) => obj,
            watcher::Event::Init | watcher::Event::InitDone => continue,
        };

        if let Some(trigger) = obj.trigger() {
            if triggers.send(trigger).await.is_err() {
                return;
            }
        }
    }
}

// === impl Dispatcher ===

impl<S, P> Dispatcher<S, P>
where
    S: FenceStore + 'static,
    P: SidecarScope + 'static,
{
    pub(crate) fn new(
        reconciler: Arc<Reconciler<S, P>>,
        capacity: usize,
        requeue_delay: time::Duration,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            reconciler,
            tx,
            rx,
            backoff: Backoff {
                min: requeue_delay,
                max: MAX_REQUEUE_DELAY.max(requeue_delay),
            },
        }
    }

    pub(crate) fn sender(&self) -> mpsc::Sender<Trigger> {
        self.tx.clone()
    }

    /// Runs each trigger in its own task until every sender is dropped. The
    /// reconciler serializes the tasks.
    pub(crate) async fn run(self) {
        let Self {
            reconciler,
            tx,
            mut rx,
            backoff,
        } = self;
        drop(tx);
        let active = Active::default();

        while let Some(trigger) = rx.recv().await {
            {
                let mut active = active.lock();
                if let Some(rerun) = active.get_mut(&trigger) {
                    *rerun = true;
                    continue;
                }
                active.insert(trigger.clone(), false);
            }

            let span = match &trigger {
                Trigger::Service(id) => {
                    info_span!("service", namespace = %id.namespace, name = %id.name)
                }
                Trigger::Namespace(name) => info_span!("namespace", %name),
            };
            tokio::spawn(
                process(reconciler.clone(), active.clone(), trigger, backoff).instrument(span),
            );
        }
    }
}

async fn process<S, P>(
    reconciler: Arc<Reconciler<S, P>>,
    active: Active,
    trigger: Trigger,
    backoff: Backoff,
) where
    S: FenceStore,
    P: SidecarScope,
{
    let mut failures = 0;
    loop {
        if dispatch(&reconciler, &trigger).await.is_ok() {
            failures = 0;
            let mut active = active.lock();
            let rerun = active.get(&trigger).copied().unwrap_or(false);
            if !rerun {
                active.remove(&trigger);
                return;
            }
            active.insert(trigger.clone(), false);
            continue;
        }

        // The retry covers any trigger received in the meantime.
        failures += 1;
        active.lock().insert(trigger.clone(), false);
        let delay = backoff.delay(failures);
        debug!(name = %trigger.name(), ?delay, "Requeueing");
        time::sleep(delay).await;
    }
}

// === impl Backoff ===

impl Backoff {
    /// Doubles the delay for each consecutive failure, up to `max`.
    fn delay(&self, failures: u32) -> time::Duration {
        let factor = 1u32
            .checked_shl(failures.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.min.saturating_mul(factor).min(self.max)
    }
}

async fn dispatch<S, P>(reconciler: &Reconciler<S, P>, trigger: &Trigger) -> Result<()>
where
    S: FenceStore,
    P: SidecarScope,
{
    match trigger {
        Trigger::Service(id) => reconciler.reconcile_service(id).await,
        Trigger::Namespace(name) => reconciler.reconcile_namespace(name).await,
    }
}
