use crate::{
    core::RevisionScope,
    k8s,
    reconcile::{FenceLifecycle, Metrics, Reconciler, Subscription},
    store::KubeStore,
    triggers::{self, Dispatcher},
};
use anyhow::{bail, Result};
use clap::Parser;
use kube::runtime::watcher;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{info, info_span, Instrument};

// The maximum number of triggers to buffer between the watches and the
// dispatcher.
const TRIGGER_QUEUE_SIZE: usize = 1_000;

#[derive(Debug, Parser)]
#[clap(name = "fence", about = "A ServiceFence resource controller")]
pub struct Args {
    #[clap(
        long,
        default_value = "fence=info,warn",
        env = "FENCE_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// The revision stamped on created ServiceFences. ServiceFences of
    /// other revisions are left untouched.
    #[clap(long, default_value = "", env = "FENCE_CONTROLLER_REVISION")]
    revision: String,

    /// Treats ServiceFences without a revision as belonging to another
    /// revision.
    #[clap(long)]
    strict_revision: bool,

    #[clap(long, default_value = "5000")]
    requeue_delay_ms: u64,
}

impl Args {
    /// Parses arguments from the command line and runs the controller.
    ///
    /// Observation subscriptions are supplied by the embedding program; the
    /// shipped binary passes none.
    #[inline]
    pub async fn parse_and_run(subscriptions: Vec<Subscription>) -> Result<()> {
        Self::parse().run(subscriptions).await
    }

    /// Runs the controller until shutdown is signaled, applying observations
    /// from each subscription.
    ///
    /// Subscriptions come from the embedding program, which owns the
    /// observation sources; the shipped binary passes none.
    pub async fn run(self, subscriptions: Vec<Subscription>) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            revision,
            strict_revision,
            requeue_delay_ms,
        } = self;

        let mut prom = <Registry>::default();
        let metrics = Metrics::register(prom.sub_registry_with_prefix("fence"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let scope = RevisionScope::new(revision, strict_revision);
        let fences = Arc::new(FenceLifecycle::new(
            KubeStore::new(runtime.client()),
            (),
            scope,
            metrics,
        ));
        let reconciler = Arc::new(Reconciler::new(fences.clone()));
        let dispatcher = Dispatcher::new(
            reconciler,
            TRIGGER_QUEUE_SIZE,
            Duration::from_millis(requeue_delay_ms),
        );

        // Spawn resource watches.

        let services = runtime.watch_all::<k8s::Service>(watcher::Config::default());
        tokio::spawn(
            triggers::forward(services, dispatcher.sender()).instrument(info_span!("services")),
        );

        let namespaces = runtime.watch_all::<k8s::Namespace>(watcher::Config::default());
        tokio::spawn(
            triggers::forward(namespaces, dispatcher.sender())
                .instrument(info_span!("namespaces")),
        );

        let service_fences = runtime.watch_all::<k8s::ServiceFence>(watcher::Config::default());
        tokio::spawn(
            triggers::forward(service_fences, dispatcher.sender())
                .instrument(info_span!("servicefences")),
        );

        tokio::spawn(dispatcher.run().instrument(info_span!("reconcile")));

        // Observations are applied independently of reconciliation.
        if subscriptions.is_empty() {
            info!("No observation subscriptions registered");
        }
        for sub in subscriptions {
            let span = info_span!("observations", subscription = %sub.name());
            tokio::spawn(
                sub.run(fences.clone(), runtime.shutdown_handle())
                    .instrument(span),
            );
        }

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
