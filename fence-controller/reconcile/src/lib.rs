//! Converges fence records with the fencing policy of services and
//! namespaces, and folds traffic observations into their status.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod ingest;
mod lifecycle;
mod metrics;
mod reconciler;


pub use self::{
    ingest::Subscription, lifecycle::FenceLifecycle, metrics::Metrics, reconciler::Reconciler,
};
