#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use fence_controller_core as core;
pub use fence_controller_k8s_api as k8s;
pub use fence_controller_reconcile as reconcile;

mod args;
mod store;
mod triggers;

pub use self::{args::Args, store::KubeStore, triggers::Trigger};
