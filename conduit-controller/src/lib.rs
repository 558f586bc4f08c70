//! Conduit Controller
//!
//! Reconciliation core for pipeline invocations.
//!
//! Architecture:
//! - Reconciler: routes each pass to the prepare, run or finalize path
//! - Services: the paths themselves (service provisioning, step execution,
//!   teardown) and the status write-then-refresh primitive they share
//! - Scheduler: periodic resync that re-delivers every invocation to the reconciler
//!
//! Every pass is single-shot and idempotent: children are created with
//! "already exists" tolerated, terminal step states are never revisited, and any
//! unexpected failure simply ends the pass until the next delivery.

pub mod config;
pub mod error;
pub mod naming;
pub mod reconciler;
pub mod scheduler;
pub mod service;

pub use config::Config;
pub use error::{ReconcileError, Result};
pub use reconciler::{Reconciled, Reconciler, Route};

#[cfg(test)]
pub(crate) mod testing;
