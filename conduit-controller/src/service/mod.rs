//! Service Module
//!
//! The three reconcile paths and the status primitive they share.
//! Each path is one idempotent pass over the store.

pub mod executor;
pub mod finalizer;
pub mod provisioner;
pub mod status;

pub use executor::StepExecutor;
pub use finalizer::InvocationFinalizer;
pub use provisioner::ServiceProvisioner;
pub use status::StatusWriter;
