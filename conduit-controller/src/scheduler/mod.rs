//! Scheduler layer for the controller
//!
//! Re-delivers every invocation to the reconciler on a fixed interval. This is
//! the only source of retries: a failed pass is simply driven again next tick.

pub mod resync;

pub use resync::ResyncLoop;
