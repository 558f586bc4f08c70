//! Reconciler
//!
//! Entry point for every delivery of an invocation. Chooses exactly one path
//! per pass from the invocation's phase and deletion state.

use conduit_client::ResourceStore;
use conduit_core::Document;
use conduit_core::api::FINALIZER;
use conduit_core::domain::invocation::{Phase, PipelineInvocation};
use std::fmt;
use std::sync::Arc;
use tracing::{Instrument, debug, info_span};

use crate::error::Result;
use crate::service::{InvocationFinalizer, ServiceProvisioner, StepExecutor};

/// Path taken by a reconcile pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Prepare,
    Run,
    Finalize,
    Idle,
}

impl Route {
    /// Chooses the path for an invocation
    ///
    /// Deletion takes precedence over the phase. An invocation being deleted
    /// without our finalizer never had children created, so there is nothing
    /// to tear down.
    pub fn select(phase: Option<Phase>, deletion_requested: bool, has_finalizer: bool) -> Self {
        if deletion_requested {
            return if has_finalizer {
                Route::Finalize
            } else {
                Route::Idle
            };
        }

        match phase {
            None | Some(Phase::Preparing) => Route::Prepare,
            Some(Phase::Scheduling) | Some(Phase::Running) => Route::Run,
            Some(Phase::Finalizing) | Some(Phase::Terminated) => Route::Idle,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Route::Prepare => "prepare",
            Route::Run => "run",
            Route::Finalize => "finalize",
            Route::Idle => "idle",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub route: Route,
    /// Phase after the pass
    pub phase: Option<Phase>,
    /// Whether another pass is expected to make progress
    pub requeue: bool,
}

/// Dispatches invocations to the prepare, run and finalize paths
pub struct Reconciler {
    provisioner: ServiceProvisioner,
    executor: StepExecutor,
    finalizer: InvocationFinalizer,
}

impl Reconciler {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            provisioner: ServiceProvisioner::new(Arc::clone(&store)),
            executor: StepExecutor::new(Arc::clone(&store)),
            finalizer: InvocationFinalizer::new(store),
        }
    }

    /// Reconciles an invocation as delivered by the store
    pub async fn reconcile_document(&self, document: Document) -> Result<Reconciled> {
        let invocation = PipelineInvocation::from_document(document)?;
        self.reconcile(invocation).await
    }

    /// Runs one pass for `invocation`
    ///
    /// Deletion is requested when the store has set the deletion timestamp.
    pub async fn reconcile(&self, invocation: PipelineInvocation) -> Result<Reconciled> {
        let deletion_requested = invocation.metadata.is_deleting();
        self.reconcile_with(invocation, deletion_requested).await
    }

    /// Runs one pass with an explicit deletion signal
    pub async fn reconcile_with(
        &self,
        mut invocation: PipelineInvocation,
        deletion_requested: bool,
    ) -> Result<Reconciled> {
        let route = Route::select(
            invocation.status.phase,
            deletion_requested,
            invocation.metadata.has_finalizer(FINALIZER),
        );

        let span = info_span!(
            "reconcile",
            invocation = %invocation.name(),
            namespace = %invocation.namespace(),
            route = %route,
        );

        let requeue = self
            .dispatch(route, &mut invocation)
            .instrument(span)
            .await?;

        Ok(Reconciled {
            route,
            phase: invocation.status.phase,
            requeue,
        })
    }

    /// Runs the chosen path, returning whether a requeue is expected
    async fn dispatch(&self, route: Route, invocation: &mut PipelineInvocation) -> Result<bool> {
        debug!("Reconciling in phase {:?}", invocation.status.phase);

        match route {
            Route::Prepare => {
                self.provisioner.prepare(invocation).await?;
                Ok(true)
            }
            Route::Run => {
                self.executor.run(invocation).await?;
                Ok(invocation.status.phase != Some(Phase::Finalizing))
            }
            Route::Finalize => Ok(!self.finalizer.finalize(invocation).await?),
            Route::Idle => Ok(false),
        }
    }
}
