//! Status Service
//!
//! Persists an invocation's status and finalizers, and derives the aggregate
//! status from its step slots.

use conduit_client::ResourceStore;
use conduit_core::api::{API_VERSION, PIPELINE_INVOCATION_KIND};
use conduit_core::domain::invocation::{Phase, PipelineInvocation, PipelineInvocationStatus};
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;

/// Writes invocation status back to the store
#[derive(Clone)]
pub struct StatusWriter {
    store: Arc<dyn ResourceStore>,
}

impl StatusWriter {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    /// Persists status and finalizers, then replaces `invocation` with the
    /// stored object so the next write starts from the latest version
    pub async fn update_status(&self, invocation: &mut PipelineInvocation) -> Result<()> {
        self.write(invocation).await?;
        self.refresh(invocation).await
    }

    /// Persists the invocation's status and finalizers onto the stored object
    ///
    /// The stored spec and metadata are otherwise left untouched.
    pub async fn write(&self, invocation: &PipelineInvocation) -> Result<()> {
        let mut stored = self
            .store
            .get(
                API_VERSION,
                PIPELINE_INVOCATION_KIND,
                invocation.namespace(),
                invocation.name(),
            )
            .await?;

        stored.status = invocation.status_value()?;
        stored.metadata.finalizers = invocation.metadata.finalizers.clone();

        let written = self.store.update(stored).await?;
        debug!(
            "Wrote status of invocation {} (version {:?})",
            invocation.name(),
            written.metadata.resource_version
        );

        Ok(())
    }

    /// Replaces `invocation` with its stored state
    pub async fn refresh(&self, invocation: &mut PipelineInvocation) -> Result<()> {
        let stored = self
            .store
            .get(
                API_VERSION,
                PIPELINE_INVOCATION_KIND,
                invocation.namespace(),
                invocation.name(),
            )
            .await?;

        *invocation = PipelineInvocation::from_document(stored)?;
        Ok(())
    }
}

/// Derives start time, phase and completion time from the step slots
///
/// `step_count` is the number of steps in the pipeline template. A pipeline
/// with no steps has nothing to run and goes straight to finalizing.
pub fn aggregate(status: &mut PipelineInvocationStatus, step_count: usize) {
    let Some(first) = status.step_statuses.first() else {
        if step_count == 0 {
            status.message.clear();
            status.advance(Phase::Finalizing);
        }
        return;
    };

    if let Some(started) = first.state.started_at() {
        status.start_time = Some(started);
        status.message.clear();
        status.advance(Phase::Running);
    }

    let complete = status.step_statuses.len() >= step_count
        && status.step_statuses.iter().all(|slot| slot.is_terminated());

    if complete {
        status.completion_time = status
            .step_statuses
            .last()
            .and_then(|slot| slot.state.terminated())
            .and_then(|terminated| terminated.finished_at);
        status.message.clear();
        status.advance(Phase::Finalizing);
    }
}
