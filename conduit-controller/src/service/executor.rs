//! Executor Service
//!
//! Walks the pipeline's steps in order, creating one function invocation per
//! step. A step is only started once every step before it has terminated.

use conduit_client::ResourceStore;
use conduit_core::api::{API_VERSION, FUNCTION_INVOCATION_KIND, PIPELINE_KIND};
use conduit_core::domain::function::{
    FunctionInvocation, FunctionInvocationSpec, FunctionInvocationStatus, SecretVolumeSource,
    Volume, VolumeMount,
};
use conduit_core::domain::invocation::PipelineInvocation;
use conduit_core::domain::pipeline::{Pipeline, PipelineStep};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{ReconcileError, Result};
use crate::naming::{function_child_name, owner_references, service_child_name, service_mount_path};
use crate::service::status::{StatusWriter, aggregate};

/// Placeholder message of a step slot that has no reported state yet
pub const PLACEHOLDER_MESSAGE: &str = "Containers are being created";

pub struct StepExecutor {
    store: Arc<dyn ResourceStore>,
    status: StatusWriter,
}

impl StepExecutor {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        let status = StatusWriter::new(Arc::clone(&store));
        Self { store, status }
    }

    /// Runs one execution pass: syncs step slots, aggregates, persists
    pub async fn run(&self, invocation: &mut PipelineInvocation) -> Result<()> {
        let pipeline = self.fetch_pipeline(invocation).await?;

        self.sync_steps(invocation, &pipeline).await?;
        aggregate(&mut invocation.status, pipeline.spec.steps.len());

        debug!(
            "Invocation {} is {:?} with {} step slot(s)",
            invocation.name(),
            invocation.status.phase,
            invocation.status.step_statuses.len()
        );

        self.status.update_status(invocation).await
    }

    async fn fetch_pipeline(&self, invocation: &PipelineInvocation) -> Result<Pipeline> {
        let name = &invocation.spec.pipeline_name;
        let doc = self
            .store
            .get(API_VERSION, PIPELINE_KIND, invocation.namespace(), name)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    ReconcileError::PipelineNotFound {
                        pipeline: name.clone(),
                    }
                } else {
                    e.into()
                }
            })?;

        Ok(Pipeline::from_document(doc)?)
    }

    /// Updates step slots in order, stopping at the first step that has not
    /// terminated
    ///
    /// Terminated slots are final and never refreshed.
    async fn sync_steps(&self, invocation: &mut PipelineInvocation, pipeline: &Pipeline) -> Result<()> {
        for (index, step) in pipeline.spec.steps.iter().enumerate() {
            if invocation.status.step_statuses.len() <= index {
                invocation
                    .status
                    .step_statuses
                    .push(FunctionInvocationStatus::waiting(PLACEHOLDER_MESSAGE));
            }

            if invocation.status.step_statuses[index].is_terminated() {
                continue;
            }

            let observed = self.ensure_step(invocation, step).await?;
            if let Some(status) = observed {
                invocation.status.step_statuses[index] = status;
            }

            if !invocation.status.step_statuses[index].is_terminated() {
                debug!(
                    "Step {} of invocation {} has not finished",
                    step.name,
                    invocation.name()
                );
                break;
            }
        }

        Ok(())
    }

    /// Creates the step's function invocation if needed and returns its status
    async fn ensure_step(
        &self,
        invocation: &PipelineInvocation,
        step: &PipelineStep,
    ) -> Result<Option<FunctionInvocationStatus>> {
        let child = build_function_invocation(invocation, step)?;
        let name = child.name().to_string();

        match self.store.create(child.to_document()?).await {
            Ok(_) => info!(
                "Started step {} of invocation {} as {}",
                step.name,
                invocation.name(),
                name
            ),
            Err(e) if e.is_already_exists() => debug!("Function invocation {} already exists", name),
            Err(e) => return Err(e.into()),
        }

        let doc = self
            .store
            .get(API_VERSION, FUNCTION_INVOCATION_KIND, invocation.namespace(), &name)
            .await?;

        Ok(FunctionInvocation::from_document(doc)?.status.slot())
    }
}

/// Builds the function invocation that runs `step`
///
/// Applies the invocation's overrides for the step and mounts every service's
/// secret.
fn build_function_invocation(
    invocation: &PipelineInvocation,
    step: &PipelineStep,
) -> Result<FunctionInvocation> {
    let overrides = invocation
        .spec
        .steps
        .get(&step.name)
        .cloned()
        .unwrap_or_default();

    let mut spec = FunctionInvocationSpec {
        function_name: step.function_name.clone(),
        env: overrides.env,
        resources: overrides.resources,
        ..Default::default()
    };

    for (index, service) in invocation.spec.services.iter().enumerate() {
        let id = service_child_name(invocation.name(), index);
        spec.volumes.push(Volume {
            name: id.clone(),
            secret: Some(SecretVolumeSource {
                secret_name: id.clone(),
            }),
        });
        spec.volume_mounts.push(VolumeMount {
            name: id,
            mount_path: service_mount_path(&service.metadata.name),
        });
    }

    let mut child = FunctionInvocation::new(
        invocation.namespace(),
        function_child_name(invocation.name(), &step.name),
        spec,
    );
    child.metadata.owner_references = owner_references(invocation)?;

    Ok(child)
}
