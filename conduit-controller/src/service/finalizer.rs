//! Finalizer Service
//!
//! Tears down an invocation's service children once deletion is requested, and
//! releases the invocation only after every child is confirmed gone.

use conduit_client::ResourceStore;
use conduit_core::api::FINALIZER;
use conduit_core::domain::invocation::{Phase, PipelineInvocation};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::Result;
use crate::naming::service_child_name;
use crate::service::status::StatusWriter;

pub struct InvocationFinalizer {
    store: Arc<dyn ResourceStore>,
    status: StatusWriter,
}

impl InvocationFinalizer {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        let status = StatusWriter::new(Arc::clone(&store));
        Self { store, status }
    }

    /// Runs one teardown pass
    ///
    /// Returns `false` while any service child still exists; the finalizer is
    /// kept and a later pass retries. Once all are gone the invocation is
    /// marked terminated and the finalizer removed in a single write.
    pub async fn finalize(&self, invocation: &mut PipelineInvocation) -> Result<bool> {
        info!("Finalizing invocation {}", invocation.name());

        self.delete_services(invocation).await?;

        if !self.services_gone(invocation).await? {
            info!(
                "Waiting for services of invocation {} to be deleted",
                invocation.name()
            );
            return Ok(false);
        }

        invocation.status.message.clear();
        invocation.status.advance(Phase::Terminated);
        invocation.metadata.remove_finalizer(FINALIZER);
        self.status.write(invocation).await?;

        // Releasing the last finalizer lets the store remove the object
        match self.status.refresh(invocation).await {
            Err(e) if e.is_not_found() => {
                debug!("Invocation {} removed by the store", invocation.name());
            }
            other => other?,
        }

        info!("Invocation {} terminated", invocation.name());
        Ok(true)
    }

    /// Requests deletion of every service child; already-absent ones are fine
    async fn delete_services(&self, invocation: &PipelineInvocation) -> Result<()> {
        for (index, service) in invocation.spec.services.iter().enumerate() {
            let id = service_child_name(invocation.name(), index);
            match self
                .store
                .delete(&service.api_version, &service.kind, invocation.namespace(), &id)
                .await
            {
                Ok(()) => debug!("Requested deletion of service {}", id),
                Err(e) if e.is_not_found() => debug!("Service {} already deleted", id),
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    /// Whether every service child is confirmed absent
    async fn services_gone(&self, invocation: &PipelineInvocation) -> Result<bool> {
        for (index, service) in invocation.spec.services.iter().enumerate() {
            let id = service_child_name(invocation.name(), index);
            match self
                .store
                .get(&service.api_version, &service.kind, invocation.namespace(), &id)
                .await
            {
                Ok(_) => {
                    debug!("Service {} still exists", id);
                    return Ok(false);
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(true)
    }
}
