//! Provisioner Service
//!
//! Creates one child per declared service and gates the invocation on all of
//! them reporting ready. Runs while the invocation is preparing.

use conduit_client::ResourceStore;
use conduit_core::Document;
use conduit_core::api::{API_VERSION, FINALIZER, PIPELINE_INVOCATION_KIND, SECRET_NAME_LABEL};
use conduit_core::domain::invocation::{Phase, PipelineInvocation};
use conduit_core::domain::service::{
    Readiness, ServiceDeclaration, ServiceSpecLookup, ServiceStatus, lookup_service_spec,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::{ReconcileError, Result};
use crate::naming::{owner_references, service_child_name};
use crate::service::status::StatusWriter;

/// Message shown while services are provisioned
pub const PREPARING_MESSAGE: &str = "Services are being created";

pub struct ServiceProvisioner {
    store: Arc<dyn ResourceStore>,
    status: StatusWriter,
}

impl ServiceProvisioner {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        let status = StatusWriter::new(Arc::clone(&store));
        Self { store, status }
    }

    /// Runs one preparation pass
    ///
    /// Attaches the finalizer, ensures every service child exists and, once
    /// all of them are ready, moves the invocation to scheduling. Status is
    /// persisted on entry and on exit. On failure the error message is
    /// persisted before the error is returned.
    ///
    /// Returns `true` if every service is ready.
    pub async fn prepare(&self, invocation: &mut PipelineInvocation) -> Result<bool> {
        invocation.metadata.add_finalizer(FINALIZER);
        invocation.status.advance(Phase::Preparing);
        invocation.status.message = PREPARING_MESSAGE.to_string();
        self.status.update_status(invocation).await?;

        let ready = match self.provision_all(invocation).await {
            Ok(ready) => ready,
            Err(e) => {
                error!("Failed to prepare invocation {}: {}", invocation.name(), e);
                invocation.status.message = e.to_string();
                if let Err(write_err) = self.status.update_status(invocation).await {
                    warn!(
                        "Failed to record error on invocation {}: {}",
                        invocation.name(),
                        write_err
                    );
                }
                return Err(e);
            }
        };

        if ready {
            info!("All services of invocation {} ready", invocation.name());
            invocation.status.message.clear();
            invocation.status.advance(Phase::Scheduling);
        }

        self.status.update_status(invocation).await?;
        Ok(ready)
    }

    /// Ensures every declared service exists and reports whether all are ready
    ///
    /// Stops at the first error; later services are not evaluated.
    async fn provision_all(&self, invocation: &PipelineInvocation) -> Result<bool> {
        if invocation.spec.services.is_empty() {
            info!("No services specified for invocation {}", invocation.name());
            return Ok(true);
        }

        // Service specs are free-form, so they are read from the raw stored document
        let persisted = self
            .store
            .get(
                API_VERSION,
                PIPELINE_INVOCATION_KIND,
                invocation.namespace(),
                invocation.name(),
            )
            .await?;

        let mut ready = true;
        for (index, declaration) in invocation.spec.services.iter().enumerate() {
            match self
                .provision(invocation, &persisted, declaration, index)
                .await?
            {
                Readiness::Ready => {
                    info!(
                        "Service {} ({} {}) ready",
                        declaration.metadata.name, declaration.api_version, declaration.kind
                    );
                }
                Readiness::NotReady => {
                    info!(
                        "Service {} ({} {}) not yet ready",
                        declaration.metadata.name, declaration.api_version, declaration.kind
                    );
                    ready = false;
                }
                Readiness::Failed(message) => {
                    return Err(ReconcileError::ServiceFailed {
                        service: declaration.metadata.name.clone(),
                        message,
                    });
                }
            }
        }

        Ok(ready)
    }

    /// Creates the child for one service if needed and reads its readiness
    async fn provision(
        &self,
        invocation: &PipelineInvocation,
        persisted: &Document,
        declaration: &ServiceDeclaration,
        index: usize,
    ) -> Result<Readiness> {
        let id = service_child_name(invocation.name(), index);

        let spec = match lookup_service_spec(persisted, &declaration.metadata.name) {
            ServiceSpecLookup::Found(spec) => spec,
            ServiceSpecLookup::Missing => {
                return Err(ReconcileError::ServiceNotFound {
                    service: declaration.metadata.name.clone(),
                });
            }
            ServiceSpecLookup::ListUnreadable => {
                return Err(ReconcileError::ServicesUnreadable {
                    invocation: invocation.name().to_string(),
                });
            }
        };

        let mut child = Document::new(
            declaration.api_version.clone(),
            declaration.kind.clone(),
            invocation.namespace(),
            id.clone(),
        );
        child.metadata.annotations = declaration.metadata.annotations.clone();
        child
            .metadata
            .labels
            .insert(SECRET_NAME_LABEL.to_string(), id.clone());
        child.metadata.owner_references = owner_references(invocation)?;
        child.spec = spec;

        match self.store.create(child).await {
            Ok(_) => info!("Created service {} for invocation {}", id, invocation.name()),
            Err(e) if e.is_already_exists() => debug!("Service {} already exists", id),
            Err(e) => return Err(e.into()),
        }

        let current = self
            .store
            .get(
                &declaration.api_version,
                &declaration.kind,
                invocation.namespace(),
                &id,
            )
            .await?;

        Ok(ServiceStatus::from_document(&current).readiness())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, SERVICE_KIND};
    use conduit_client::{MemoryStore, StoreOp};
    use conduit_core::domain::service::DEFAULT_SERVICE_ERROR;
    use serde_json::json;

    fn provisioner(store: &MemoryStore) -> ServiceProvisioner {
        ServiceProvisioner::new(Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn test_no_services_goes_to_scheduling() {
        let store = MemoryStore::new();
        let mut invocation = testing::seed(&store, testing::invocation_doc("build-1", "build", &[]));

        let ready = provisioner(&store).prepare(&mut invocation).await.unwrap();

        assert!(ready);
        let stored = testing::load(&store, "build-1");
        assert_eq!(stored.status.phase, Some(Phase::Scheduling));
        assert!(stored.status.message.is_empty());
        assert!(stored.metadata.has_finalizer(FINALIZER));
        assert!(
            !store
                .operations()
                .iter()
                .any(|op| matches!(op, StoreOp::Create { .. }))
        );
    }

    #[tokio::test]
    async fn test_creates_service_children() {
        let store = MemoryStore::new();
        let mut invocation = testing::seed(
            &store,
            testing::invocation_doc("build-1", "build", &["registry", "signing"]),
        );

        let ready = provisioner(&store).prepare(&mut invocation).await.unwrap();
        assert!(!ready);

        let child = store.find(SERVICE_KIND, "build-1-0").unwrap();
        assert_eq!(child.api_version, testing::SERVICE_API);
        assert_eq!(child.spec, json!({"scope": "registry"}));
        assert_eq!(
            child.metadata.labels.get(SECRET_NAME_LABEL).map(String::as_str),
            Some("build-1-0")
        );
        assert_eq!(
            child.metadata.annotations.get("team").map(String::as_str),
            Some("infra")
        );
        assert_eq!(child.metadata.owner_references[0].name, "build-1");
        assert_eq!(
            child.metadata.owner_references[0].uid,
            invocation.metadata.uid.clone().unwrap()
        );

        let second = store.find(SERVICE_KIND, "build-1-1").unwrap();
        assert_eq!(second.spec, json!({"scope": "signing"}));

        let stored = testing::load(&store, "build-1");
        assert_eq!(stored.status.phase, Some(Phase::Preparing));
        assert_eq!(stored.status.message, PREPARING_MESSAGE);
    }

    #[tokio::test]
    async fn test_ready_services_advance_to_scheduling() {
        let store = MemoryStore::new();
        let mut invocation = testing::seed(
            &store,
            testing::invocation_doc("build-1", "build", &["registry", "signing"]),
        );
        let provisioner = provisioner(&store);

        assert!(!provisioner.prepare(&mut invocation).await.unwrap());

        store.set_status(SERVICE_KIND, "build-1-0", testing::service_status("ready", None));
        assert!(!provisioner.prepare(&mut invocation).await.unwrap());
        assert_eq!(
            testing::load(&store, "build-1").status.phase,
            Some(Phase::Preparing)
        );

        store.set_status(SERVICE_KIND, "build-1-1", testing::service_status("ready", None));
        assert!(provisioner.prepare(&mut invocation).await.unwrap());
        assert_eq!(
            testing::load(&store, "build-1").status.phase,
            Some(Phase::Scheduling)
        );
    }

    #[tokio::test]
    async fn test_repeated_passes_are_idempotent() {
        let store = MemoryStore::new();
        let mut invocation = testing::seed(
            &store,
            testing::invocation_doc("build-1", "build", &["registry"]),
        );
        let provisioner = provisioner(&store);

        provisioner.prepare(&mut invocation).await.unwrap();
        let first = store.find(SERVICE_KIND, "build-1-0").unwrap();

        provisioner.prepare(&mut invocation).await.unwrap();
        let second = store.find(SERVICE_KIND, "build-1-0").unwrap();

        assert_eq!(first, second);
        assert_eq!(store.all(SERVICE_KIND).len(), 1);
        assert_eq!(
            testing::load(&store, "build-1").metadata.finalizers,
            vec![FINALIZER.to_string()]
        );
    }

    #[tokio::test]
    async fn test_failed_service_records_message() {
        let store = MemoryStore::new();
        let mut invocation = testing::seed(
            &store,
            testing::invocation_doc("build-1", "build", &["registry", "signing"]),
        );
        let provisioner = provisioner(&store);

        provisioner.prepare(&mut invocation).await.unwrap();
        store.set_status(
            SERVICE_KIND,
            "build-1-0",
            testing::service_status("error", Some("quota exceeded")),
        );

        let err = provisioner.prepare(&mut invocation).await.unwrap_err();
        assert!(matches!(err, ReconcileError::ServiceFailed { .. }));
        assert!(err.to_string().contains("quota exceeded"));

        let stored = testing::load(&store, "build-1");
        assert_eq!(stored.status.phase, Some(Phase::Preparing));
        assert!(stored.status.message.contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_failed_service_without_message_uses_default() {
        let store = MemoryStore::new();
        let mut invocation = testing::seed(
            &store,
            testing::invocation_doc("build-1", "build", &["registry"]),
        );
        let provisioner = provisioner(&store);

        provisioner.prepare(&mut invocation).await.unwrap();
        store.set_status(SERVICE_KIND, "build-1-0", testing::service_status("error", None));

        let err = provisioner.prepare(&mut invocation).await.unwrap_err();
        assert!(err.to_string().contains("Internal Error"));
    }

    #[tokio::test]
    async fn test_first_error_stops_later_services() {
        let store = MemoryStore::new();
        let mut invocation = testing::seed(
            &store,
            testing::invocation_doc("build-1", "build", &["registry", "signing"]),
        );

        store.inject_failure(SERVICE_KIND, "build-1-0");
        let result = provisioner(&store).prepare(&mut invocation).await;

        assert!(matches!(result, Err(ReconcileError::Store(_))));
        assert!(store.find(SERVICE_KIND, "build-1-1").is_none());
        let stored = testing::load(&store, "build-1");
        assert!(stored.status.message.contains("Injected failure"));
    }

    #[tokio::test]
    async fn test_declared_service_missing_from_persisted_list() {
        let store = MemoryStore::new();
        let mut invocation = testing::seed(
            &store,
            testing::invocation_doc("build-1", "build", &["registry"]),
        );
        // The typed copy disagrees with what is stored
        invocation.spec.services[0].metadata.name = "cache".to_string();

        let err = provisioner(&store)
            .provision_all(&invocation)
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::ServiceNotFound { ref service } if service == "cache"));
        assert!(store.all(SERVICE_KIND).is_empty());
    }

    #[tokio::test]
    async fn test_non_map_service_spec_is_treated_as_empty() {
        let store = MemoryStore::new();
        let mut doc = testing::invocation_doc("build-1", "build", &["registry", "signing"]);
        doc.spec["services"][1]["spec"] = json!("opaque");
        let mut invocation = testing::seed(&store, doc);

        let ready = provisioner(&store).prepare(&mut invocation).await.unwrap();
        assert!(!ready);

        assert_eq!(
            store.find(SERVICE_KIND, "build-1-0").unwrap().spec,
            json!({"scope": "registry"})
        );
        assert_eq!(store.find(SERVICE_KIND, "build-1-1").unwrap().spec, json!({}));
    }

    #[tokio::test]
    async fn test_unreadable_persisted_services() {
        let store = MemoryStore::new();
        let invocation = testing::seed(
            &store,
            testing::invocation_doc("build-1", "build", &["registry"]),
        );
        // The stored list is replaced after the typed copy was decoded
        let mut doc = store.find(PIPELINE_INVOCATION_KIND, "build-1").unwrap();
        doc.spec["services"] = json!("not-a-list");
        store.insert(doc);

        let err = provisioner(&store)
            .provision_all(&invocation)
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::ServicesUnreadable { ref invocation } if invocation == "build-1"));
        assert!(store.all(SERVICE_KIND).is_empty());
    }

    #[tokio::test]
    async fn test_malformed_error_message_fails_with_default() {
        let store = MemoryStore::new();
        let mut invocation = testing::seed(
            &store,
            testing::invocation_doc("build-1", "build", &["registry"]),
        );
        let provisioner = provisioner(&store);

        provisioner.prepare(&mut invocation).await.unwrap();
        store.set_status(
            SERVICE_KIND,
            "build-1-0",
            json!({"status": "error", "message": {"code": 1}}),
        );

        let err = provisioner.prepare(&mut invocation).await.unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::ServiceFailed { ref message, .. } if message == DEFAULT_SERVICE_ERROR
        ));
    }

    #[tokio::test]
    async fn test_duplicate_service_names_use_last_entry() {
        let store = MemoryStore::new();
        let mut doc = testing::invocation_doc("build-1", "build", &["registry", "registry"]);
        doc.spec["services"][1]["spec"] = json!({"scope": "second"});
        let mut invocation = testing::seed(&store, doc);

        provisioner(&store).prepare(&mut invocation).await.unwrap();

        assert_eq!(
            store.find(SERVICE_KIND, "build-1-0").unwrap().spec,
            json!({"scope": "second"})
        );
    }
}
