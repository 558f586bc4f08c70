//! Child identities and ownership
//!
//! Children are named deterministically from their parent so that every pass
//! addresses the same objects, and carry a controller owner reference so the
//! platform deletes them with the invocation.

use conduit_core::api::{API_VERSION, PIPELINE_INVOCATION_KIND, SERVICE_MOUNT_ROOT};
use conduit_core::domain::invocation::PipelineInvocation;
use conduit_core::OwnerReference;

use crate::error::{ReconcileError, Result};

/// Name of the service child for the declaration at `index`
pub fn service_child_name(invocation: &str, index: usize) -> String {
    format!("{}-{}", invocation, index)
}

/// Name of the function invocation child running `step`
pub fn function_child_name(invocation: &str, step: &str) -> String {
    format!("{}-{}", invocation, step)
}

/// Where the service declared as `service_name` is mounted in function containers
pub fn service_mount_path(service_name: &str) -> String {
    format!("{}/{}", SERVICE_MOUNT_ROOT, service_name)
}

/// Controller owner reference pointing at `invocation`
pub fn owner_references(invocation: &PipelineInvocation) -> Result<Vec<OwnerReference>> {
    let uid = invocation
        .metadata
        .uid
        .clone()
        .ok_or_else(|| ReconcileError::MissingUid {
            invocation: invocation.name().to_string(),
        })?;

    Ok(vec![OwnerReference {
        api_version: API_VERSION.to_string(),
        kind: PIPELINE_INVOCATION_KIND.to_string(),
        name: invocation.name().to_string(),
        uid,
        controller: Some(true),
        block_owner_deletion: Some(true),
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::domain::invocation::PipelineInvocationSpec;

    #[test]
    fn test_child_names() {
        assert_eq!(service_child_name("build-1", 0), "build-1-0");
        assert_eq!(function_child_name("build-1", "compile"), "build-1-compile");
        assert_eq!(
            service_mount_path("registry"),
            "/var/run/conduit.dev/services/registry"
        );
    }

    #[test]
    fn test_owner_references_require_uid() {
        let mut invocation =
            PipelineInvocation::new("ci", "build-1", PipelineInvocationSpec::default());
        assert!(matches!(
            owner_references(&invocation),
            Err(ReconcileError::MissingUid { .. })
        ));

        invocation.metadata.uid = Some("u-1".to_string());
        let refs = owner_references(&invocation).unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, "PipelineInvocation");
        assert_eq!(refs[0].uid, "u-1");
        assert_eq!(refs[0].controller, Some(true));
    }
}
