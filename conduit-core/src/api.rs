//! API identifiers
//!
//! API version, kinds and well-known keys owned by the controller.

/// `apiVersion` value carried by the controller's documents
pub const API_VERSION: &str = "core.conduit.dev/v1alpha1";

pub const PIPELINE_INVOCATION_KIND: &str = "PipelineInvocation";
pub const PIPELINE_KIND: &str = "Pipeline";
pub const FUNCTION_INVOCATION_KIND: &str = "FunctionInvocation";

/// Finalizer attached to an invocation while its services may still exist
pub const FINALIZER: &str = "core.conduit.dev";

/// Label binding a service child to the secret it materializes
pub const SECRET_NAME_LABEL: &str = "service.conduit.dev/secret-name";

/// Directory under which each declared service is mounted into function containers
pub const SERVICE_MOUNT_ROOT: &str = "/var/run/conduit.dev/services";
