//! Function invocation domain types
//!
//! A function invocation runs one pipeline step. Its status follows container
//! lifecycle semantics: exactly one of waiting, running or terminated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::api::FUNCTION_INVOCATION_KIND;
use crate::document::{Object, ResourceSpec};

/// Child resource executing a single step
pub type FunctionInvocation = Object<FunctionInvocationSpec>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionInvocationSpec {
    pub function_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
}

impl ResourceSpec for FunctionInvocationSpec {
    type Status = ObservedFunctionStatus;

    const KIND: &'static str = FUNCTION_INVOCATION_KIND;
}

/// Observed state of a function invocation
///
/// Also used as the per-step status slot of a pipeline invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionInvocationStatus {
    pub state: ContainerState,
}

impl FunctionInvocationStatus {
    pub fn waiting(message: impl Into<String>) -> Self {
        Self {
            state: ContainerState::Waiting(ContainerStateWaiting {
                reason: None,
                message: Some(message.into()),
            }),
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.state.terminated().is_some()
    }
}

/// Status of a function invocation child as its controller writes it
///
/// The function controller may write a status before it has a state to
/// report, so every part of it is optional: `{}`, `{"state": null}` and
/// `{"state": {}}` all mean "no state yet".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedFunctionStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ContainerStateFields>,
}

impl ObservedFunctionStatus {
    /// The reported state as a step slot, or `None` if nothing was reported
    pub fn slot(&self) -> Option<FunctionInvocationStatus> {
        self.state
            .as_ref()
            .and_then(ContainerStateFields::state)
            .map(|state| FunctionInvocationStatus { state })
    }
}

/// Wire form of a container state: one optional entry per sub-state
///
/// When more than one entry is set, terminated wins over running, and running
/// over waiting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStateFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiting: Option<ContainerStateWaiting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running: Option<ContainerStateRunning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminated: Option<ContainerStateTerminated>,
}

impl ContainerStateFields {
    pub fn state(&self) -> Option<ContainerState> {
        self.terminated
            .clone()
            .map(ContainerState::Terminated)
            .or_else(|| self.running.clone().map(ContainerState::Running))
            .or_else(|| self.waiting.clone().map(ContainerState::Waiting))
    }
}

/// Container lifecycle state, encoded as `{"waiting": {...}}`, `{"running": {...}}`
/// or `{"terminated": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ContainerStateFields")]
pub enum ContainerState {
    Waiting(ContainerStateWaiting),
    Running(ContainerStateRunning),
    Terminated(ContainerStateTerminated),
}

impl TryFrom<ContainerStateFields> for ContainerState {
    type Error = &'static str;

    fn try_from(fields: ContainerStateFields) -> Result<Self, Self::Error> {
        fields
            .state()
            .ok_or("container state has no waiting, running or terminated entry")
    }
}

impl ContainerState {
    pub fn terminated(&self) -> Option<&ContainerStateTerminated> {
        match self {
            ContainerState::Terminated(terminated) => Some(terminated),
            _ => None,
        }
    }

    /// Start time of the container: running `startedAt`, else terminated `startedAt`
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match self {
            ContainerState::Waiting(_) => None,
            ContainerState::Running(running) => running.started_at,
            ContainerState::Terminated(terminated) => terminated.started_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStateWaiting {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStateRunning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStateTerminated {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub exit_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvVar {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Compute resources, quantities kept in their string form (e.g. `"500m"`, `"1Gi"`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirements {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub limits: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requests: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<SecretVolumeSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretVolumeSource {
    pub secret_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    pub name: String,
    pub mount_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_container_state_wire_format() {
        let status: FunctionInvocationStatus = serde_json::from_value(json!({
            "state": {
                "terminated": {
                    "startedAt": "2024-05-01T10:00:00Z",
                    "finishedAt": "2024-05-01T10:05:00Z",
                    "exitCode": 0
                }
            }
        }))
        .unwrap();

        assert!(status.is_terminated());
        let terminated = status.state.terminated().unwrap();
        assert_eq!(
            terminated.finished_at.unwrap().to_rfc3339(),
            "2024-05-01T10:05:00+00:00"
        );
    }

    #[test]
    fn test_waiting_placeholder_encoding() {
        let status = FunctionInvocationStatus::waiting("Containers are being created");
        let value = serde_json::to_value(&status).unwrap();

        assert_eq!(
            value,
            json!({ "state": { "waiting": { "message": "Containers are being created" } } })
        );
        assert!(!status.is_terminated());
        assert!(status.state.started_at().is_none());
    }

    #[test]
    fn test_observed_status_without_state_has_no_slot() {
        for value in [json!({}), json!({ "state": null }), json!({ "state": {} })] {
            let observed: ObservedFunctionStatus = serde_json::from_value(value).unwrap();
            assert_eq!(observed.slot(), None);
        }
    }

    #[test]
    fn test_observed_status_slot() {
        let observed: ObservedFunctionStatus = serde_json::from_value(json!({
            "state": { "running": { "startedAt": "2024-05-01T10:00:00Z" } }
        }))
        .unwrap();

        let slot = observed.slot().unwrap();
        assert!(matches!(slot.state, ContainerState::Running(_)));
        assert!(!slot.is_terminated());
    }

    #[test]
    fn test_terminated_entry_wins() {
        let status: FunctionInvocationStatus = serde_json::from_value(json!({
            "state": {
                "running": { "startedAt": "2024-05-01T10:00:00Z" },
                "terminated": { "exitCode": 1 }
            }
        }))
        .unwrap();
        assert!(status.is_terminated());

        let empty = serde_json::from_value::<FunctionInvocationStatus>(json!({ "state": {} }));
        assert!(empty.is_err());
    }

    #[test]
    fn test_started_at_prefers_running_then_terminated() {
        let t0 = "2024-05-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap();

        let running = ContainerState::Running(ContainerStateRunning {
            started_at: Some(t0),
        });
        assert_eq!(running.started_at(), Some(t0));

        let terminated = ContainerState::Terminated(ContainerStateTerminated {
            started_at: Some(t0),
            ..Default::default()
        });
        assert_eq!(terminated.started_at(), Some(t0));
    }
}
