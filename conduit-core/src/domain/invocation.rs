//! Pipeline invocation domain types
//!
//! An invocation tracks one execution of a pipeline: which services it needs,
//! per-step overrides, and the aggregated status the controller maintains.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::api::PIPELINE_INVOCATION_KIND;
use crate::document::{Object, ResourceSpec};
use crate::domain::function::{EnvVar, FunctionInvocationStatus, ResourceRequirements};
use crate::domain::service::ServiceDeclaration;

/// One execution of a pipeline
pub type PipelineInvocation = Object<PipelineInvocationSpec>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineInvocationSpec {
    pub pipeline_name: String,
    /// Per-step overrides, keyed by step name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub steps: BTreeMap<String, StepOverride>,
    /// Services to provision before any step runs, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceDeclaration>,
}

impl ResourceSpec for PipelineInvocationSpec {
    type Status = PipelineInvocationStatus;

    const KIND: &'static str = PIPELINE_INVOCATION_KIND;
}

/// Environment and resources applied to one step's function invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOverride {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineInvocationStatus {
    #[serde(rename = "state", default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,
    /// One slot per pipeline step, aligned by index
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub step_statuses: Vec<FunctionInvocationStatus>,
}

impl PipelineInvocationStatus {
    /// Moves the phase forward to `phase`
    ///
    /// Phases only advance; a request to move to an earlier phase is ignored.
    /// Returns `true` if the phase is now `phase`.
    pub fn advance(&mut self, phase: Phase) -> bool {
        match self.phase {
            Some(current) if current > phase => false,
            _ => {
                self.phase = Some(phase);
                true
            }
        }
    }
}

/// Coarse lifecycle state of an invocation, in lifecycle order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Services are being created
    Preparing,
    /// Services are ready, steps not yet started
    Scheduling,
    /// At least one step has started
    Running,
    /// Every step has terminated
    Finalizing,
    /// Teardown confirmed
    Terminated,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Preparing => "preparing",
            Phase::Scheduling => "scheduling",
            Phase::Running => "running",
            Phase::Finalizing => "finalizing",
            Phase::Terminated => "terminated",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preparing" => Ok(Phase::Preparing),
            "scheduling" => Ok(Phase::Scheduling),
            "running" => Ok(Phase::Running),
            "finalizing" => Ok(Phase::Finalizing),
            "terminated" => Ok(Phase::Terminated),
            _ => Err(format!("Invalid invocation phase: {s}")),
        }
    }
}
