//! Pipeline domain types

use serde::{Deserialize, Serialize};

use crate::api::PIPELINE_KIND;
use crate::document::{Object, ResourceSpec};

/// Pipeline template: the ordered steps an invocation executes
pub type Pipeline = Object<PipelineSpec>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSpec {
    #[serde(default)]
    pub steps: Vec<PipelineStep>,
}

/// One named step backed by a function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStep {
    pub name: String,
    pub function_name: String,
}

impl ResourceSpec for PipelineSpec {
    /// Kept as written by whoever owns the template; never read here
    type Status = serde_json::Value;

    const KIND: &'static str = PIPELINE_KIND;
}
