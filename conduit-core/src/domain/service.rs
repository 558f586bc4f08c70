//! Service domain types
//!
//! Services are auxiliary dependencies (credential issuers and the like) that an
//! invocation provisions before any step runs. Their kind is chosen by the user,
//! so service children are handled as generic [`Document`]s with typed
//! accessors for the few fields the controller reads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::document::Document;

/// Message reported when a failed service does not say why
pub const DEFAULT_SERVICE_ERROR: &str = "Internal Error";

/// A service declared in an invocation's `spec.services`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDeclaration {
    pub api_version: String,
    pub kind: String,
    pub metadata: ServiceMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Outcome of looking up a service's spec in a persisted invocation document
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceSpecLookup {
    /// The spec of the matching entry (empty when the entry carries none or a
    /// spec that is not a map)
    Found(Value),
    /// The list exists but has no entry with that name
    Missing,
    /// `spec.services` is absent or not a list of services
    ListUnreadable,
}

/// Finds the spec of the service called `name` in the invocation's own
/// persisted `spec.services` list
///
/// When several entries share the name, the last one wins.
pub fn lookup_service_spec(invocation: &Document, name: &str) -> ServiceSpecLookup {
    let Some(Value::Array(entries)) = invocation.spec.get("services") else {
        return ServiceSpecLookup::ListUnreadable;
    };

    entries
        .iter()
        .rev()
        .find(|entry| entry_name(entry) == Some(name))
        .map(|entry| match entry.get("spec") {
            Some(Value::Object(spec)) => ServiceSpecLookup::Found(Value::Object(spec.clone())),
            _ => ServiceSpecLookup::Found(Value::Object(Map::new())),
        })
        .unwrap_or(ServiceSpecLookup::Missing)
}

fn entry_name(entry: &Value) -> Option<&str> {
    entry.get("metadata")?.get("name")?.as_str()
}

/// Value of a service child's `status.status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Pending,
    Ready,
    Error,
    #[serde(other)]
    Unknown,
}

/// Status sub-document reported by a service child
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ServiceState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Readiness of one service child
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// No state reported yet, or still pending
    NotReady,
    Ready,
    /// The service reported an error, with its message
    Failed(String),
}

impl ServiceStatus {
    /// Reads the status of a service child
    ///
    /// Each field is read on its own: a field that does not have the expected
    /// shape is treated as absent without discarding the other.
    pub fn from_document(doc: &Document) -> Self {
        let status = doc
            .status
            .get("status")
            .and_then(|value| ServiceState::deserialize(value).ok());
        let message = doc
            .status
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);

        Self { status, message }
    }

    pub fn readiness(&self) -> Readiness {
        match self.status {
            Some(ServiceState::Ready) => Readiness::Ready,
            Some(ServiceState::Error) => Readiness::Failed(
                self.message
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SERVICE_ERROR.to_string()),
            ),
            Some(ServiceState::Pending) | Some(ServiceState::Unknown) | None => {
                Readiness::NotReady
            }
        }
    }
}
