//! Test fixtures shared by the controller's unit tests

use chrono::{DateTime, TimeZone, Utc};
use conduit_client::MemoryStore;
use conduit_core::Document;
use conduit_core::api::{API_VERSION, PIPELINE_INVOCATION_KIND, PIPELINE_KIND};
use conduit_core::domain::invocation::PipelineInvocation;
use serde_json::{Value, json};

pub(crate) const NS: &str = "ci";
pub(crate) const SERVICE_API: &str = "secrets.example.com/v1";
pub(crate) const SERVICE_KIND: &str = "Credential";

pub(crate) fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

/// Pipeline template with `(step, function)` steps
pub(crate) fn pipeline_doc(name: &str, steps: &[(&str, &str)]) -> Document {
    let mut doc = Document::new(API_VERSION, PIPELINE_KIND, NS, name);
    doc.spec = json!({
        "steps": steps
            .iter()
            .map(|(step, function)| json!({"name": step, "functionName": function}))
            .collect::<Vec<_>>(),
    });
    doc
}

/// Invocation of `pipeline` declaring one credential service per name
pub(crate) fn invocation_doc(name: &str, pipeline: &str, services: &[&str]) -> Document {
    let mut doc = Document::new(API_VERSION, PIPELINE_INVOCATION_KIND, NS, name);
    doc.spec = json!({
        "pipelineName": pipeline,
        "services": services
            .iter()
            .map(|service| json!({
                "apiVersion": SERVICE_API,
                "kind": SERVICE_KIND,
                "metadata": {
                    "name": service,
                    "annotations": {"team": "infra"},
                },
                "spec": {"scope": service},
            }))
            .collect::<Vec<_>>(),
    });
    doc
}

/// Stores `doc` and returns it decoded, as the controller would receive it
pub(crate) fn seed(store: &MemoryStore, doc: Document) -> PipelineInvocation {
    PipelineInvocation::from_document(store.insert(doc)).unwrap()
}

/// Current stored state of the invocation `name`
pub(crate) fn load(store: &MemoryStore, name: &str) -> PipelineInvocation {
    let doc = store.find(PIPELINE_INVOCATION_KIND, name).unwrap();
    PipelineInvocation::from_document(doc).unwrap()
}

pub(crate) fn service_status(state: &str, message: Option<&str>) -> Value {
    match message {
        Some(message) => json!({"status": state, "message": message}),
        None => json!({"status": state}),
    }
}

pub(crate) fn running(started: i64) -> Value {
    json!({"state": {"running": {"startedAt": at(started)}}})
}

pub(crate) fn terminated(started: i64, finished: i64) -> Value {
    json!({"state": {"terminated": {
        "startedAt": at(started),
        "finishedAt": at(finished),
        "exitCode": 0,
    }}})
}
