//! In-memory resource store with operation recording
//!
//! Behaves like the platform store where the controller can observe it:
//! - `uid` and `resourceVersion` are assigned on every write
//! - updates carrying a stale `resourceVersion` are rejected with a conflict
//! - deleting an object with finalizers only marks it for deletion; clearing
//!   its last finalizer afterwards removes it
//!
//! Every call is recorded so tests can assert on what the controller did, and
//! failures can be injected per object.

use async_trait::async_trait;
use chrono::Utc;
use conduit_core::Document;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::ResourceStore;
use crate::error::{Result, StoreError};

/// Record of a store operation for test assertions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Get { kind: String, name: String },
    Create { kind: String, name: String },
    Update { kind: String, name: String },
    Delete { kind: String, name: String },
    List { kind: String },
}

impl StoreOp {
    pub fn kind(&self) -> &str {
        match self {
            StoreOp::Get { kind, .. }
            | StoreOp::Create { kind, .. }
            | StoreOp::Update { kind, .. }
            | StoreOp::Delete { kind, .. }
            | StoreOp::List { kind } => kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Key {
    api_version: String,
    kind: String,
    namespace: String,
    name: String,
}

impl Key {
    fn new(api_version: &str, kind: &str, namespace: &str, name: &str) -> Self {
        Self {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    fn of(doc: &Document) -> Self {
        Self::new(&doc.api_version, &doc.kind, doc.namespace(), doc.name())
    }
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<Key, Document>,
    operations: Vec<StoreOp>,
    /// (kind, name) pairs whose operations fail
    failures: Vec<(String, String)>,
    next_version: u64,
}

impl State {
    fn bump_version(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }

    fn check_failure(&self, kind: &str, name: &str) -> Result<()> {
        if self
            .failures
            .iter()
            .any(|(k, n)| k == kind && (n.is_empty() || n == name))
        {
            return Err(StoreError::InternalError(format!(
                "Injected failure for {kind} {name}"
            )));
        }
        Ok(())
    }
}

/// In-memory [`ResourceStore`]
///
/// Cloning shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    /// Creates a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a document as-is (apart from assigned identity), replacing any
    /// existing object with the same identity
    ///
    /// Not recorded as an operation.
    pub fn insert(&self, mut document: Document) -> Document {
        let mut state = self.state.lock().expect("lock");
        if document.metadata.uid.is_none() {
            document.metadata.uid = Some(Uuid::new_v4().to_string());
        }
        document.metadata.resource_version = Some(state.bump_version());
        state.objects.insert(Key::of(&document), document.clone());
        document
    }

    /// Returns the first stored object of `kind` named `name`, in any namespace
    /// or API version
    pub fn find(&self, kind: &str, name: &str) -> Option<Document> {
        let state = self.state.lock().expect("lock");
        state
            .objects
            .values()
            .find(|doc| doc.kind == kind && doc.name() == name)
            .cloned()
    }

    /// Returns all stored objects of `kind`, ordered by identity
    pub fn all(&self, kind: &str) -> Vec<Document> {
        let state = self.state.lock().expect("lock");
        state
            .objects
            .values()
            .filter(|doc| doc.kind == kind)
            .cloned()
            .collect()
    }

    /// Overwrites the status of the object of `kind` named `name`, the way
    /// the controller owning that kind would
    ///
    /// Returns `false` if no such object exists.
    pub fn set_status(&self, kind: &str, name: &str, status: Value) -> bool {
        let mut state = self.state.lock().expect("lock");
        let version = state.bump_version();
        match state
            .objects
            .values_mut()
            .find(|doc| doc.kind == kind && doc.name() == name)
        {
            Some(doc) => {
                doc.status = status;
                doc.metadata.resource_version = Some(version);
                true
            }
            None => false,
        }
    }

    /// Removes an object outright, bypassing finalizers
    pub fn remove(&self, kind: &str, name: &str) -> Option<Document> {
        let mut state = self.state.lock().expect("lock");
        let key = state
            .objects
            .iter()
            .find(|(_, doc)| doc.kind == kind && doc.name() == name)
            .map(|(key, _)| key.clone())?;
        state.objects.remove(&key)
    }

    /// Returns all recorded operations
    pub fn operations(&self) -> Vec<StoreOp> {
        self.state.lock().expect("lock").operations.clone()
    }

    /// Clears recorded operations
    pub fn clear_operations(&self) {
        self.state.lock().expect("lock").operations.clear();
    }

    /// Makes every operation on `kind`/`name` fail; an empty name matches all
    /// objects of the kind
    pub fn inject_failure(&self, kind: impl Into<String>, name: impl Into<String>) {
        self.state
            .lock()
            .expect("lock")
            .failures
            .push((kind.into(), name.into()));
    }

    /// Clears all injected failures
    pub fn clear_failures(&self) {
        self.state.lock().expect("lock").failures.clear();
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get(
        &self,
        api_version: &str,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Document> {
        let mut state = self.state.lock().expect("lock");
        state.operations.push(StoreOp::Get {
            kind: kind.to_string(),
            name: name.to_string(),
        });
        state.check_failure(kind, name)?;

        state
            .objects
            .get(&Key::new(api_version, kind, namespace, name))
            .cloned()
            .ok_or_else(|| StoreError::not_found(kind, name))
    }

    async fn create(&self, mut document: Document) -> Result<Document> {
        let mut state = self.state.lock().expect("lock");
        state.operations.push(StoreOp::Create {
            kind: document.kind.clone(),
            name: document.name().to_string(),
        });
        state.check_failure(&document.kind, document.name())?;

        let key = Key::of(&document);
        if state.objects.contains_key(&key) {
            return Err(StoreError::already_exists(&document.kind, document.name()));
        }

        document.metadata.uid = Some(Uuid::new_v4().to_string());
        document.metadata.resource_version = Some(state.bump_version());
        document.metadata.deletion_timestamp = None;
        state.objects.insert(key, document.clone());

        Ok(document)
    }

    async fn update(&self, mut document: Document) -> Result<Document> {
        let mut state = self.state.lock().expect("lock");
        state.operations.push(StoreOp::Update {
            kind: document.kind.clone(),
            name: document.name().to_string(),
        });
        state.check_failure(&document.kind, document.name())?;

        let key = Key::of(&document);
        let Some(stored) = state.objects.get(&key) else {
            return Err(StoreError::not_found(&document.kind, document.name()));
        };

        if let Some(version) = &document.metadata.resource_version {
            if stored.metadata.resource_version.as_ref() != Some(version) {
                return Err(StoreError::Conflict {
                    kind: document.kind.clone(),
                    name: document.name().to_string(),
                    message: format!(
                        "resourceVersion {} is stale (current {})",
                        version,
                        stored.metadata.resource_version.as_deref().unwrap_or("none")
                    ),
                });
            }
        }

        // Identity and deletion state are owned by the store
        document.metadata.uid = stored.metadata.uid.clone();
        document.metadata.deletion_timestamp = stored.metadata.deletion_timestamp;
        document.metadata.resource_version = Some(state.bump_version());

        if document.metadata.is_deleting() && document.metadata.finalizers.is_empty() {
            state.objects.remove(&key);
        } else {
            state.objects.insert(key, document.clone());
        }

        Ok(document)
    }

    async fn delete(
        &self,
        api_version: &str,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<()> {
        let mut state = self.state.lock().expect("lock");
        state.operations.push(StoreOp::Delete {
            kind: kind.to_string(),
            name: name.to_string(),
        });
        state.check_failure(kind, name)?;

        let key = Key::new(api_version, kind, namespace, name);
        let (has_finalizers, marked) = match state.objects.get(&key) {
            Some(stored) => (
                !stored.metadata.finalizers.is_empty(),
                stored.metadata.is_deleting(),
            ),
            None => return Err(StoreError::not_found(kind, name)),
        };

        if !has_finalizers {
            state.objects.remove(&key);
        } else if !marked {
            let version = state.bump_version();
            if let Some(stored) = state.objects.get_mut(&key) {
                stored.metadata.deletion_timestamp = Some(Utc::now());
                stored.metadata.resource_version = Some(version);
            }
        }

        Ok(())
    }

    async fn list(&self, api_version: &str, kind: &str, namespace: &str) -> Result<Vec<Document>> {
        let mut state = self.state.lock().expect("lock");
        state.operations.push(StoreOp::List {
            kind: kind.to_string(),
        });
        state.check_failure(kind, "")?;

        Ok(state
            .objects
            .values()
            .filter(|doc| {
                doc.api_version == api_version && doc.kind == kind && doc.namespace() == namespace
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const API: &str = "service.conduit.dev/v1";

    fn credential(name: &str) -> Document {
        Document::new(API, "Credential", "ci", name)
    }

    #[tokio::test]
    async fn test_create_assigns_identity_and_rejects_duplicates() {
        let store = MemoryStore::new();

        let created = store.create(credential("a")).await.unwrap();
        assert!(created.metadata.uid.is_some());
        assert!(created.metadata.resource_version.is_some());

        let err = store.create(credential("a")).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store.get(API, "Credential", "ci", "a").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() {
        let store = MemoryStore::new();
        let created = store.create(credential("a")).await.unwrap();

        let mut first = created.clone();
        first.spec = json!({ "n": 1 });
        store.update(first).await.unwrap();

        let mut stale = created;
        stale.spec = json!({ "n": 2 });
        let err = store.update(stale).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_delete_respects_finalizers() {
        let store = MemoryStore::new();
        let mut doc = credential("a");
        doc.metadata.finalizers.push("keep".to_string());
        store.create(doc).await.unwrap();

        store.delete(API, "Credential", "ci", "a").await.unwrap();
        let marked = store.get(API, "Credential", "ci", "a").await.unwrap();
        assert!(marked.metadata.is_deleting());

        let mut cleared = marked;
        cleared.metadata.finalizers.clear();
        store.update(cleared).await.unwrap();

        assert!(store.find("Credential", "a").is_none());
    }

    #[tokio::test]
    async fn test_injected_failure_and_operation_log() {
        let store = MemoryStore::new();
        store.insert(credential("a"));
        store.inject_failure("Credential", "a");

        let err = store.get(API, "Credential", "ci", "a").await.unwrap_err();
        assert!(matches!(err, StoreError::InternalError(_)));

        store.clear_failures();
        store.get(API, "Credential", "ci", "a").await.unwrap();

        assert_eq!(store.operations().len(), 2);
        assert_eq!(store.operations()[0].kind(), "Credential");
    }

    #[tokio::test]
    async fn test_list_filters_by_namespace_and_kind() {
        let store = MemoryStore::new();
        store.insert(credential("a"));
        store.insert(credential("b"));
        store.insert(Document::new(API, "Credential", "other", "c"));
        store.insert(Document::new(API, "Token", "ci", "d"));

        let listed = store.list(API, "Credential", "ci").await.unwrap();
        let names: Vec<_> = listed.iter().map(|d| d.name().to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
