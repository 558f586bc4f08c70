//! Resource documents
//!
//! Every object in the store is a [`Document`]: `apiVersion`, `kind`, `metadata`
//! and free-form `spec`/`status` sub-documents. Typed resources are [`Object`]s
//! whose spec implements [`ResourceSpec`]; converting between the two is the only
//! place nested JSON is encoded or decoded.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::error::{Error, Result};

/// Generic resource document as persisted by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// May be omitted by list responses; filled in from the request by stores
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub spec: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub status: Value,
}

impl Document {
    /// Creates an empty document of the given type and identity
    pub fn new(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            metadata: ObjectMeta::new(namespace, name),
            spec: Value::Null,
            status: Value::Null,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }
}

/// Object metadata shared by every document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    /// Store-assigned identity, stable for the lifetime of the object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// Store-assigned concurrency token, changes on every write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,
    /// Set by the store once deletion has been requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    /// Adds a finalizer unless it is already present
    ///
    /// Returns `true` if the finalizer list changed.
    pub fn add_finalizer(&mut self, finalizer: &str) -> bool {
        if self.has_finalizer(finalizer) {
            return false;
        }
        self.finalizers.push(finalizer.to_string());
        true
    }

    /// Removes a finalizer, returning `true` if it was present
    pub fn remove_finalizer(&mut self, finalizer: &str) -> bool {
        let before = self.finalizers.len();
        self.finalizers.retain(|f| f != finalizer);
        self.finalizers.len() != before
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers.iter().any(|f| f == finalizer)
    }

    pub fn is_deleting(&self) -> bool {
        self.deletion_timestamp.is_some()
    }
}

/// Back-link from a child to the object that owns it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_owner_deletion: Option<bool>,
}

/// Spec type of a typed resource
///
/// Ties a spec to its kind and status type so that [`Object`] can encode and
/// decode documents of that kind.
pub trait ResourceSpec: Serialize + DeserializeOwned + Default + Debug + Clone + PartialEq {
    type Status: Serialize + DeserializeOwned + Default + Debug + Clone + PartialEq;

    const KIND: &'static str;
    const API_VERSION: &'static str = crate::api::API_VERSION;
}

/// Typed resource: metadata plus a typed spec and status
#[derive(Debug, Clone, PartialEq)]
pub struct Object<S: ResourceSpec> {
    pub metadata: ObjectMeta,
    pub spec: S,
    pub status: S::Status,
}

impl<S: ResourceSpec> Object<S> {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, spec: S) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec,
            status: S::Status::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    /// Encodes this object as a store document
    pub fn to_document(&self) -> Result<Document> {
        Ok(Document {
            api_version: S::API_VERSION.to_string(),
            kind: S::KIND.to_string(),
            metadata: self.metadata.clone(),
            spec: encode::<S, _>(&self.spec)?,
            status: encode::<S, _>(&self.status)?,
        })
    }

    /// Decodes a store document, rejecting documents of another kind
    ///
    /// A missing spec or status decodes to its default.
    pub fn from_document(doc: Document) -> Result<Self> {
        if doc.kind != S::KIND {
            return Err(Error::KindMismatch {
                expected: S::KIND,
                found: doc.kind,
            });
        }

        Ok(Self {
            metadata: doc.metadata,
            spec: decode::<S, S>(doc.spec)?,
            status: decode::<S, S::Status>(doc.status)?,
        })
    }

    /// Encodes only the status sub-document
    pub fn status_value(&self) -> Result<Value> {
        encode::<S, _>(&self.status)
    }
}

fn encode<S: ResourceSpec, T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|source| Error::Codec {
        kind: S::KIND.to_string(),
        source,
    })
}

fn decode<S: ResourceSpec, T: DeserializeOwned + Default>(value: Value) -> Result<T> {
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value).map_err(|source| Error::Codec {
        kind: S::KIND.to_string(),
        source,
    })
}
