//! Conduit Store Client
//!
//! The controller's only way to read and write resources. [`ResourceStore`] is
//! the contract; two implementations are provided:
//! - [`HttpResourceStore`]: talks to a platform-style REST API
//! - [`MemoryStore`]: in-process store with operation recording, used by tests
//!
//! "Not found" and "already exists" are distinguished errors so callers can treat
//! them as expected outcomes.
//!
//! # Example
//!
//! ```no_run
//! use conduit_client::{HttpResourceStore, ResourceStore};
//!
//! #[tokio::main]
//! async fn main() -> conduit_client::Result<()> {
//!     let store = HttpResourceStore::new("http://localhost:8001");
//!
//!     let pipeline = store
//!         .get("core.conduit.dev/v1alpha1", "Pipeline", "ci", "build")
//!         .await?;
//!
//!     println!("Pipeline version: {:?}", pipeline.metadata.resource_version);
//!     Ok(())
//! }
//! ```

pub mod error;
mod http;
pub mod memory;

pub use error::{Result, StoreError};
pub use http::HttpResourceStore;
pub use memory::{MemoryStore, StoreOp};

use async_trait::async_trait;
use conduit_core::Document;

/// Contract of the resource store
///
/// All calls address one object (or one collection) by API version, kind,
/// namespace and name.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Reads an object
    ///
    /// Fails with [`StoreError::NotFound`] if it does not exist.
    async fn get(&self, api_version: &str, kind: &str, namespace: &str, name: &str)
    -> Result<Document>;

    /// Creates an object, returning it as stored
    ///
    /// Fails with [`StoreError::AlreadyExists`] if an object with the same identity exists.
    async fn create(&self, document: Document) -> Result<Document>;

    /// Replaces an object, returning it as stored
    ///
    /// Fails with [`StoreError::Conflict`] if the document's `resourceVersion`
    /// is stale.
    async fn update(&self, document: Document) -> Result<Document>;

    /// Requests deletion of an object
    ///
    /// Fails with [`StoreError::NotFound`] if it does not exist. Objects with
    /// finalizers are only marked for deletion.
    async fn delete(&self, api_version: &str, kind: &str, namespace: &str, name: &str)
    -> Result<()>;

    /// Lists all objects of a kind in a namespace
    async fn list(&self, api_version: &str, kind: &str, namespace: &str) -> Result<Vec<Document>>;
}
