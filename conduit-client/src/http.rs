//! HTTP resource store
//!
//! Speaks the platform REST convention:
//! `/apis/<group>/<version>/namespaces/<namespace>/<plural>[/<name>]`, or
//! `/api/<version>/...` for the core group.

use async_trait::async_trait;
use conduit_core::Document;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::ResourceStore;
use crate::error::{Result, StoreError};

/// HTTP client for a platform-style resource API
#[derive(Debug, Clone)]
pub struct HttpResourceStore {
    /// Base URL of the API server (e.g., "http://localhost:8001")
    base_url: String,
    /// Bearer token sent with every request, if any
    token: Option<String>,
    /// HTTP client instance
    client: Client,
}

/// Which call produced a response, for mapping 404/409
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb {
    Read,
    Create,
    Update,
    Delete,
}

#[derive(Debug, Deserialize)]
struct DocumentList {
    #[serde(default)]
    items: Vec<Document>,
}

impl HttpResourceStore {
    /// Create a new store client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the API server
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new store client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            client,
        }
    }

    /// Sends `token` as a bearer token with every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Get the base URL of the API server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // URL Construction
    // =============================================================================

    fn collection_url(&self, api_version: &str, kind: &str, namespace: &str) -> String {
        let prefix = if api_version.contains('/') {
            "apis"
        } else {
            "api"
        };

        format!(
            "{}/{}/{}/namespaces/{}/{}",
            self.base_url,
            prefix,
            api_version,
            namespace,
            plural(kind)
        )
    }

    fn object_url(&self, api_version: &str, kind: &str, namespace: &str, name: &str) -> String {
        format!(
            "{}/{}",
            self.collection_url(api_version, kind, namespace),
            name
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Maps a non-success status to the matching [`StoreError`]
    async fn check(response: Response, verb: Verb, kind: &str, name: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        Err(match (status, verb) {
            (StatusCode::NOT_FOUND, _) => StoreError::not_found(kind, name),
            (StatusCode::CONFLICT, Verb::Create) => StoreError::already_exists(kind, name),
            (StatusCode::CONFLICT, Verb::Update) => StoreError::Conflict {
                kind: kind.to_string(),
                name: name.to_string(),
                message,
            },
            _ => StoreError::api_error(status.as_u16(), message),
        })
    }

    async fn parse_document(response: Response) -> Result<Document> {
        response
            .json()
            .await
            .map_err(|e| StoreError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}

#[async_trait]
impl ResourceStore for HttpResourceStore {
    async fn get(
        &self,
        api_version: &str,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Document> {
        let url = self.object_url(api_version, kind, namespace, name);
        debug!("GET {}", url);

        let response = self.request(Method::GET, &url).send().await?;
        let response = Self::check(response, Verb::Read, kind, name).await?;

        Self::parse_document(response).await
    }

    async fn create(&self, document: Document) -> Result<Document> {
        let url = self.collection_url(&document.api_version, &document.kind, document.namespace());
        debug!("POST {} ({})", url, document.name());

        let response = self
            .request(Method::POST, &url)
            .json(&document)
            .send()
            .await?;
        let response = Self::check(response, Verb::Create, &document.kind, document.name()).await?;

        Self::parse_document(response).await
    }

    async fn update(&self, document: Document) -> Result<Document> {
        let url = self.object_url(
            &document.api_version,
            &document.kind,
            document.namespace(),
            document.name(),
        );
        debug!("PUT {}", url);

        let response = self
            .request(Method::PUT, &url)
            .json(&document)
            .send()
            .await?;
        let response = Self::check(response, Verb::Update, &document.kind, document.name()).await?;

        Self::parse_document(response).await
    }

    async fn delete(
        &self,
        api_version: &str,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<()> {
        let url = self.object_url(api_version, kind, namespace, name);
        debug!("DELETE {}", url);

        let response = self.request(Method::DELETE, &url).send().await?;
        Self::check(response, Verb::Delete, kind, name).await?;

        Ok(())
    }

    async fn list(&self, api_version: &str, kind: &str, namespace: &str) -> Result<Vec<Document>> {
        let url = self.collection_url(api_version, kind, namespace);
        debug!("GET {}", url);

        let response = self.request(Method::GET, &url).send().await?;
        let response = Self::check(response, Verb::Read, kind, "").await?;

        let list: DocumentList = response
            .json()
            .await
            .map_err(|e| StoreError::ParseError(format!("Failed to parse list response: {}", e)))?;

        Ok(list
            .items
            .into_iter()
            .map(|mut doc| {
                if doc.api_version.is_empty() {
                    doc.api_version = api_version.to_string();
                }
                if doc.kind.is_empty() {
                    doc.kind = kind.to_string();
                }
                doc
            })
            .collect())
    }
}

/// Resource path segment for a kind: lower-cased, pluralized with `s`
fn plural(kind: &str) -> String {
    format!("{}s", kind.to_lowercase())
}
