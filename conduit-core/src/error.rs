//! Error types for document encoding and decoding

use thiserror::Error;

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A document field could not be (de)serialized
    #[error("Invalid {kind} document: {source}")]
    Codec {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    /// A document of one kind was decoded as another
    #[error("Expected a {expected} document, found {found}")]
    KindMismatch {
        expected: &'static str,
        found: String,
    },
}
