//! Error types for odb-blob operations.

use thiserror::Error;

use crate::Oid;

/// Result type for odb-blob operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while accessing blobs and their attributes.
#[derive(Error, Debug)]
pub enum Error {
    /// Object ID parsing error
    #[error("invalid object id: {0}")]
    InvalidOid(String),

    /// Attribute registry misuse (duplicate or post-evaluation registration)
    #[error("attribute registry misuse: {0}")]
    Configuration(String),

    /// Requested attribute was never registered
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),

    /// A typed handle disagrees with the stored value's shape
    #[error("attribute {attribute} holds a value of an unexpected type")]
    TypeMismatch { attribute: String },

    /// A loader failed during attribute group evaluation
    #[error("failed to load attribute {attribute}: {source}")]
    Load {
        attribute: &'static str,
        #[source]
        source: Box<Error>,
    },

    /// Object not present in the backing store
    #[error("object not found: {0}")]
    NotFound(Oid),

    /// Filter pipeline failure during filtered streaming
    #[error("filter failed for {path}: {message}")]
    Filter { path: String, message: String },

    /// Backing store failure the crate does not interpret
    #[error("object store error: {0}")]
    Store(String),

    /// Attribute or content access on a detached blob
    #[error("operation on a detached blob")]
    Detached,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap a loader failure with the attribute it belongs to.
    pub(crate) fn load(attribute: &'static str, cause: Error) -> Self {
        Error::Load {
            attribute,
            source: Box::new(cause),
        }
    }
}
