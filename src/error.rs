// Error types shared across the document model, editors and storage

use std::path::PathBuf;

use thiserror::Error;

use crate::richtext::entity::EntityKey;

/// Result type for document and editor operations.
pub type DraftResult<T> = Result<T, DraftError>;

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("entity not found: {0}")]
    EntityNotFound(EntityKey),

    /// A block points at an entity the store does not hold
    #[error("block {block} references missing entity {entity}")]
    DanglingEntity { block: String, entity: EntityKey },

    #[error("entity {0} is not mutable")]
    ImmutableEntity(EntityKey),

    #[error("entity {key} has type {expected}, refusing to store {found} data")]
    EntityTypeMismatch {
        key: EntityKey,
        expected: String,
        found: String,
    },

    #[error("entity {0} data is not a JSON object")]
    NotAnObject(EntityKey),

    #[error("invalid color value: {0:?}")]
    InvalidColor(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("media search failed: {0}")]
    Search(String),
}

impl DraftError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DraftError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure reported by a media search backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("validation error: {0}")]
    Validation(String),
}
