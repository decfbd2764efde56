//! Error types for provstore operations
//!
//! One error enum covers every surface; each variant maps to a stable
//! category string so callers (and the tool envelope) can match on
//! categories without parsing messages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur anywhere in the store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Named database does not exist under the storage root
    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    /// Named database already exists under the storage root
    #[error("Database already exists: {0}")]
    DatabaseAlreadyExists(String),

    /// The underlying database file is locked by another handle
    #[error("Database is locked: {0}")]
    DatabaseLocked(String),

    /// Stored schema does not match what the engine expects
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Filesystem permission failure
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Document lookup that must succeed did not
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Chunk lookup that must succeed did not
    #[error("Chunk not found: {0}")]
    ChunkNotFound(String),

    /// Entity lookup that must succeed did not
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// Knowledge node lookup that must succeed did not
    #[error("Knowledge node not found: {0}")]
    NodeNotFound(String),

    /// Generic not-found for other record types
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Foreign key constraint rejected a write
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// CHECK constraint rejected a write
    #[error("Check constraint violation: {0}")]
    CheckConstraintViolation(String),

    /// UNIQUE constraint rejected a write
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Graph build requested but the store holds no entities
    #[error("No entities found; extract entities before building the graph")]
    NoEntitiesFound,

    /// Graph build requested without rebuild while a graph already exists
    #[error("Knowledge graph already exists; pass rebuild to replace it")]
    GraphAlreadyExists,

    /// Fuzzy resolution input exceeds the pairwise-comparison cap
    #[error("Too many entities for fuzzy resolution: {count} of type {entity_type} (cap {cap})")]
    TooManyEntities {
        entity_type: String,
        count: usize,
        cap: usize,
    },

    /// Path query source endpoint could not be resolved
    #[error("Source entity not found: {0}")]
    SourceEntityNotFound(String),

    /// Path query target endpoint could not be resolved
    #[error("Target entity not found: {0}")]
    TargetEntityNotFound(String),

    /// A migration step failed
    #[error("Migration failed during {operation}{}: {cause}", table_context(.table_name))]
    MigrationFailed {
        operation: String,
        table_name: Option<String>,
        cause: String,
    },

    /// Stored schema version exceeds what this build implements
    #[error("Database schema version {found} is newer than supported version {supported}")]
    VersionTooNew { found: i64, supported: i64 },

    /// Validation failure at an input boundary
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Remote file-manager reported an API-level failure
    #[error("File manager API error: {0}")]
    FileManagerApi(String),

    /// Remote file-manager reported a server-side failure
    #[error("File manager server error: {0}")]
    FileManagerServer(String),

    /// Remote file-manager reported a per-file failure
    #[error("File manager file error: {0}")]
    FileManagerFile(String),

    /// An external error category the taxonomy does not recognize
    #[error("Unknown error category '{category}': {message}")]
    UnknownCategory { category: String, message: String },

    /// Underlying storage failure not covered by a constraint variant
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn table_context(table: &Option<String>) -> String {
    table
        .as_ref()
        .map(|t| format!(" on table {t}"))
        .unwrap_or_default()
}

/// Stable error categories shared by every user-facing surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    DatabaseNotFound,
    DatabaseAlreadyExists,
    DatabaseLocked,
    SchemaMismatch,
    PermissionDenied,
    DocumentNotFound,
    ChunkNotFound,
    EntityNotFound,
    NodeNotFound,
    ForeignKeyViolation,
    CheckConstraintViolation,
    UniqueViolation,
    NoEntitiesFound,
    GraphAlreadyExists,
    TooManyEntities,
    SourceEntityNotFound,
    TargetEntityNotFound,
    MigrationFailed,
    VersionTooNew,
    FileManagerApiError,
    FileManagerServerError,
    FileManagerFileError,
    UnknownErrorCategory,
}

impl ErrorCategory {
    /// Wire spelling of the category
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DatabaseNotFound => "DATABASE_NOT_FOUND",
            Self::DatabaseAlreadyExists => "DATABASE_ALREADY_EXISTS",
            Self::DatabaseLocked => "DATABASE_LOCKED",
            Self::SchemaMismatch => "SCHEMA_MISMATCH",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::DocumentNotFound => "DOCUMENT_NOT_FOUND",
            Self::ChunkNotFound => "CHUNK_NOT_FOUND",
            Self::EntityNotFound => "ENTITY_NOT_FOUND",
            Self::NodeNotFound => "NODE_NOT_FOUND",
            Self::ForeignKeyViolation => "FOREIGN_KEY_VIOLATION",
            Self::CheckConstraintViolation => "CHECK_CONSTRAINT_VIOLATION",
            Self::UniqueViolation => "UNIQUE_VIOLATION",
            Self::NoEntitiesFound => "NO_ENTITIES_FOUND",
            Self::GraphAlreadyExists => "GRAPH_ALREADY_EXISTS",
            Self::TooManyEntities => "TOO_MANY_ENTITIES",
            Self::SourceEntityNotFound => "SOURCE_ENTITY_NOT_FOUND",
            Self::TargetEntityNotFound => "TARGET_ENTITY_NOT_FOUND",
            Self::MigrationFailed => "MIGRATION_FAILED",
            Self::VersionTooNew => "VERSION_TOO_NEW",
            Self::FileManagerApiError => "FILE_MANAGER_API_ERROR",
            Self::FileManagerServerError => "FILE_MANAGER_SERVER_ERROR",
            Self::FileManagerFileError => "FILE_MANAGER_FILE_ERROR",
            Self::UnknownErrorCategory => "UNKNOWN_ERROR_CATEGORY",
        }
    }
}

impl StoreError {
    /// Stable category for this error
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::DatabaseNotFound(_) => ErrorCategory::DatabaseNotFound,
            Self::DatabaseAlreadyExists(_) => ErrorCategory::DatabaseAlreadyExists,
            Self::DatabaseLocked(_) => ErrorCategory::DatabaseLocked,
            Self::SchemaMismatch(_) => ErrorCategory::SchemaMismatch,
            Self::PermissionDenied(_) => ErrorCategory::PermissionDenied,
            Self::DocumentNotFound(_) => ErrorCategory::DocumentNotFound,
            Self::ChunkNotFound(_) => ErrorCategory::ChunkNotFound,
            Self::EntityNotFound(_) => ErrorCategory::EntityNotFound,
            Self::NodeNotFound(_) => ErrorCategory::NodeNotFound,
            Self::NotFound { entity, .. } => match *entity {
                "document" => ErrorCategory::DocumentNotFound,
                "chunk" => ErrorCategory::ChunkNotFound,
                "entity" => ErrorCategory::EntityNotFound,
                "knowledge_node" => ErrorCategory::NodeNotFound,
                _ => ErrorCategory::SchemaMismatch,
            },
            Self::ForeignKeyViolation(_) => ErrorCategory::ForeignKeyViolation,
            Self::CheckConstraintViolation(_) => ErrorCategory::CheckConstraintViolation,
            Self::UniqueViolation(_) => ErrorCategory::UniqueViolation,
            Self::NoEntitiesFound => ErrorCategory::NoEntitiesFound,
            Self::GraphAlreadyExists => ErrorCategory::GraphAlreadyExists,
            Self::TooManyEntities { .. } => ErrorCategory::TooManyEntities,
            Self::SourceEntityNotFound(_) => ErrorCategory::SourceEntityNotFound,
            Self::TargetEntityNotFound(_) => ErrorCategory::TargetEntityNotFound,
            Self::MigrationFailed { .. } => ErrorCategory::MigrationFailed,
            Self::VersionTooNew { .. } => ErrorCategory::VersionTooNew,
            Self::Validation(_) => ErrorCategory::CheckConstraintViolation,
            Self::FileManagerApi(_) => ErrorCategory::FileManagerApiError,
            Self::FileManagerServer(_) => ErrorCategory::FileManagerServerError,
            Self::FileManagerFile(_) => ErrorCategory::FileManagerFileError,
            Self::UnknownCategory { .. } => ErrorCategory::UnknownErrorCategory,
            Self::Storage(_) | Self::Serialization(_) | Self::Io(_) => {
                ErrorCategory::UnknownErrorCategory
            }
        }
    }

    /// Map an external collaborator's category string into the taxonomy.
    ///
    /// Recognized categories convert to their matching variant; anything
    /// else surfaces as [`StoreError::UnknownCategory`] carrying the
    /// offending string.
    #[must_use]
    pub fn from_external(category: &str, message: String) -> Self {
        match category {
            "FILE_MANAGER_API_ERROR" => Self::FileManagerApi(message),
            "FILE_MANAGER_SERVER_ERROR" => Self::FileManagerServer(message),
            "FILE_MANAGER_FILE_ERROR" => Self::FileManagerFile(message),
            other => Self::UnknownCategory {
                category: other.to_string(),
                message,
            },
        }
    }
}

/// Response envelope for user-facing tools
///
/// Success: `{"success": true, "data": {...}}`.
/// Failure: `{"success": false, "error": {"category", "message", "details"?}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
}

/// Error payload inside a failed [`ToolResponse`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ToolResponse {
    /// Successful envelope wrapping `data`
    #[must_use]
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failed envelope derived from a store error
    #[must_use]
    pub fn err(error: &StoreError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ToolError {
                category: error.category(),
                message: error.to_string(),
                details: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_strings_are_stable() {
        assert_eq!(
            ErrorCategory::ForeignKeyViolation.as_str(),
            "FOREIGN_KEY_VIOLATION"
        );
        assert_eq!(
            ErrorCategory::TooManyEntities.as_str(),
            "TOO_MANY_ENTITIES"
        );
        assert_eq!(
            ErrorCategory::UnknownErrorCategory.as_str(),
            "UNKNOWN_ERROR_CATEGORY"
        );
    }

    #[test]
    fn unknown_external_category_is_preserved_in_message() {
        let err = StoreError::from_external("OCR_TIMEOUT", "took too long".into());
        assert_eq!(err.category(), ErrorCategory::UnknownErrorCategory);
        assert!(err.to_string().contains("OCR_TIMEOUT"));
    }

    #[test]
    fn envelope_round_trips() {
        let err = StoreError::DocumentNotFound("doc-1".into());
        let resp = ToolResponse::err(&err);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["category"], "DOCUMENT_NOT_FOUND");

        let ok = ToolResponse::ok(serde_json::json!({"documents": []}));
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["success"], true);
        assert!(json["data"]["documents"].is_array());
    }
}
