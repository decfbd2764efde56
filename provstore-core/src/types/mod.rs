//! Domain types for the document-analysis store
//!
//! Identifiers are opaque UUID strings; timestamps are lexicographically
//! sortable RFC 3339 UTC strings; content hashes use the canonical
//! `sha256:<hex>` form from [`crate::hash`].

mod document;
mod entity;
mod graph;
mod provenance;

pub use document::{
    Chunk, Document, DocumentStatus, Embedding, EmbeddingStatus, Extraction, Image, NewDocument,
    OcrMode, OcrResult, UploadedFile, VlmStatus,
};
pub use entity::{
    normalize_entity_text, Entity, EntityExtractionSegment, EntityMention, EntityType,
};
pub use graph::{
    Cluster, Comparison, DocumentClusterAssignment, FormFill, KnowledgeEdge, KnowledgeNode,
    NodeEntityLink, RelationshipType, ResolutionMethod,
};
pub use provenance::{Provenance, ProvenanceSpec, ProvenanceType, SourceType, ORPHANED_ROOT_ID};

use chrono::{SecondsFormat, Utc};

/// Compile-time embedding dimension for the vector virtual table
pub const EMBEDDING_DIM: usize = 768;

/// Bounded default applied when a listing passes `offset` without `limit`
pub const DEFAULT_LIST_LIMIT: u32 = 10_000;

/// Current UTC time as a sortable RFC 3339 string, e.g.
/// `2026-03-01T12:00:00.123Z`
#[must_use]
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Fresh v4 UUID string for a new row
#[must_use]
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Pagination and status filtering for list operations
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Status filter (exact match on the row's status column)
    pub status: Option<String>,

    /// Maximum rows to return
    pub limit: Option<u32>,

    /// Rows to skip; without `limit` the bounded default applies
    pub offset: Option<u32>,
}

impl ListOptions {
    /// Effective LIMIT/OFFSET pair
    ///
    /// `offset` without `limit` falls back to [`DEFAULT_LIST_LIMIT`] rather
    /// than an unbounded scan.
    #[must_use]
    pub fn bounds(&self) -> (u32, u32) {
        let limit = self.limit.unwrap_or(DEFAULT_LIST_LIMIT);
        (limit, self.offset.unwrap_or(0))
    }
}
