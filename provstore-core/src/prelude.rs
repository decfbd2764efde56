//! Convenience re-exports for downstream crates
//!
//! ```rust
//! use provstore_core::prelude::*;
//! ```

pub use crate::error::{ErrorCategory, Result, StoreError, ToolResponse};
pub use crate::hash::{
    compute_composite_hash, compute_file_hash, compute_hash, is_valid_hash, vector_content_hash,
};
pub use crate::traits::{DocumentChunker, EmbeddingRunner, OcrProvider};
pub use crate::types::{
    new_id, normalize_entity_text, now_timestamp, Chunk, Cluster, Comparison, Document,
    DocumentClusterAssignment,
    DocumentStatus, Embedding, EmbeddingStatus, Entity, EntityExtractionSegment, EntityMention,
    EntityType, Extraction, FormFill, Image, KnowledgeEdge, KnowledgeNode, ListOptions,
    NewDocument, NodeEntityLink, OcrMode, OcrResult, Provenance, ProvenanceSpec, ProvenanceType,
    RelationshipType, ResolutionMethod, SourceType, UploadedFile, VlmStatus, EMBEDDING_DIM,
    ORPHANED_ROOT_ID,
};
