//! Provenance records: the backbone linking every artifact to its origin

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

/// Root-document id carried by the synthetic graveyard provenance row.
///
/// When a document is deleted but downstream artifacts survive (shared
/// cluster or knowledge-graph rows), their provenance chains are re-parented
/// under a single DOCUMENT-typed row whose `root_document_id` is this value.
pub const ORPHANED_ROOT_ID: &str = "ORPHANED_ROOT";

/// Kind of artifact a provenance row describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvenanceType {
    Document,
    OcrResult,
    Chunk,
    Image,
    VlmDescription,
    Embedding,
    Extraction,
    FormFill,
    EntityExtraction,
    Comparison,
    Clustering,
    KnowledgeGraph,
}

impl ProvenanceType {
    /// Wire/database spelling
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "DOCUMENT",
            Self::OcrResult => "OCR_RESULT",
            Self::Chunk => "CHUNK",
            Self::Image => "IMAGE",
            Self::VlmDescription => "VLM_DESCRIPTION",
            Self::Embedding => "EMBEDDING",
            Self::Extraction => "EXTRACTION",
            Self::FormFill => "FORM_FILL",
            Self::EntityExtraction => "ENTITY_EXTRACTION",
            Self::Comparison => "COMPARISON",
            Self::Clustering => "CLUSTERING",
            Self::KnowledgeGraph => "KNOWLEDGE_GRAPH",
        }
    }

    /// All variants in declaration order
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[
            Self::Document,
            Self::OcrResult,
            Self::Chunk,
            Self::Image,
            Self::VlmDescription,
            Self::Embedding,
            Self::Extraction,
            Self::FormFill,
            Self::EntityExtraction,
            Self::Comparison,
            Self::Clustering,
            Self::KnowledgeGraph,
        ]
    }
}

impl fmt::Display for ProvenanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProvenanceType {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "DOCUMENT" => Ok(Self::Document),
            "OCR_RESULT" => Ok(Self::OcrResult),
            "CHUNK" => Ok(Self::Chunk),
            "IMAGE" => Ok(Self::Image),
            "VLM_DESCRIPTION" => Ok(Self::VlmDescription),
            "EMBEDDING" => Ok(Self::Embedding),
            "EXTRACTION" => Ok(Self::Extraction),
            "FORM_FILL" => Ok(Self::FormFill),
            "ENTITY_EXTRACTION" => Ok(Self::EntityExtraction),
            "COMPARISON" => Ok(Self::Comparison),
            "CLUSTERING" => Ok(Self::Clustering),
            "KNOWLEDGE_GRAPH" => Ok(Self::KnowledgeGraph),
            other => Err(StoreError::Validation(format!(
                "unknown provenance type: {other}"
            ))),
        }
    }
}

/// What produced an artifact; parallel to [`ProvenanceType`] but named for
/// the producer rather than the product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    FileUpload,
    OcrProcessor,
    Chunker,
    ImageExtractor,
    VlmCaptioner,
    EmbeddingModel,
    SchemaExtractor,
    FormFiller,
    EntityExtractor,
    Comparator,
    Clusterer,
    GraphBuilder,
    EntityResolver,
    /// Rows the engine synthesizes itself (the orphaned-root graveyard)
    System,
}

impl SourceType {
    /// Wire/database spelling
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FileUpload => "file_upload",
            Self::OcrProcessor => "ocr_processor",
            Self::Chunker => "chunker",
            Self::ImageExtractor => "image_extractor",
            Self::VlmCaptioner => "vlm_captioner",
            Self::EmbeddingModel => "embedding_model",
            Self::SchemaExtractor => "schema_extractor",
            Self::FormFiller => "form_filler",
            Self::EntityExtractor => "entity_extractor",
            Self::Comparator => "comparator",
            Self::Clusterer => "clusterer",
            Self::GraphBuilder => "graph_builder",
            Self::EntityResolver => "entity_resolver",
            Self::System => "system",
        }
    }
}

impl FromStr for SourceType {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "file_upload" => Ok(Self::FileUpload),
            "ocr_processor" => Ok(Self::OcrProcessor),
            "chunker" => Ok(Self::Chunker),
            "image_extractor" => Ok(Self::ImageExtractor),
            "vlm_captioner" => Ok(Self::VlmCaptioner),
            "embedding_model" => Ok(Self::EmbeddingModel),
            "schema_extractor" => Ok(Self::SchemaExtractor),
            "form_filler" => Ok(Self::FormFiller),
            "entity_extractor" => Ok(Self::EntityExtractor),
            "comparator" => Ok(Self::Comparator),
            "clusterer" => Ok(Self::Clusterer),
            "graph_builder" => Ok(Self::GraphBuilder),
            "entity_resolver" => Ok(Self::EntityResolver),
            "system" => Ok(Self::System),
            other => Err(StoreError::Validation(format!(
                "unknown source type: {other}"
            ))),
        }
    }
}

/// A stored provenance row
///
/// `parent_ids` and `chain_path` are the JSON-decoded forms of the columns
/// of the same name; `chain_depth` always equals `parent_ids.len()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub id: String,

    #[serde(rename = "type")]
    pub provenance_type: ProvenanceType,

    pub source_type: SourceType,

    /// Provenance row of the producer, when distinct from the parent
    pub source_id: Option<String>,

    /// Immediate ancestor in the chain; `None` only for roots
    pub parent_id: Option<String>,

    /// Ordered ancestor ids, root first
    pub parent_ids: Vec<String>,

    /// Id of the DOCUMENT provenance at the chain root (or the orphaned
    /// root marker)
    pub root_document_id: String,

    /// Edges between this row and its root
    pub chain_depth: u32,

    /// Ordered artifact types along the chain, ending with this row's type
    pub chain_path: Vec<ProvenanceType>,

    pub content_hash: String,
    pub input_hash: Option<String>,
    pub file_hash: Option<String>,

    pub processor: String,
    pub processor_version: String,

    /// Processor parameters as JSON
    pub processing_params: serde_json::Value,

    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub duration_ms: Option<i64>,
    pub quality_score: Option<f64>,

    pub created_at: String,
}

impl Provenance {
    /// True when this row is a chain root
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.provenance_type == ProvenanceType::Document && self.chain_depth == 0
    }
}

/// Input for creating a provenance row
///
/// The provenance manager derives `parent_ids`, `chain_depth`, `chain_path`
/// and `root_document_id` from the parent chain; callers supply only what
/// they know.
#[derive(Debug, Clone)]
pub struct ProvenanceSpec {
    pub provenance_type: ProvenanceType,
    pub source_type: SourceType,
    pub parent_id: Option<String>,
    pub source_id: Option<String>,
    pub content_hash: String,
    pub input_hash: Option<String>,
    pub file_hash: Option<String>,
    pub processor: String,
    pub processor_version: String,
    pub processing_params: serde_json::Value,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub duration_ms: Option<i64>,
    pub quality_score: Option<f64>,
}

impl ProvenanceSpec {
    /// Minimal spec for the given type and producer
    #[must_use]
    pub fn new(
        provenance_type: ProvenanceType,
        source_type: SourceType,
        content_hash: String,
        processor: impl Into<String>,
    ) -> Self {
        Self {
            provenance_type,
            source_type,
            parent_id: None,
            source_id: None,
            content_hash,
            input_hash: None,
            file_hash: None,
            processor: processor.into(),
            processor_version: "1.0.0".to_string(),
            processing_params: serde_json::Value::Object(serde_json::Map::new()),
            started_at: None,
            completed_at: None,
            duration_ms: None,
            quality_score: None,
        }
    }

    /// Attach the immediate chain parent
    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Attach the producing provenance when it differs from the parent
    #[must_use]
    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    /// Attach the source-file hash (DOCUMENT rows)
    #[must_use]
    pub fn with_file_hash(mut self, file_hash: impl Into<String>) -> Self {
        self.file_hash = Some(file_hash.into());
        self
    }

    /// Attach the hash of the inputs consumed by the processor
    #[must_use]
    pub fn with_input_hash(mut self, input_hash: impl Into<String>) -> Self {
        self.input_hash = Some(input_hash.into());
        self
    }

    /// Attach processor parameters
    #[must_use]
    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.processing_params = params;
        self
    }

    /// Attach a processor version
    #[must_use]
    pub fn with_processor_version(mut self, version: impl Into<String>) -> Self {
        self.processor_version = version.into();
        self
    }

    /// Attach a quality score
    #[must_use]
    pub fn with_quality_score(mut self, score: f64) -> Self {
        self.quality_score = Some(score);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provenance_type_round_trips_through_strings() {
        for pt in ProvenanceType::all() {
            assert_eq!(pt.as_str().parse::<ProvenanceType>().unwrap(), *pt);
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!("TRANSMOGRIFY".parse::<ProvenanceType>().is_err());
    }
}
