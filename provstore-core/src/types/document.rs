//! Documents and their directly derived artifacts

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

/// Processing state of an ingested document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

impl DocumentStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "complete" => Ok(Self::Complete),
            "failed" => Ok(Self::Failed),
            other => Err(StoreError::Validation(format!(
                "unknown document status: {other}"
            ))),
        }
    }
}

/// Embedding state of a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingStatus {
    Pending,
    Complete,
    Failed,
}

impl EmbeddingStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for EmbeddingStatus {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "complete" => Ok(Self::Complete),
            "failed" => Ok(Self::Failed),
            other => Err(StoreError::Validation(format!(
                "unknown embedding status: {other}"
            ))),
        }
    }
}

/// Caption state of an extracted image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VlmStatus {
    Pending,
    Complete,
    Failed,
}

impl VlmStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for VlmStatus {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "complete" => Ok(Self::Complete),
            "failed" => Ok(Self::Failed),
            other => Err(StoreError::Validation(format!("unknown vlm status: {other}"))),
        }
    }
}

/// Speed/quality trade-off requested from the OCR provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrMode {
    Fast,
    Balanced,
    Accurate,
}

impl OcrMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Balanced => "balanced",
            Self::Accurate => "accurate",
        }
    }
}

/// One ingested source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub file_path: String,
    pub file_name: String,
    pub file_hash: String,
    pub file_size: i64,
    pub file_type: String,
    pub status: DocumentStatus,
    pub page_count: Option<i64>,
    /// DOCUMENT-typed provenance row; unique per document
    pub provenance_id: String,
    pub created_at: String,
    pub updated_at: String,
    pub error_message: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
}

/// Input for inserting a document
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub file_path: String,
    pub file_name: String,
    pub file_hash: String,
    pub file_size: i64,
    pub file_type: String,
    pub page_count: Option<i64>,
    pub provenance_id: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
}

/// OCR output for a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResult {
    pub id: String,
    pub document_id: String,
    pub extracted_text: String,
    pub page_count: Option<i64>,
    pub ocr_mode: Option<String>,
    pub request_id: Option<String>,
    pub quality_score: Option<f64>,
    pub provenance_id: String,
    pub created_at: String,
}

/// A positioned slice of OCR text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub ocr_result_id: String,
    pub chunk_index: i64,
    pub text: String,
    /// Canonical hash of `text`
    pub text_hash: String,
    pub char_start: i64,
    pub char_end: i64,
    pub page_number: Option<i64>,
    pub embedding_status: EmbeddingStatus,
    pub provenance_id: String,
    pub created_at: String,
}

/// A stored vector's metadata row
///
/// Denormalized: carries the original text and source-file identifiers so a
/// similarity hit is self-describing without joining back to the chunk.
/// Exactly one of `chunk_id` / `image_id` / `extraction_id` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub id: String,
    pub document_id: String,
    pub chunk_id: Option<String>,
    pub image_id: Option<String>,
    pub extraction_id: Option<String>,
    pub model_name: String,
    pub dimension: i64,
    pub original_text: String,
    pub source_file_name: String,
    pub source_file_path: String,
    pub page_number: Option<i64>,
    /// Hash of the base64 of the vector bytes
    pub content_hash: String,
    pub provenance_id: String,
    pub created_at: String,
}

impl Embedding {
    /// The one source id this embedding derives from
    #[must_use]
    pub fn source_artifact_id(&self) -> Option<&str> {
        self.chunk_id
            .as_deref()
            .or(self.image_id.as_deref())
            .or(self.extraction_id.as_deref())
    }
}

/// An image extracted from a document page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub document_id: String,
    pub page_number: Option<i64>,
    pub image_path: Option<String>,
    pub image_hash: Option<String>,
    pub vlm_description: Option<String>,
    pub vlm_status: VlmStatus,
    /// Embedding of the VLM caption; may point into another document's
    /// embeddings after caption dedup
    pub vlm_embedding_id: Option<String>,
    pub provenance_id: String,
    pub created_at: String,
}

/// Structured data extracted against a named schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    pub id: String,
    pub document_id: String,
    pub schema_name: String,
    /// Extracted payload as JSON text
    pub extracted_data: String,
    pub confidence: Option<f64>,
    pub provenance_id: String,
    pub created_at: String,
}

/// Record of a file handed to the external file manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    pub document_id: Option<String>,
    pub remote_id: Option<String>,
    pub file_name: String,
    pub status: Option<String>,
    pub uploaded_at: Option<String>,
    pub created_at: String,
}
