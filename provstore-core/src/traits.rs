//! Collaborator seams consumed by the store
//!
//! The store never runs OCR, embedding models, or chunking itself; callers
//! hand it the outputs of these providers. The traits pin down the shapes
//! the core consumes so tests can substitute deterministic fakes.

use std::path::Path;

use crate::error::Result;
use crate::types::OcrMode;

/// Output of one OCR invocation
#[derive(Debug, Clone)]
pub struct OcrOutput {
    pub extracted_text: String,
    pub page_count: i64,
    pub request_id: String,
    pub quality_score: f64,
}

/// External OCR provider
pub trait OcrProvider {
    /// Run OCR over the file at `path`
    fn recognize(&self, path: &Path, mode: OcrMode) -> Result<OcrOutput>;
}

/// Output of one embedding batch
#[derive(Debug, Clone)]
pub struct EmbeddingBatch {
    /// One fixed-dimension vector per input string, in input order
    pub vectors: Vec<Vec<f32>>,
    pub model_name: String,
    pub duration_ms: i64,
}

/// External embedding model runner
pub trait EmbeddingRunner {
    /// Embed a batch of texts with the named model
    fn embed(&self, texts: &[String], model_name: &str) -> Result<EmbeddingBatch>;

    /// Vector dimension produced by this runner
    fn dimensions(&self) -> usize;
}

/// Chunking policy handed to the tokenizer
#[derive(Debug, Clone)]
pub struct ChunkPolicy {
    /// Target chunk size in tokens
    pub size: usize,
    /// Overlap between consecutive chunks in tokens
    pub overlap: usize,
}

/// One chunk produced by the chunker
#[derive(Debug, Clone)]
pub struct ChunkSpan {
    pub text: String,
    pub char_start: i64,
    pub char_end: i64,
    pub page_number: Option<i64>,
}

/// External document chunker
pub trait DocumentChunker {
    /// Split `text` into ordered chunks under `policy`
    fn chunk(&self, text: &str, policy: &ChunkPolicy) -> Result<Vec<ChunkSpan>>;
}
