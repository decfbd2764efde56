//! # provstore-core
//!
//! Shared foundation for the provstore document-analysis store: the domain
//! types for every stored entity, the stable error taxonomy and tool
//! response envelope, canonical content hashing, and the thin traits the
//! engine consumes from external collaborators (OCR, embedding, chunking).
//!
//! The storage engine lives in `provstore-storage`; knowledge-graph
//! construction and querying live in `provstore-graph`. This crate has no
//! database dependency and compiles everywhere.

pub mod error;
pub mod hash;
pub mod prelude;
pub mod traits;
pub mod types;

pub use error::{ErrorCategory, Result, StoreError, ToolError, ToolResponse};
pub use types::{new_id, now_timestamp, ListOptions, DEFAULT_LIST_LIMIT, EMBEDDING_DIM};
