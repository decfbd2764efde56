//! # provstore-storage
//!
//! The embedded storage engine for provstore: one SQLite database per
//! store (with the vec0 vector extension), a linear forward-migration
//! pipeline, typed data access for every entity, provenance chain
//! management, FK-safe cascaded deletion with orphan re-parenting, k-NN
//! vector search, and forensic hash verification.
//!
//! The engine is synchronous and single-writer: each [`DocumentStore`]
//! exclusively owns its connection, every public write is one atomic
//! transaction, and readers see WAL snapshots.
//!
//! ```rust,no_run
//! use provstore_storage::{StorageConfig, StorageManager};
//!
//! # fn main() -> provstore_core::Result<()> {
//! let manager = StorageManager::new(StorageConfig::new("./data"))?;
//! let store = manager.create("case_files")?;
//! println!("schema v{}", store.schema_version());
//! # Ok(())
//! # }
//! ```

pub mod cascade;
pub mod dal;
pub mod manager;
pub mod provenance;
pub mod schema;
mod sqlutil;
pub mod store;
pub mod vector;
pub mod verify;

pub use cascade::KgSubgraph;
pub use dal::clusters::FtsCounter;
pub use dal::documents::DocumentSummary;
pub use dal::graph::{GraphBuildBatch, GraphPurgeCounts, NodeDraft, NodeFilter};
pub use dal::ocr::ChunkSearchHit;
pub use manager::{StorageConfig, StorageManager};
pub use schema::SCHEMA_VERSION;
pub use store::DocumentStore;
pub use vector::VectorMatch;
pub use verify::{ChainReport, DatabaseReport, FileIntegrity, HashCheck};
