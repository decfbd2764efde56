//! # provstore-graph
//!
//! Knowledge-graph construction and querying over a provstore database:
//! two-tier entity resolution (exact grouping, then fuzzy merging with
//! abbreviation, initial, and containment rules), rule-driven edge
//! generation with temporal inference, filtered node listing, all-shortest-
//! path search, graph statistics, and pre-destruction subgraph archives.
//!
//! ```rust,no_run
//! use provstore_graph::{build_graph, BuildOptions, ResolutionMode};
//! # fn main() -> provstore_core::Result<()> {
//! # let store = provstore_storage::DocumentStore::in_memory()?;
//! let stats = build_graph(
//!     &store,
//!     &BuildOptions {
//!         resolution_mode: ResolutionMode::Fuzzy,
//!         rebuild: false,
//!         cluster_hint: None,
//!     },
//! )?;
//! println!("{} nodes", stats.resolved_nodes);
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod builder;
mod edges;
pub mod paths;
pub mod prelude;
pub mod query;
pub mod resolution;
pub mod temporal;

pub use archive::{delete_document_archived, ArchiveWriter};
pub use builder::{build_graph, BuildOptions, BuildStats};
pub use paths::{find_paths, GraphPath, PathOptions, PathResult};
pub use query::{graph_stats, list_nodes, GraphStats, NodeListing, NodeQuery};
pub use resolution::{ResolutionMode, FUZZY_ENTITY_CAP, MERGE_THRESHOLD};
pub use temporal::parse_date;
