//! Convenience re-exports
//!
//! ```rust
//! use provstore_graph::prelude::*;
//! ```

pub use crate::archive::{delete_document_archived, ArchiveWriter};
pub use crate::builder::{build_graph, BuildOptions, BuildStats};
pub use crate::paths::{find_paths, GraphPath, PathOptions, PathResult};
pub use crate::query::{graph_stats, list_nodes, GraphStats, NodeListing, NodeQuery};
pub use crate::resolution::ResolutionMode;
