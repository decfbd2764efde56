//! Pre-destruction subgraph archives
//!
//! Before a document is deleted, the knowledge rows linked to it are
//! serialized to a timestamped JSON file so the deletion is recoverable
//! for audit. Documents with no linked nodes produce no file.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use provstore_core::error::{Result, StoreError};
use provstore_storage::{DocumentStore, KgSubgraph};

/// Writes `kg-archive-<document_id>-<timestamp>.json` files
pub struct ArchiveWriter {
    directory: PathBuf,
}

impl ArchiveWriter {
    /// Writer targeting `directory`, created if absent
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|e| {
            StoreError::Storage(format!(
                "cannot create archive directory {}: {e}",
                directory.display()
            ))
        })?;
        Ok(Self { directory })
    }

    /// Directory archives are written into
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Serialize a subgraph; returns the written path, or `None` when the
    /// subgraph has no nodes
    pub fn write(&self, subgraph: &KgSubgraph) -> Result<Option<PathBuf>> {
        if subgraph.is_empty() {
            debug!(document_id = %subgraph.document_id, "no linked nodes; archive skipped");
            return Ok(None);
        }

        let timestamp = Utc::now().format("%Y%m%dT%H%M%S%3fZ");
        let path = self
            .directory
            .join(format!("kg-archive-{}-{timestamp}.json", subgraph.document_id));

        let payload = json!({
            "document_id": subgraph.document_id,
            "archived_at": Utc::now().to_rfc3339(),
            "nodes": subgraph.nodes,
            "edges": subgraph.edges,
            "links": subgraph.links,
            "entities": subgraph.entities,
        });
        fs::write(&path, serde_json::to_vec_pretty(&payload)?).map_err(|e| {
            StoreError::Storage(format!("cannot write archive {}: {e}", path.display()))
        })?;

        info!(
            document_id = %subgraph.document_id,
            path = %path.display(),
            nodes = subgraph.nodes.len(),
            edges = subgraph.edges.len(),
            "knowledge subgraph archived"
        );
        Ok(Some(path))
    }
}

/// Delete a document, archiving its linked subgraph first.
///
/// Returns the archive path when one was written. The archive lands on
/// disk before any row is touched; an archive failure aborts the deletion.
pub fn delete_document_archived(
    store: &DocumentStore,
    writer: &ArchiveWriter,
    document_id: &str,
) -> Result<Option<PathBuf>> {
    let mut written = None;
    store.delete_document_with(document_id, |subgraph| {
        written = writer.write(subgraph)?;
        Ok(())
    })?;
    Ok(written)
}
