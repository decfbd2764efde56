//! Schema definition and verification
//!
//! The canonical schema is whatever the migration chain in
//! [`migrations`] produces; this module knows the names of every table and
//! index the finished schema must contain and checks a live database
//! against that list after migration.

pub(crate) mod migrations;

use rusqlite::Connection;
use tracing::debug;

use provstore_core::error::{Result, StoreError};

use crate::sqlutil::map_sql_err;

pub use migrations::SCHEMA_VERSION;

/// Tables the finished schema must contain (virtual tables included)
pub(crate) const EXPECTED_TABLES: &[&str] = &[
    "schema_version",
    "provenance",
    "documents",
    "ocr_results",
    "chunks",
    "embeddings",
    "images",
    "extractions",
    "entities",
    "entity_mentions",
    "entity_extraction_segments",
    "clusters",
    "document_clusters",
    "comparisons",
    "form_fills",
    "uploaded_files",
    "knowledge_nodes",
    "knowledge_edges",
    "node_entity_links",
    "entity_embeddings",
    "kg_statistics",
    "fts_metadata",
    "chunks_fts",
    "vec_embeddings",
    "vec_entity_embeddings",
];

/// Indexes the finished schema must contain
pub(crate) const EXPECTED_INDEXES: &[&str] = &[
    "idx_provenance_root_document",
    "idx_provenance_parent",
    "idx_provenance_type",
    "idx_documents_file_hash",
    "idx_documents_status",
    "idx_ocr_results_document",
    "idx_chunks_document",
    "idx_chunks_ocr_result",
    "idx_embeddings_document",
    "idx_embeddings_chunk",
    "idx_images_document",
    "idx_extractions_document",
    "idx_entities_document",
    "idx_entities_type_normalized",
    "idx_entity_mentions_entity",
    "idx_entity_mentions_chunk",
    "idx_segments_document",
    "idx_document_clusters_document",
    "idx_document_clusters_cluster",
    "idx_comparisons_document_a",
    "idx_comparisons_document_b",
    "idx_knowledge_nodes_type",
    "idx_knowledge_nodes_normalized",
    "idx_knowledge_edges_source",
    "idx_knowledge_edges_target",
    "idx_node_entity_links_node",
    "idx_node_entity_links_document",
];

/// Verify that every expected table and index exists.
///
/// Missing objects produce a `SchemaMismatch` naming each absentee; shadow
/// tables created by FTS5 / vec0 are ignored.
pub(crate) fn verify_schema(conn: &Connection) -> Result<()> {
    let names = |kind: &str| -> Result<Vec<String>> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = ?1")
            .map_err(|e| map_sql_err("verify schema", e))?;
        let rows = stmt
            .query_map([kind], |row| row.get::<_, String>(0))
            .map_err(|e| map_sql_err("verify schema", e))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| map_sql_err("verify schema", e))?);
        }
        Ok(out)
    };

    let tables = names("table")?;
    let indexes = names("index")?;

    let mut missing = Vec::new();
    for table in EXPECTED_TABLES {
        if !tables.iter().any(|t| t == table) {
            missing.push(format!("table {table}"));
        }
    }
    for index in EXPECTED_INDEXES {
        if !indexes.iter().any(|i| i == index) {
            missing.push(format!("index {index}"));
        }
    }

    if missing.is_empty() {
        debug!(
            tables = tables.len(),
            indexes = indexes.len(),
            "schema verified"
        );
        Ok(())
    } else {
        Err(StoreError::SchemaMismatch(format!(
            "missing schema objects: {}",
            missing.join(", ")
        )))
    }
}

/// Read the singleton schema version row
pub(crate) fn current_version(conn: &Connection) -> Result<i64> {
    let exists: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            [],
            |r| r.get(0),
        )
        .map_err(|e| map_sql_err("read schema version", e))?;
    if exists == 0 {
        return Ok(0);
    }
    conn.query_row("SELECT version FROM schema_version WHERE id = 1", [], |r| {
        r.get(0)
    })
    .map_err(|e| map_sql_err("read schema version", e))
}
