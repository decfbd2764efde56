//! Cascaded deletion and derived-data reset
//!
//! The foreign-key topology is unfriendly to naive deletes: provenance rows
//! reference each other (`parent_id`, `source_id`), and images and
//! embeddings reference each other in a cycle
//! (`images.vlm_embedding_id -> embeddings.id`,
//! `embeddings.image_id -> images.id`). Both loops are broken by explicit
//! pre-nulling inside one transaction rather than by ON DELETE clauses.
//!
//! Artifacts shared across documents survive deletion: a knowledge node
//! with members from other documents keeps living, and any provenance row
//! it still references is re-parented under the synthetic orphaned root so
//! its chain still ends at a DOCUMENT.

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use tracing::{debug, info, warn};

use provstore_core::error::{Result, StoreError};
use provstore_core::types::{
    now_timestamp, Document, Entity, KnowledgeEdge, KnowledgeNode, NodeEntityLink, Provenance,
    ORPHANED_ROOT_ID,
};

use crate::dal::{entities, graph, to_json};
use crate::provenance::{by_root_document, ensure_orphaned_root};
use crate::sqlutil::{map_sql_err, tolerate_missing_table};
use crate::store::DocumentStore;
use crate::vector::delete_vectors_for_document;

/// The knowledge-graph rows attached to one document, captured before a
/// destructive operation so an archive can be written
#[derive(Debug, Clone, serde::Serialize)]
pub struct KgSubgraph {
    pub document_id: String,
    pub nodes: Vec<KnowledgeNode>,
    pub edges: Vec<KnowledgeEdge>,
    pub links: Vec<NodeEntityLink>,
    pub entities: Vec<Entity>,
}

impl KgSubgraph {
    /// Nothing is linked; there is nothing worth archiving
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl DocumentStore {
    /// Capture the subgraph linked to a document: its linked nodes, every
    /// edge touching one of them, the links, and the document's entities
    pub fn collect_subgraph(&self, document_id: &str) -> Result<KgSubgraph> {
        self.with_conn(|conn| {
            let links = graph::links_for_document(conn, document_id)?;
            let mut node_ids: Vec<String> = links.iter().map(|l| l.node_id.clone()).collect();
            node_ids.sort();
            node_ids.dedup();

            let mut nodes = Vec::new();
            for node_id in &node_ids {
                if let Some(node) = graph::get_node(conn, node_id)? {
                    nodes.push(node);
                }
            }

            let edges = graph::all_edges(conn)?
                .into_iter()
                .filter(|e| {
                    node_ids.binary_search(&e.source_node_id).is_ok()
                        || node_ids.binary_search(&e.target_node_id).is_ok()
                })
                .collect();

            let entities = entities::entities_for_document(conn, document_id)?;

            Ok(KgSubgraph {
                document_id: document_id.to_string(),
                nodes,
                edges,
                links,
                entities,
            })
        })
    }

    /// Delete a document and everything derived from it.
    ///
    /// Shared artifacts survive: knowledge nodes with members from other
    /// documents are kept (with their counts decremented), and provenance
    /// rows they reference are re-parented under the orphaned root.
    pub fn delete_document(&self, id: &str) -> Result<()> {
        self.delete_document_with(id, |_| Ok(()))
    }

    /// [`DocumentStore::delete_document`] with a pre-delete hook that
    /// receives the document's knowledge subgraph (for archive writers).
    /// The hook runs before the delete transaction starts; a hook error
    /// aborts the operation with nothing deleted.
    pub fn delete_document_with(
        &self,
        id: &str,
        pre_delete: impl FnOnce(&KgSubgraph) -> Result<()>,
    ) -> Result<()> {
        let document = self
            .get_document(id)?
            .ok_or_else(|| StoreError::DocumentNotFound(id.to_string()))?;

        let subgraph = self.collect_subgraph(id)?;
        pre_delete(&subgraph)?;

        self.with_tx(|conn| {
            delete_derived(conn, &document)?;
            conn.execute("DELETE FROM documents WHERE id = ?1", [id])
                .map_err(|e| map_sql_err("delete document row", e))?;
            refresh_fts_counters(conn)?;
            teardown_provenance(conn, &document, true)?;
            info!(document_id = id, "document deleted");
            Ok(())
        })
    }

    /// Remove every derived artifact of a document while keeping the
    /// document row and its DOCUMENT provenance, so processing can be
    /// retried from scratch. The caller resets the document status.
    pub fn reset_derived(&self, id: &str) -> Result<()> {
        let document = self
            .get_document(id)?
            .ok_or_else(|| StoreError::DocumentNotFound(id.to_string()))?;

        self.with_tx(|conn| {
            delete_derived(conn, &document)?;
            refresh_fts_counters(conn)?;
            teardown_provenance(conn, &document, false)?;
            info!(document_id = id, "derived data reset");
            Ok(())
        })
    }
}

/// Steps shared by delete and reset: drain every derived table in
/// FK-safe order, breaking the image/embedding cycle first.
fn delete_derived(conn: &Connection, document: &Document) -> Result<()> {
    let id = document.id.as_str();

    let embedding_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM embeddings WHERE document_id = ?1",
            [id],
            |r| r.get(0),
        )
        .map_err(|e| map_sql_err("count document embeddings", e))?;
    debug!(document_id = id, embedding_count, "cascade starting");

    let vectors_removed = delete_vectors_for_document(conn, id)?;
    debug!(document_id = id, vectors_removed, "vectors removed");

    // Break the VLM cycle on this document's own images.
    conn.execute(
        "UPDATE images SET vlm_embedding_id = NULL WHERE document_id = ?1",
        [id],
    )
    .map_err(|e| map_sql_err("null own vlm references", e))?;

    // Images of OTHER documents can point into this document's embeddings
    // after caption dedup. Re-queue them so a later pass re-derives the
    // caption instead of leaving them silently invisible.
    let orphaned_docs: Vec<String> = {
        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT document_id FROM images \
                 WHERE document_id != ?1 AND vlm_embedding_id IN (
                     SELECT id FROM embeddings WHERE document_id = ?1)",
            )
            .map_err(|e| map_sql_err("find vlm-orphaned documents", e))?;
        let rows = stmt
            .query_map([id], |r| r.get::<_, String>(0))
            .map_err(|e| map_sql_err("find vlm-orphaned documents", e))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| map_sql_err("find vlm-orphaned documents", e))?);
        }
        out
    };
    if !orphaned_docs.is_empty() {
        warn!(
            document_id = id,
            affected = ?orphaned_docs,
            "re-queueing VLM captions orphaned by dedup"
        );
        conn.execute(
            "UPDATE images SET vlm_embedding_id = NULL, vlm_status = 'pending' \
             WHERE document_id != ?1 AND vlm_embedding_id IN (
                 SELECT id FROM embeddings WHERE document_id = ?1)",
            [id],
        )
        .map_err(|e| map_sql_err("re-queue orphaned vlm captions", e))?;
    }

    conn.execute("DELETE FROM embeddings WHERE document_id = ?1", [id])
        .map_err(|e| map_sql_err("delete embeddings", e))?;
    conn.execute("DELETE FROM images WHERE document_id = ?1", [id])
        .map_err(|e| map_sql_err("delete images", e))?;

    // Cluster membership: decrement before dropping the assignments.
    conn.execute(
        "UPDATE clusters SET document_count = document_count - (
             SELECT COUNT(*) FROM document_clusters dc
             WHERE dc.cluster_id = clusters.id AND dc.document_id = ?1)
         WHERE id IN (
             SELECT cluster_id FROM document_clusters
             WHERE document_id = ?1 AND cluster_id IS NOT NULL)",
        [id],
    )
    .map_err(|e| map_sql_err("decrement cluster counts", e))?;
    conn.execute("DELETE FROM document_clusters WHERE document_id = ?1", [id])
        .map_err(|e| map_sql_err("delete cluster assignments", e))?;

    conn.execute(
        "DELETE FROM comparisons WHERE document_a_id = ?1 OR document_b_id = ?1",
        [id],
    )
    .map_err(|e| map_sql_err("delete comparisons", e))?;

    // Entity-level embeddings for nodes linked to this document. The
    // tables arrived late in the schema's life; older databases lack them.
    tolerate_missing_table("vec_entity_embeddings", "delete entity vectors", || {
        conn.execute(
            "DELETE FROM vec_entity_embeddings WHERE node_id IN (
                 SELECT node_id FROM node_entity_links WHERE document_id = ?1)",
            [id],
        )
    })?;
    tolerate_missing_table("entity_embeddings", "delete entity embeddings", || {
        conn.execute(
            "DELETE FROM entity_embeddings WHERE node_id IN (
                 SELECT node_id FROM node_entity_links WHERE document_id = ?1)",
            [id],
        )
    })?;

    cleanup_graph_for_document(conn, id)?;

    conn.execute(
        "DELETE FROM entity_extraction_segments WHERE document_id = ?1",
        [id],
    )
    .map_err(|e| map_sql_err("delete extraction segments", e))?;
    // Mentions hold an FK into entities; they go first.
    conn.execute(
        "DELETE FROM entity_mentions WHERE entity_id IN (
             SELECT id FROM entities WHERE document_id = ?1)",
        [id],
    )
    .map_err(|e| map_sql_err("delete entity mentions", e))?;
    conn.execute("DELETE FROM entities WHERE document_id = ?1", [id])
        .map_err(|e| map_sql_err("delete entities", e))?;

    conn.execute("DELETE FROM chunks_fts WHERE document_id = ?1", [id])
        .map_err(|e| map_sql_err("delete chunk fts rows", e))?;
    conn.execute("DELETE FROM chunks WHERE document_id = ?1", [id])
        .map_err(|e| map_sql_err("delete chunks", e))?;
    conn.execute("DELETE FROM extractions WHERE document_id = ?1", [id])
        .map_err(|e| map_sql_err("delete extractions", e))?;
    conn.execute("DELETE FROM ocr_results WHERE document_id = ?1", [id])
        .map_err(|e| map_sql_err("delete ocr results", e))?;

    conn.execute("DELETE FROM form_fills WHERE document_id = ?1", [id])
        .map_err(|e| map_sql_err("delete form fills", e))?;
    conn.execute("DELETE FROM uploaded_files WHERE document_id = ?1", [id])
        .map_err(|e| map_sql_err("delete uploaded files", e))?;

    Ok(())
}

/// Drop a document's node-entity links, shrink or delete the affected
/// nodes, and refresh the statistics row
pub(crate) fn cleanup_graph_for_document(conn: &Connection, document_id: &str) -> Result<()> {
    let links = graph::links_for_document(conn, document_id)?;
    if links.is_empty() {
        return Ok(());
    }

    let mut node_ids: Vec<String> = links.iter().map(|l| l.node_id.clone()).collect();
    node_ids.sort();
    node_ids.dedup();

    conn.execute(
        "DELETE FROM node_entity_links WHERE document_id = ?1",
        [document_id],
    )
    .map_err(|e| map_sql_err("delete node links", e))?;

    let mut removed_nodes = 0usize;
    for node_id in &node_ids {
        conn.execute(
            "UPDATE knowledge_nodes SET document_count = document_count - 1 WHERE id = ?1",
            [node_id],
        )
        .map_err(|e| map_sql_err("decrement node document count", e))?;

        let remaining: i64 = conn
            .query_row(
                "SELECT document_count FROM knowledge_nodes WHERE id = ?1",
                [node_id],
                |r| r.get(0),
            )
            .map_err(|e| map_sql_err("read node document count", e))?;

        if remaining <= 0 {
            conn.execute(
                "DELETE FROM knowledge_edges WHERE source_node_id = ?1 OR target_node_id = ?1",
                [node_id],
            )
            .map_err(|e| map_sql_err("delete node edges", e))?;
            conn.execute("DELETE FROM knowledge_nodes WHERE id = ?1", [node_id])
                .map_err(|e| map_sql_err("delete node", e))?;
            removed_nodes += 1;
        }
    }

    graph::update_statistics(conn, None)?;
    debug!(
        document_id,
        links = links.len(),
        removed_nodes,
        "graph cleanup complete"
    );
    Ok(())
}

fn refresh_fts_counters(conn: &Connection) -> Result<()> {
    tolerate_missing_table("fts_metadata", "refresh fts counters", || {
        conn.execute(
            "UPDATE fts_metadata SET \
                 row_count = CASE id \
                     WHEN 1 THEN (SELECT COUNT(*) FROM documents) \
                     WHEN 2 THEN (SELECT COUNT(*) FROM chunks) \
                     WHEN 3 THEN (SELECT COUNT(*) FROM entities) \
                 END, \
                 updated_at = ?1 \
             WHERE id IN (1, 2, 3)",
            [now_timestamp()],
        )
    })?;
    Ok(())
}

/// Tear down the provenance chain rooted at the document's DOCUMENT
/// provenance, deepest rows first. Self-references inside the chain are
/// pre-nulled so deletion order within a depth level cannot matter. Rows
/// still referenced by a surviving cluster or knowledge node are
/// re-parented under the orphaned root instead of deleted.
fn teardown_provenance(conn: &Connection, document: &Document, include_root: bool) -> Result<()> {
    let mut rows = by_root_document(conn, &document.provenance_id)?;
    rows.sort_by(|a, b| b.chain_depth.cmp(&a.chain_depth));

    let rows: Vec<Provenance> = rows
        .into_iter()
        .filter(|p| include_root || p.chain_depth > 0)
        .collect();

    for row in &rows {
        conn.execute(
            "UPDATE provenance SET parent_id = NULL, source_id = NULL WHERE id = ?1",
            [&row.id],
        )
        .map_err(|e| map_sql_err("pre-null provenance references", e))?;
    }

    let mut reparented = 0usize;
    for row in &rows {
        let cluster_refs: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM clusters WHERE provenance_id = ?1",
                [&row.id],
                |r| r.get(0),
            )
            .map_err(|e| map_sql_err("count cluster references", e))?;
        let node_refs: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM knowledge_nodes WHERE provenance_id = ?1",
                [&row.id],
                |r| r.get(0),
            )
            .map_err(|e| map_sql_err("count node references", e))?;

        if cluster_refs == 0 && node_refs == 0 {
            conn.execute("DELETE FROM provenance WHERE id = ?1", [&row.id])
                .map_err(|e| map_sql_err("delete provenance row", e))?;
            continue;
        }

        reparent_row(conn, row, document)?;
        reparented += 1;
    }

    if reparented > 0 {
        info!(
            document_id = %document.id,
            reparented,
            "provenance rows re-parented under orphaned root"
        );
    }
    Ok(())
}

fn reparent_row(conn: &Connection, row: &Provenance, document: &Document) -> Result<()> {
    let root = ensure_orphaned_root(conn)?;
    let reparented_at = now_timestamp();

    let chain_path = vec![
        provstore_core::types::ProvenanceType::Document,
        row.provenance_type,
    ];
    conn.execute(
        "UPDATE provenance SET parent_id = ?2, source_id = ?2, parent_ids = ?3, \
             root_document_id = ?4, chain_depth = 1, chain_path = ?5 \
         WHERE id = ?1",
        params![
            row.id,
            root,
            to_json(&vec![root.clone()])?,
            ORPHANED_ROOT_ID,
            to_json(&chain_path)?,
        ],
    )
    .map_err(|e| map_sql_err("re-parent provenance row", e))?;

    // Every surviving node on this provenance records where it came from.
    let marker = json!({
        "original_document_id": document.id,
        "original_root_document_id": document.provenance_id,
        "orphaned_root_id": ORPHANED_ROOT_ID,
        "reparented_at": reparented_at,
    });
    let node_ids: Vec<String> = {
        let mut stmt = conn
            .prepare("SELECT id FROM knowledge_nodes WHERE provenance_id = ?1")
            .map_err(|e| map_sql_err("list reparented nodes", e))?;
        let rows = stmt
            .query_map([&row.id], |r| r.get::<_, String>(0))
            .map_err(|e| map_sql_err("list reparented nodes", e))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r.map_err(|e| map_sql_err("list reparented nodes", e))?);
        }
        out
    };
    for node_id in node_ids {
        let metadata: Option<String> = conn
            .query_row(
                "SELECT metadata FROM knowledge_nodes WHERE id = ?1",
                [&node_id],
                |r| r.get(0),
            )
            .optional()
            .map_err(|e| map_sql_err("read node metadata", e))?;
        let mut value: serde_json::Value = metadata
            .as_deref()
            .and_then(|m| serde_json::from_str(m).ok())
            .unwrap_or_else(|| json!({}));
        if let Some(map) = value.as_object_mut() {
            map.insert("reparented".to_string(), marker.clone());
        }
        graph::update_node_metadata(conn, &node_id, &value)?;
    }

    debug!(provenance_id = %row.id, "provenance row re-parented");
    Ok(())
}
