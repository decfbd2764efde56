//! Knowledge-graph row access and the build write path
//!
//! The resolver (provstore-graph) computes nodes, links, and edges in
//! memory and hands them over as one [`GraphBuildBatch`]; persisting the
//! batch is a single transaction, so a failed build never leaves a partial
//! graph behind.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::json;
use tracing::info;

use provstore_core::error::{Result, StoreError};
use provstore_core::hash::compute_hash;
use provstore_core::types::{
    now_timestamp, EntityType, KnowledgeEdge, KnowledgeNode, NodeEntityLink, ProvenanceType,
    SourceType,
};

use crate::dal::{parse_enum, parse_json, to_json};
use crate::provenance::create_provenance;
use crate::sqlutil::{map_sql_err, tolerate_missing_table};
use crate::store::DocumentStore;

const NODE_COLUMNS: &str = "id, entity_type, canonical_name, normalized_name, aliases, \
     document_count, mention_count, edge_count, avg_confidence, importance_score, \
     resolution_type, metadata, provenance_id, created_at";

const EDGE_COLUMNS: &str = "id, source_node_id, target_node_id, relationship_type, weight, \
     evidence_count, document_ids, metadata, valid_from, valid_until, normalized_weight, \
     contradiction_count, created_at";

const LINK_COLUMNS: &str =
    "id, node_id, entity_id, document_id, similarity_score, resolution_method, created_at";

fn row_to_node(row: &Row<'_>) -> rusqlite::Result<KnowledgeNode> {
    Ok(KnowledgeNode {
        id: row.get(0)?,
        entity_type: parse_enum(1, &row.get::<_, String>(1)?)?,
        canonical_name: row.get(2)?,
        normalized_name: row.get(3)?,
        aliases: parse_json(4, &row.get::<_, String>(4)?)?,
        document_count: row.get(5)?,
        mention_count: row.get(6)?,
        edge_count: row.get(7)?,
        avg_confidence: row.get(8)?,
        importance_score: row.get(9)?,
        resolution_type: parse_enum(10, &row.get::<_, String>(10)?)?,
        metadata: parse_json(11, &row.get::<_, String>(11)?)?,
        provenance_id: row.get(12)?,
        created_at: row.get(13)?,
    })
}

fn row_to_edge(row: &Row<'_>) -> rusqlite::Result<KnowledgeEdge> {
    Ok(KnowledgeEdge {
        id: row.get(0)?,
        source_node_id: row.get(1)?,
        target_node_id: row.get(2)?,
        relationship_type: parse_enum(3, &row.get::<_, String>(3)?)?,
        weight: row.get(4)?,
        evidence_count: row.get(5)?,
        document_ids: parse_json(6, &row.get::<_, String>(6)?)?,
        metadata: parse_json(7, &row.get::<_, String>(7)?)?,
        valid_from: row.get(8)?,
        valid_until: row.get(9)?,
        normalized_weight: row.get(10)?,
        contradiction_count: row.get(11)?,
        created_at: row.get(12)?,
    })
}

fn row_to_link(row: &Row<'_>) -> rusqlite::Result<NodeEntityLink> {
    Ok(NodeEntityLink {
        id: row.get(0)?,
        node_id: row.get(1)?,
        entity_id: row.get(2)?,
        document_id: row.get(3)?,
        similarity_score: row.get(4)?,
        resolution_method: parse_enum(5, &row.get::<_, String>(5)?)?,
        created_at: row.get(6)?,
    })
}

pub(crate) fn insert_node(conn: &Connection, node: &KnowledgeNode) -> Result<String> {
    conn.execute(
        &format!(
            "INSERT INTO knowledge_nodes ({NODE_COLUMNS}) \
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)"
        ),
        params![
            node.id,
            node.entity_type.as_str(),
            node.canonical_name,
            node.normalized_name,
            to_json(&node.aliases)?,
            node.document_count,
            node.mention_count,
            node.edge_count,
            node.avg_confidence,
            node.importance_score,
            node.resolution_type.as_str(),
            to_json(&node.metadata)?,
            node.provenance_id,
            node.created_at,
        ],
    )
    .map_err(|e| {
        map_sql_err("insert knowledge_node (knowledge_nodes.provenance_id -> provenance.id)", e)
    })?;
    Ok(node.id.clone())
}

pub(crate) fn get_node(conn: &Connection, id: &str) -> Result<Option<KnowledgeNode>> {
    conn.query_row(
        &format!("SELECT {NODE_COLUMNS} FROM knowledge_nodes WHERE id = ?1"),
        [id],
        row_to_node,
    )
    .optional()
    .map_err(|e| map_sql_err("get knowledge_node", e))
}

/// Exact canonical-name lookup, case-insensitive
pub(crate) fn get_node_by_name(conn: &Connection, name: &str) -> Result<Option<KnowledgeNode>> {
    conn.query_row(
        &format!("SELECT {NODE_COLUMNS} FROM knowledge_nodes WHERE lower(canonical_name) = lower(?1)"),
        [name],
        row_to_node,
    )
    .optional()
    .map_err(|e| map_sql_err("get knowledge_node by name", e))
}

/// AND-combined node listing filters
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    pub entity_type: Option<EntityType>,
    /// Case-insensitive substring match on the canonical name
    pub entity_name: Option<String>,
    pub min_document_count: Option<i64>,
    pub limit: Option<u32>,
}

pub(crate) fn list_nodes(conn: &Connection, filter: &NodeFilter) -> Result<Vec<KnowledgeNode>> {
    let limit = filter.limit.unwrap_or(provstore_core::DEFAULT_LIST_LIMIT);
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {NODE_COLUMNS} FROM knowledge_nodes \
             WHERE (?1 IS NULL OR entity_type = ?1) \
               AND (?2 IS NULL OR instr(lower(canonical_name), lower(?2)) > 0) \
               AND (?3 IS NULL OR document_count >= ?3) \
             ORDER BY importance_score DESC, document_count DESC, canonical_name \
             LIMIT ?4"
        ))
        .map_err(|e| map_sql_err("list knowledge_nodes", e))?;
    let rows = stmt
        .query_map(
            params![
                filter.entity_type.map(EntityType::as_str),
                filter.entity_name,
                filter.min_document_count,
                limit,
            ],
            row_to_node,
        )
        .map_err(|e| map_sql_err("list knowledge_nodes", e))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| map_sql_err("list knowledge_nodes", e))?);
    }
    Ok(out)
}

pub(crate) fn all_nodes(conn: &Connection) -> Result<Vec<KnowledgeNode>> {
    list_nodes(conn, &NodeFilter::default())
}

pub(crate) fn update_node_metadata(
    conn: &Connection,
    id: &str,
    metadata: &serde_json::Value,
) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE knowledge_nodes SET metadata = ?2 WHERE id = ?1",
            params![id, to_json(metadata)?],
        )
        .map_err(|e| map_sql_err("update knowledge_node metadata", e))?;
    if changed == 0 {
        return Err(StoreError::NodeNotFound(id.to_string()));
    }
    Ok(())
}

pub(crate) fn insert_edge(conn: &Connection, edge: &KnowledgeEdge) -> Result<String> {
    if !(edge.weight > 0.0 && edge.weight <= 1.0) {
        return Err(StoreError::Validation(format!(
            "edge weight must be in (0, 1], got {}",
            edge.weight
        )));
    }
    conn.execute(
        &format!(
            "INSERT INTO knowledge_edges ({EDGE_COLUMNS}) \
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)"
        ),
        params![
            edge.id,
            edge.source_node_id,
            edge.target_node_id,
            edge.relationship_type.as_str(),
            edge.weight,
            edge.evidence_count,
            to_json(&edge.document_ids)?,
            to_json(&edge.metadata)?,
            edge.valid_from,
            edge.valid_until,
            edge.normalized_weight,
            edge.contradiction_count,
            edge.created_at,
        ],
    )
    .map_err(|e| {
        map_sql_err("insert knowledge_edge (knowledge_edges.source_node_id -> knowledge_nodes.id)", e)
    })?;
    Ok(edge.id.clone())
}

pub(crate) fn all_edges(conn: &Connection) -> Result<Vec<KnowledgeEdge>> {
    let mut stmt = conn
        .prepare(&format!("SELECT {EDGE_COLUMNS} FROM knowledge_edges ORDER BY rowid"))
        .map_err(|e| map_sql_err("list knowledge_edges", e))?;
    let rows = stmt
        .query_map([], row_to_edge)
        .map_err(|e| map_sql_err("list knowledge_edges", e))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| map_sql_err("list knowledge_edges", e))?);
    }
    Ok(out)
}

pub(crate) fn edges_for_node(conn: &Connection, node_id: &str) -> Result<Vec<KnowledgeEdge>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {EDGE_COLUMNS} FROM knowledge_edges \
             WHERE source_node_id = ?1 OR target_node_id = ?1 ORDER BY rowid"
        ))
        .map_err(|e| map_sql_err("list edges for node", e))?;
    let rows = stmt
        .query_map([node_id], row_to_edge)
        .map_err(|e| map_sql_err("list edges for node", e))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| map_sql_err("list edges for node", e))?);
    }
    Ok(out)
}

pub(crate) fn insert_link(conn: &Connection, link: &NodeEntityLink) -> Result<String> {
    conn.execute(
        &format!("INSERT INTO node_entity_links ({LINK_COLUMNS}) VALUES (?1,?2,?3,?4,?5,?6,?7)"),
        params![
            link.id,
            link.node_id,
            link.entity_id,
            link.document_id,
            link.similarity_score,
            link.resolution_method.as_str(),
            link.created_at,
        ],
    )
    .map_err(|e| {
        map_sql_err("insert node_entity_link (node_entity_links.entity_id -> entities.id)", e)
    })?;
    Ok(link.id.clone())
}

pub(crate) fn links_for_document(conn: &Connection, document_id: &str) -> Result<Vec<NodeEntityLink>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {LINK_COLUMNS} FROM node_entity_links WHERE document_id = ?1 ORDER BY rowid"
        ))
        .map_err(|e| map_sql_err("list links for document", e))?;
    let rows = stmt
        .query_map([document_id], row_to_link)
        .map_err(|e| map_sql_err("list links for document", e))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| map_sql_err("list links for document", e))?);
    }
    Ok(out)
}

pub(crate) fn links_for_node(conn: &Connection, node_id: &str) -> Result<Vec<NodeEntityLink>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {LINK_COLUMNS} FROM node_entity_links WHERE node_id = ?1 ORDER BY rowid"
        ))
        .map_err(|e| map_sql_err("list links for node", e))?;
    let rows = stmt
        .query_map([node_id], row_to_link)
        .map_err(|e| map_sql_err("list links for node", e))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| map_sql_err("list links for node", e))?);
    }
    Ok(out)
}

pub(crate) fn all_links(conn: &Connection) -> Result<Vec<NodeEntityLink>> {
    let mut stmt = conn
        .prepare(&format!("SELECT {LINK_COLUMNS} FROM node_entity_links ORDER BY rowid"))
        .map_err(|e| map_sql_err("list links", e))?;
    let rows = stmt
        .query_map([], row_to_link)
        .map_err(|e| map_sql_err("list links", e))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| map_sql_err("list links", e))?);
    }
    Ok(out)
}

/// One resolved node plus its per-entity links, ready to persist
#[derive(Debug, Clone)]
pub struct NodeDraft {
    /// Node with every field populated except `provenance_id`
    pub node: KnowledgeNode,
    /// Links with `node_id` pre-set to `node.id`
    pub links: Vec<NodeEntityLink>,
    /// Member entity ids recorded in the per-node resolution provenance
    pub member_entity_ids: Vec<String>,
    /// DOCUMENT provenance of the node's primary contributing document;
    /// absent for corpus-level nodes
    pub primary_document_provenance_id: Option<String>,
}

/// Output of a resolver run, persisted in one transaction
#[derive(Debug, Clone)]
pub struct GraphBuildBatch {
    pub resolution_mode: String,
    pub cluster_hint: Option<String>,
    pub total_entities: usize,
    pub nodes: Vec<NodeDraft>,
    pub edges: Vec<KnowledgeEdge>,
}

/// Row counts removed by a graph purge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphPurgeCounts {
    pub nodes: usize,
    pub edges: usize,
    pub links: usize,
}

pub(crate) fn apply_graph_build(conn: &Connection, batch: &GraphBuildBatch) -> Result<String> {
    let params_json = json!({
        "resolution_mode": batch.resolution_mode,
        "cluster_hint": batch.cluster_hint,
        "total_entities": batch.total_entities,
    });
    let main = create_provenance(
        conn,
        &provstore_core::types::ProvenanceSpec::new(
            ProvenanceType::KnowledgeGraph,
            SourceType::GraphBuilder,
            compute_hash(&params_json.to_string()),
            "knowledge-graph-builder",
        )
        .with_params(params_json.clone()),
    )?;

    for draft in &batch.nodes {
        let node_spec = provstore_core::types::ProvenanceSpec {
            parent_id: draft.primary_document_provenance_id.clone(),
            source_id: Some(main.id.clone()),
            ..provstore_core::types::ProvenanceSpec::new(
                ProvenanceType::KnowledgeGraph,
                SourceType::EntityResolver,
                compute_hash(&draft.node.normalized_name),
                "entity-resolution",
            )
        }
        .with_params(json!({
            "tier": draft.node.resolution_type.as_str(),
            "entity_ids": draft.member_entity_ids,
        }));
        let node_provenance = create_provenance(conn, &node_spec)?;

        let mut node = draft.node.clone();
        node.provenance_id = node_provenance.id;
        insert_node(conn, &node)?;
        for link in &draft.links {
            insert_link(conn, link)?;
        }
    }

    for edge in &batch.edges {
        insert_edge(conn, edge)?;
    }

    conn.execute(
        "UPDATE knowledge_nodes SET edge_count = (
             SELECT COUNT(*) FROM knowledge_edges
             WHERE source_node_id = knowledge_nodes.id OR target_node_id = knowledge_nodes.id)",
        [],
    )
    .map_err(|e| map_sql_err("refresh node edge counts", e))?;

    update_statistics(conn, Some(&params_json))?;

    info!(
        nodes = batch.nodes.len(),
        edges = batch.edges.len(),
        "knowledge graph persisted"
    );
    Ok(main.id)
}

pub(crate) fn update_statistics(
    conn: &Connection,
    build_params: Option<&serde_json::Value>,
) -> Result<()> {
    let params_text = match build_params {
        Some(v) => Some(to_json(v)?),
        None => None,
    };
    conn.execute(
        "UPDATE kg_statistics SET \
             total_nodes = (SELECT COUNT(*) FROM knowledge_nodes), \
             total_edges = (SELECT COUNT(*) FROM knowledge_edges), \
             total_links = (SELECT COUNT(*) FROM node_entity_links), \
             built_at = ?1, \
             build_params = COALESCE(?2, build_params) \
         WHERE id = 1",
        params![now_timestamp(), params_text],
    )
    .map_err(|e| map_sql_err("update graph statistics", e))?;
    Ok(())
}

/// Drop every graph row: edges, then links, then nodes, then the
/// entity-embedding side tables (absent on older schemas) and the
/// now-unreferenced KNOWLEDGE_GRAPH provenance rows.
pub(crate) fn delete_all_graph_data(conn: &Connection) -> Result<GraphPurgeCounts> {
    let edges = conn
        .execute("DELETE FROM knowledge_edges", [])
        .map_err(|e| map_sql_err("purge knowledge_edges", e))?;
    let links = conn
        .execute("DELETE FROM node_entity_links", [])
        .map_err(|e| map_sql_err("purge node_entity_links", e))?;
    let nodes = conn
        .execute("DELETE FROM knowledge_nodes", [])
        .map_err(|e| map_sql_err("purge knowledge_nodes", e))?;

    tolerate_missing_table("entity_embeddings", "purge entity_embeddings", || {
        conn.execute("DELETE FROM entity_embeddings", [])
    })?;
    tolerate_missing_table("vec_entity_embeddings", "purge entity embedding vectors", || {
        conn.execute("DELETE FROM vec_entity_embeddings", [])
    })?;

    conn.execute("DELETE FROM provenance WHERE type = 'KNOWLEDGE_GRAPH'", [])
        .map_err(|e| map_sql_err("purge graph provenance", e))?;

    update_statistics(conn, None)?;

    let counts = GraphPurgeCounts { nodes, edges, links };
    info!(?counts, "knowledge graph purged");
    Ok(counts)
}

impl DocumentStore {
    /// Fetch a knowledge node by id
    pub fn get_node(&self, id: &str) -> Result<Option<KnowledgeNode>> {
        self.with_conn(|conn| get_node(conn, id))
    }

    /// Exact canonical-name lookup, case-insensitive
    pub fn get_node_by_name(&self, name: &str) -> Result<Option<KnowledgeNode>> {
        self.with_conn(|conn| get_node_by_name(conn, name))
    }

    /// Filtered node listing
    pub fn list_nodes(&self, filter: &NodeFilter) -> Result<Vec<KnowledgeNode>> {
        self.with_conn(|conn| list_nodes(conn, filter))
    }

    /// Every edge in the graph
    pub fn all_edges(&self) -> Result<Vec<KnowledgeEdge>> {
        self.with_conn(all_edges)
    }

    /// Edges incident on a node
    pub fn edges_for_node(&self, node_id: &str) -> Result<Vec<KnowledgeEdge>> {
        self.with_conn(|conn| edges_for_node(conn, node_id))
    }

    /// Every node-entity link
    pub fn all_links(&self) -> Result<Vec<NodeEntityLink>> {
        self.with_conn(all_links)
    }

    /// Links attaching a document's entities to nodes
    pub fn links_for_document(&self, document_id: &str) -> Result<Vec<NodeEntityLink>> {
        self.with_conn(|conn| links_for_document(conn, document_id))
    }

    /// Links attaching entities to one node
    pub fn links_for_node(&self, node_id: &str) -> Result<Vec<NodeEntityLink>> {
        self.with_conn(|conn| links_for_node(conn, node_id))
    }

    /// True when a knowledge graph has already been built
    pub fn graph_exists(&self) -> Result<bool> {
        self.with_conn(crate::provenance::graph_provenance_exists)
    }

    /// Persist a resolver run atomically; returns the main build
    /// provenance id
    pub fn apply_graph_build(&self, batch: &GraphBuildBatch) -> Result<String> {
        self.with_tx(|conn| apply_graph_build(conn, batch))
    }

    /// Drop all graph rows and their provenance; returns removed counts
    pub fn purge_graph_data(&self) -> Result<GraphPurgeCounts> {
        self.with_tx(delete_all_graph_data)
    }
}
