//! Node listing and graph statistics

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tracing::debug;

use provstore_core::error::Result;
use provstore_core::types::{EntityType, KnowledgeEdge, KnowledgeNode};
use provstore_storage::{DocumentStore, NodeFilter};

/// Number of nodes reported in `most_connected_nodes`
const TOP_CONNECTED: usize = 10;

/// Node listing request; filters are AND-combined
#[derive(Debug, Clone, Default)]
pub struct NodeQuery {
    pub entity_type: Option<EntityType>,
    /// Case-insensitive substring match on the canonical name
    pub entity_name: Option<String>,
    pub min_document_count: Option<i64>,
    /// Also return every edge whose two endpoints are both in the result
    pub include_edges: bool,
    pub limit: Option<u32>,
}

/// Nodes matching a query, with their internal edges when requested
#[derive(Debug, Clone, Serialize)]
pub struct NodeListing {
    pub nodes: Vec<KnowledgeNode>,
    pub edges: Vec<KnowledgeEdge>,
}

/// List knowledge nodes with optional filters
pub fn list_nodes(store: &DocumentStore, query: &NodeQuery) -> Result<NodeListing> {
    let nodes = store.list_nodes(&NodeFilter {
        entity_type: query.entity_type,
        entity_name: query.entity_name.clone(),
        min_document_count: query.min_document_count,
        limit: query.limit,
    })?;

    let edges = if query.include_edges {
        let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        store
            .all_edges()?
            .into_iter()
            .filter(|e| {
                ids.contains(e.source_node_id.as_str()) && ids.contains(e.target_node_id.as_str())
            })
            .collect()
    } else {
        Vec::new()
    };

    debug!(nodes = nodes.len(), edges = edges.len(), "node listing");
    Ok(NodeListing { nodes, edges })
}

/// A heavily connected node, for the stats summary
#[derive(Debug, Clone, Serialize)]
pub struct ConnectedNode {
    pub id: String,
    pub canonical_name: String,
    pub entity_type: EntityType,
    pub edge_count: i64,
}

/// Whole-graph statistics
#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub total_links: usize,
    pub cross_document_nodes: usize,
    pub single_document_nodes: usize,
    pub nodes_by_type: BTreeMap<String, usize>,
    pub edges_by_type: BTreeMap<String, usize>,
    /// Distinct documents contributing at least one linked entity
    pub documents_covered: usize,
    /// `2 * edges / nodes`: average degree over the undirected view
    pub avg_edges_per_node: f64,
    pub most_connected_nodes: Vec<ConnectedNode>,
}

/// Compute statistics over the current graph
pub fn graph_stats(store: &DocumentStore) -> Result<GraphStats> {
    let nodes = store.list_nodes(&NodeFilter::default())?;
    let edges = store.all_edges()?;
    let links = store.all_links()?;

    let mut nodes_by_type: BTreeMap<String, usize> = BTreeMap::new();
    for node in &nodes {
        *nodes_by_type
            .entry(node.entity_type.as_str().to_string())
            .or_default() += 1;
    }
    let mut edges_by_type: BTreeMap<String, usize> = BTreeMap::new();
    for edge in &edges {
        *edges_by_type
            .entry(edge.relationship_type.as_str().to_string())
            .or_default() += 1;
    }

    let documents_covered = links
        .iter()
        .map(|l| l.document_id.as_str())
        .collect::<HashSet<_>>()
        .len();

    let cross = nodes.iter().filter(|n| n.document_count > 1).count();

    let avg_edges_per_node = if nodes.is_empty() {
        0.0
    } else {
        2.0 * edges.len() as f64 / nodes.len() as f64
    };

    let mut by_degree: Vec<&KnowledgeNode> = nodes.iter().collect();
    by_degree.sort_by(|a, b| {
        b.edge_count
            .cmp(&a.edge_count)
            .then_with(|| a.canonical_name.cmp(&b.canonical_name))
    });
    let most_connected_nodes = by_degree
        .into_iter()
        .take(TOP_CONNECTED)
        .map(|n| ConnectedNode {
            id: n.id.clone(),
            canonical_name: n.canonical_name.clone(),
            entity_type: n.entity_type,
            edge_count: n.edge_count,
        })
        .collect();

    Ok(GraphStats {
        total_nodes: nodes.len(),
        total_edges: edges.len(),
        total_links: links.len(),
        cross_document_nodes: cross,
        single_document_nodes: nodes.len() - cross,
        nodes_by_type,
        edges_by_type,
        documents_covered,
        avg_edges_per_node,
        most_connected_nodes,
    })
}
