//! Knowledge-graph build orchestration
//!
//! Loads every entity, resolves them into nodes, generates edges, and
//! persists the result through the storage engine in one transaction.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use provstore_core::error::{Result, StoreError};
use provstore_core::types::{new_id, now_timestamp, KnowledgeNode, NodeEntityLink};
use provstore_storage::{DocumentStore, GraphBuildBatch, NodeDraft};

use crate::edges::{generate_edges, NodeSeed};
use crate::resolution::{resolve_entities, ResolutionMode, ResolvedCluster};

/// Inputs to a graph build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildOptions {
    pub resolution_mode: ResolutionMode,
    /// Purge any existing graph before building
    pub rebuild: bool,
    /// Domain hint (e.g. `employment`, `medical`, `litigation`) that
    /// boosts matching relationship rules
    pub cluster_hint: Option<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            resolution_mode: ResolutionMode::Exact,
            rebuild: false,
            cluster_hint: None,
        }
    }
}

/// Summary of a completed build
#[derive(Debug, Clone, Serialize)]
pub struct BuildStats {
    pub total_entities: usize,
    pub resolved_nodes: usize,
    pub cross_document_nodes: usize,
    pub single_document_nodes: usize,
    pub unmatched: usize,
    pub edges_created: usize,
    /// Main KNOWLEDGE_GRAPH provenance id
    pub provenance_id: String,
}

/// Build (or rebuild) the knowledge graph from the store's entities
pub fn build_graph(store: &DocumentStore, options: &BuildOptions) -> Result<BuildStats> {
    if store.count_entities()? == 0 {
        return Err(StoreError::NoEntitiesFound);
    }
    if store.graph_exists()? {
        if !options.rebuild {
            return Err(StoreError::GraphAlreadyExists);
        }
        let purged = store.purge_graph_data()?;
        info!(
            nodes = purged.nodes,
            edges = purged.edges,
            links = purged.links,
            "existing graph purged for rebuild"
        );
    }

    let entities = store.all_entities()?;
    let resolution = resolve_entities(&entities, options.resolution_mode)?;

    // chunk ids per entity, for co-location evidence
    let mut entity_chunks: HashMap<String, BTreeSet<String>> = HashMap::new();
    for (entity_id, chunk_id) in store.mention_chunk_pairs()? {
        entity_chunks.entry(entity_id).or_default().insert(chunk_id);
    }

    // DOCUMENT provenance per document, for per-node resolution provenance
    let mut document_provenance: HashMap<String, Option<String>> = HashMap::new();

    let mut drafts = Vec::with_capacity(resolution.clusters.len());
    let mut seeds = Vec::with_capacity(resolution.clusters.len());

    for cluster in &resolution.clusters {
        let node_id = new_id();
        let now = now_timestamp();

        let primary_provenance = document_provenance
            .entry(cluster.primary_document_id.clone())
            .or_insert_with(|| {
                store
                    .get_document(&cluster.primary_document_id)
                    .ok()
                    .flatten()
                    .map(|d| d.provenance_id)
            })
            .clone();

        let links = cluster
            .members
            .iter()
            .map(|member| NodeEntityLink {
                id: new_id(),
                node_id: node_id.clone(),
                entity_id: member.entity_id.clone(),
                document_id: member.document_id.clone(),
                similarity_score: member.similarity,
                resolution_method: member.method,
                created_at: now.clone(),
            })
            .collect::<Vec<_>>();

        let node = KnowledgeNode {
            id: node_id.clone(),
            entity_type: cluster.entity_type,
            canonical_name: cluster.canonical_name.clone(),
            normalized_name: cluster.normalized_name.clone(),
            aliases: cluster.aliases.clone(),
            document_count: cluster.document_count() as i64,
            mention_count: cluster.mention_count() as i64,
            edge_count: 0,
            avg_confidence: cluster.avg_confidence,
            importance_score: importance_score(cluster),
            resolution_type: cluster.resolution_type,
            metadata: serde_json::json!({}),
            provenance_id: String::new(),
            created_at: now,
        };

        seeds.push(NodeSeed {
            node_id,
            entity_type: cluster.entity_type,
            canonical_name: cluster.canonical_name.clone(),
            document_ids: cluster.document_ids.clone(),
            extraction_ids: cluster
                .members
                .iter()
                .filter_map(|m| m.extraction_id.clone())
                .collect(),
            chunk_ids: cluster
                .members
                .iter()
                .filter_map(|m| entity_chunks.get(&m.entity_id))
                .flatten()
                .cloned()
                .collect(),
        });

        drafts.push(NodeDraft {
            node,
            links,
            member_entity_ids: cluster.members.iter().map(|m| m.entity_id.clone()).collect(),
            primary_document_provenance_id: primary_provenance,
        });
    }

    let edges = generate_edges(&seeds, options.cluster_hint.as_deref());
    debug!(nodes = drafts.len(), edges = edges.len(), "build computed; persisting");

    let batch = GraphBuildBatch {
        resolution_mode: options.resolution_mode.as_str().to_string(),
        cluster_hint: options.cluster_hint.clone(),
        total_entities: resolution.total_entities,
        nodes: drafts,
        edges,
    };
    let provenance_id = store.apply_graph_build(&batch)?;

    let cross = resolution
        .clusters
        .iter()
        .filter(|c| c.document_count() > 1)
        .count();
    let stats = BuildStats {
        total_entities: resolution.total_entities,
        resolved_nodes: resolution.clusters.len(),
        cross_document_nodes: cross,
        single_document_nodes: resolution.clusters.len() - cross,
        unmatched: resolution.unmatched,
        edges_created: batch.edges.len(),
        provenance_id,
    };
    info!(
        nodes = stats.resolved_nodes,
        edges = stats.edges_created,
        cross_document = stats.cross_document_nodes,
        "knowledge graph built"
    );
    Ok(stats)
}

/// Deterministic blend of confidence, reach, and mention volume
fn importance_score(cluster: &ResolvedCluster) -> f64 {
    let reach = (cluster.document_count() as f64 / 5.0).min(1.0);
    let volume = (cluster.mention_count() as f64 / 10.0).min(1.0);
    let score = 0.5 * cluster.avg_confidence + 0.3 * reach + 0.2 * volume;
    (score.min(1.0) * 10_000.0).round() / 10_000.0
}
