//! Bounded path finding
//!
//! Breadth-first search over the undirected view of the edge set, bounded
//! by a hop budget and an optional relationship whitelist. Distances are
//! computed from both endpoints; a node can only sit on a shortest path if
//! its two distances sum to the shortest length, which prunes the
//! enumeration to exactly the shortest paths — all of them, not just one.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;
use tracing::debug;

use provstore_core::error::{Result, StoreError};
use provstore_core::types::{KnowledgeEdge, RelationshipType};
use provstore_storage::DocumentStore;

/// Path query options
#[derive(Debug, Clone)]
pub struct PathOptions {
    /// Maximum number of edges in a returned path
    pub max_hops: u32,
    /// Restrict traversal to these relationship types
    pub relationship_filter: Option<Vec<RelationshipType>>,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            max_hops: 3,
            relationship_filter: None,
        }
    }
}

/// One path between the endpoints
#[derive(Debug, Clone, Serialize)]
pub struct GraphPath {
    /// Ordered node ids, source first
    pub node_ids: Vec<String>,
    /// Ordered edge ids bridging consecutive nodes
    pub edge_ids: Vec<String>,
    /// Hop count (`node_ids.len() - 1`)
    pub length: usize,
}

/// Result of a path query
#[derive(Debug, Clone, Serialize)]
pub struct PathResult {
    pub source_node_id: String,
    pub target_node_id: String,
    /// All shortest paths, ascending by length
    pub paths: Vec<GraphPath>,
}

/// Find all shortest paths between two nodes, each given as a node id or
/// an exact canonical name (case-insensitive)
pub fn find_paths(
    store: &DocumentStore,
    source: &str,
    target: &str,
    options: &PathOptions,
) -> Result<PathResult> {
    let source_id = resolve_endpoint(store, source)?
        .ok_or_else(|| StoreError::SourceEntityNotFound(source.to_string()))?;
    let target_id = resolve_endpoint(store, target)?
        .ok_or_else(|| StoreError::TargetEntityNotFound(target.to_string()))?;

    if source_id == target_id {
        return Ok(PathResult {
            source_node_id: source_id,
            target_node_id: target_id,
            paths: Vec::new(),
        });
    }

    let edges = store.all_edges()?;
    let adjacency = build_adjacency(&edges, options.relationship_filter.as_deref());

    let dist_source = bfs_distances(&adjacency, &source_id, options.max_hops);
    let Some(&shortest) = dist_source.get(target_id.as_str()) else {
        return Ok(PathResult {
            source_node_id: source_id,
            target_node_id: target_id,
            paths: Vec::new(),
        });
    };
    let dist_target = bfs_distances(&adjacency, &target_id, options.max_hops);

    let mut paths = Vec::new();
    let mut node_stack = vec![source_id.clone()];
    let mut edge_stack = Vec::new();
    enumerate(
        &adjacency,
        &dist_source,
        &dist_target,
        &source_id,
        &target_id,
        shortest,
        &mut node_stack,
        &mut edge_stack,
        &mut paths,
    );
    paths.sort_by_key(|p| p.length);

    debug!(
        source = %source_id,
        target = %target_id,
        shortest,
        found = paths.len(),
        "path query complete"
    );
    Ok(PathResult {
        source_node_id: source_id,
        target_node_id: target_id,
        paths,
    })
}

fn resolve_endpoint(store: &DocumentStore, name_or_id: &str) -> Result<Option<String>> {
    if let Some(node) = store.get_node(name_or_id)? {
        return Ok(Some(node.id));
    }
    Ok(store.get_node_by_name(name_or_id)?.map(|n| n.id))
}

type Adjacency<'a> = HashMap<&'a str, Vec<(&'a str, &'a str)>>;

/// Undirected adjacency: every edge is traversable both ways. Parallel
/// edges between a pair collapse to the first by insertion order.
fn build_adjacency<'a>(
    edges: &'a [KnowledgeEdge],
    filter: Option<&[RelationshipType]>,
) -> Adjacency<'a> {
    let mut adjacency: Adjacency<'a> = HashMap::new();
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    for edge in edges {
        if let Some(allowed) = filter {
            if !allowed.contains(&edge.relationship_type) {
                continue;
            }
        }
        let s = edge.source_node_id.as_str();
        let t = edge.target_node_id.as_str();
        if seen.insert((s, t)) {
            adjacency.entry(s).or_default().push((t, edge.id.as_str()));
        }
        if seen.insert((t, s)) {
            adjacency.entry(t).or_default().push((s, edge.id.as_str()));
        }
    }
    adjacency
}

/// Hop distances from `start`, bounded by `max_hops`; unreached nodes are
/// absent
fn bfs_distances<'a>(
    adjacency: &Adjacency<'a>,
    start: &str,
    max_hops: u32,
) -> HashMap<&'a str, usize> {
    let mut distances: HashMap<&'a str, usize> = HashMap::new();
    let mut queue: VecDeque<(&str, usize)> = VecDeque::new();

    // The start key must come from the adjacency arena to live long
    // enough; a node with no edges simply has no entry.
    let Some((&start_key, _)) = adjacency.get_key_value(start) else {
        return distances;
    };
    distances.insert(start_key, 0);
    queue.push_back((start_key, 0));

    while let Some((node, depth)) = queue.pop_front() {
        if depth as u32 >= max_hops {
            continue;
        }
        if let Some(neighbors) = adjacency.get(node) {
            for &(next, _) in neighbors {
                if !distances.contains_key(next) {
                    distances.insert(next, depth + 1);
                    queue.push_back((next, depth + 1));
                }
            }
        }
    }
    distances
}

/// Depth-first walk restricted to nodes on some shortest path:
/// `dist_source(v) + dist_target(v) == shortest` for every kept node.
#[allow(clippy::too_many_arguments)]
fn enumerate(
    adjacency: &Adjacency<'_>,
    dist_source: &HashMap<&str, usize>,
    dist_target: &HashMap<&str, usize>,
    current: &str,
    target: &str,
    shortest: usize,
    node_stack: &mut Vec<String>,
    edge_stack: &mut Vec<String>,
    paths: &mut Vec<GraphPath>,
) {
    if current == target {
        paths.push(GraphPath {
            node_ids: node_stack.clone(),
            edge_ids: edge_stack.clone(),
            length: edge_stack.len(),
        });
        return;
    }

    let depth = edge_stack.len();
    let Some(neighbors) = adjacency.get(current) else {
        return;
    };
    for &(next, edge_id) in neighbors {
        let on_shortest = dist_source.get(next) == Some(&(depth + 1))
            && dist_target
                .get(next)
                .is_some_and(|d| depth + 1 + d == shortest);
        if !on_shortest {
            continue;
        }
        node_stack.push(next.to_string());
        edge_stack.push(edge_id.to_string());
        enumerate(
            adjacency,
            dist_source,
            dist_target,
            next,
            target,
            shortest,
            node_stack,
            edge_stack,
            paths,
        );
        node_stack.pop();
        edge_stack.pop();
    }
}
