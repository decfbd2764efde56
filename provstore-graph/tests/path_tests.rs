//! Bounded all-shortest-path search over a built graph

mod common;

use common::seed_doc_with_entities;
use provstore_core::prelude::*;
use provstore_core::ErrorCategory;
use provstore_graph::{build_graph, find_paths, BuildOptions, PathOptions};
use provstore_storage::DocumentStore;

/// Chain A - B - C - D with a spur B - E, built from document co-mentions:
/// each document contributes one adjacent pair.
fn chain_store() -> DocumentStore {
    let store = DocumentStore::in_memory().unwrap();
    let pairs: &[(&str, &str, &str)] = &[
        ("d1", "Alice Anders", "Bob Brown"),
        ("d2", "Bob Brown", "Carol Cruz"),
        ("d3", "Carol Cruz", "Dan Drake"),
        ("d4", "Bob Brown", "Eve Ellis"),
    ];
    for (tag, left, right) in pairs {
        seed_doc_with_entities(
            &store,
            tag,
            &[
                (left, EntityType::Person, 0.9),
                (right, EntityType::Person, 0.9),
            ],
        );
    }
    build_graph(&store, &BuildOptions::default()).unwrap();
    store
}

#[test]
fn hop_budget_bounds_the_search() {
    let store = chain_store();

    let none = find_paths(
        &store,
        "Alice Anders",
        "Dan Drake",
        &PathOptions {
            max_hops: 1,
            relationship_filter: None,
        },
    )
    .unwrap();
    assert!(none.paths.is_empty());

    let found = find_paths(&store, "Alice Anders", "Dan Drake", &PathOptions::default()).unwrap();
    assert_eq!(found.paths.len(), 1);
    let path = &found.paths[0];
    assert_eq!(path.length, 3);
    assert_eq!(path.node_ids.len(), 4);
    assert_eq!(path.edge_ids.len(), 3);

    // The path runs A -> B -> C -> D by canonical name.
    let names: Vec<String> = path
        .node_ids
        .iter()
        .map(|id| store.get_node(id).unwrap().unwrap().canonical_name)
        .collect();
    assert_eq!(names, ["Alice Anders", "Bob Brown", "Carol Cruz", "Dan Drake"]);
}

#[test]
fn relationship_filter_restricts_traversal() {
    let store = chain_store();

    // The chain is built from co-mentions, so a co_mentioned whitelist
    // still reaches the target; the spur through E is never needed.
    let found = find_paths(
        &store,
        "Alice Anders",
        "Dan Drake",
        &PathOptions {
            max_hops: 3,
            relationship_filter: Some(vec![RelationshipType::CoMentioned]),
        },
    )
    .unwrap();
    assert_eq!(found.paths.len(), 1);

    // A whitelist matching no edges finds nothing.
    let none = find_paths(
        &store,
        "Alice Anders",
        "Dan Drake",
        &PathOptions {
            max_hops: 3,
            relationship_filter: Some(vec![RelationshipType::WorksAt]),
        },
    )
    .unwrap();
    assert!(none.paths.is_empty());
}

#[test]
fn all_shortest_paths_are_returned() {
    // Diamond: S - X - T and S - Y - T, two distinct two-hop routes.
    let store = DocumentStore::in_memory().unwrap();
    for (tag, left, right) in [
        ("d1", "Start Node", "Mid One"),
        ("d2", "Mid One", "End Node"),
        ("d3", "Start Node", "Mid Two"),
        ("d4", "Mid Two", "End Node"),
    ] {
        seed_doc_with_entities(
            &store,
            tag,
            &[
                (left, EntityType::Person, 0.9),
                (right, EntityType::Person, 0.9),
            ],
        );
    }
    build_graph(&store, &BuildOptions::default()).unwrap();

    let found = find_paths(&store, "Start Node", "End Node", &PathOptions::default()).unwrap();
    assert_eq!(found.paths.len(), 2);
    assert!(found.paths.iter().all(|p| p.length == 2));

    // Every consecutive pair is bridged by the edge reported for it.
    for path in &found.paths {
        for (i, edge_id) in path.edge_ids.iter().enumerate() {
            let edge = store
                .all_edges()
                .unwrap()
                .into_iter()
                .find(|e| &e.id == edge_id)
                .unwrap();
            let (a, b) = (&path.node_ids[i], &path.node_ids[i + 1]);
            let bridges = (&edge.source_node_id == a && &edge.target_node_id == b)
                || (&edge.source_node_id == b && &edge.target_node_id == a);
            assert!(bridges);
        }
    }
}

#[test]
fn identical_endpoints_yield_no_paths() {
    let store = chain_store();
    let result = find_paths(&store, "Bob Brown", "Bob Brown", &PathOptions::default()).unwrap();
    assert!(result.paths.is_empty());
}

#[test]
fn unknown_endpoints_are_distinct_errors() {
    let store = chain_store();
    let err = find_paths(&store, "Nobody", "Dan Drake", &PathOptions::default()).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::SourceEntityNotFound);

    let err = find_paths(&store, "Alice Anders", "Nobody", &PathOptions::default()).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::TargetEntityNotFound);
}

#[test]
fn endpoints_resolve_by_id_or_name() {
    let store = chain_store();
    let alice = store.get_node_by_name("Alice Anders").unwrap().unwrap();
    let dan = store.get_node_by_name("dan drake").unwrap().unwrap();

    let by_id = find_paths(&store, &alice.id, &dan.id, &PathOptions::default()).unwrap();
    assert_eq!(by_id.paths.len(), 1);
    assert_eq!(by_id.source_node_id, alice.id);
    assert_eq!(by_id.target_node_id, dan.id);
}
