//! Graph building end to end: preconditions, fuzzy resolution, the
//! per-type cap, temporal inference, and rebuild semantics

mod common;

use common::seed_doc_with_entities;
use provstore_core::prelude::*;
use provstore_core::{ErrorCategory, StoreError};
use provstore_graph::{build_graph, graph_stats, BuildOptions, ResolutionMode};
use provstore_storage::{DocumentStore, NodeFilter};

fn store() -> DocumentStore {
    DocumentStore::in_memory().unwrap()
}

fn fuzzy() -> BuildOptions {
    BuildOptions {
        resolution_mode: ResolutionMode::Fuzzy,
        rebuild: false,
        cluster_hint: None,
    }
}

#[test]
fn empty_store_refuses_to_build() {
    let store = store();
    let err = build_graph(&store, &BuildOptions::default()).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::NoEntitiesFound);
}

#[test]
fn second_build_requires_rebuild_flag() {
    let store = store();
    seed_doc_with_entities(&store, "d1", &[("John Smith", EntityType::Person, 0.9)]);

    build_graph(&store, &BuildOptions::default()).unwrap();
    let err = build_graph(&store, &BuildOptions::default()).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::GraphAlreadyExists);

    let stats = build_graph(
        &store,
        &BuildOptions {
            rebuild: true,
            ..BuildOptions::default()
        },
    )
    .unwrap();
    assert_eq!(stats.resolved_nodes, 1);
}

#[test]
fn fuzzy_resolution_merges_name_variants() {
    let store = store();
    seed_doc_with_entities(&store, "d1", &[("John Smith", EntityType::Person, 0.95)]);
    seed_doc_with_entities(&store, "d2", &[("John D. Smith", EntityType::Person, 0.91)]);
    seed_doc_with_entities(&store, "d3", &[("J. Smith", EntityType::Person, 0.80)]);

    let stats = build_graph(&store, &fuzzy()).unwrap();
    assert_eq!(stats.total_entities, 3);
    assert_eq!(stats.resolved_nodes, 1);
    assert_eq!(stats.cross_document_nodes, 1);

    let nodes = store.list_nodes(&NodeFilter::default()).unwrap();
    assert_eq!(nodes.len(), 1);
    let node = &nodes[0];
    assert_eq!(node.canonical_name, "John Smith");
    assert_eq!(node.document_count, 3);
    assert_eq!(node.mention_count, 3);
    assert!(node.aliases.contains(&"J. Smith".to_string()));
    assert!(node.aliases.contains(&"John D. Smith".to_string()));

    // Three links, each to a different document.
    let links = store.links_for_node(&node.id).unwrap();
    assert_eq!(links.len(), 3);
    let docs: std::collections::HashSet<&str> =
        links.iter().map(|l| l.document_id.as_str()).collect();
    assert_eq!(docs.len(), 3);
}

#[test]
fn location_containment_merges() {
    let store = store();
    seed_doc_with_entities(&store, "d1", &[("New York City", EntityType::Location, 0.92)]);
    seed_doc_with_entities(&store, "d2", &[("New York", EntityType::Location, 0.90)]);

    let stats = build_graph(&store, &fuzzy()).unwrap();
    assert_eq!(stats.resolved_nodes, 1);

    let node = &store.list_nodes(&NodeFilter::default()).unwrap()[0];
    assert_eq!(node.document_count, 2);
    assert_eq!(node.resolution_type, ResolutionMethod::Containment);
}

#[test]
fn exact_mode_keeps_variants_apart() {
    let store = store();
    seed_doc_with_entities(&store, "d1", &[("John Smith", EntityType::Person, 0.95)]);
    seed_doc_with_entities(&store, "d2", &[("J. Smith", EntityType::Person, 0.80)]);

    let stats = build_graph(&store, &BuildOptions::default()).unwrap();
    assert_eq!(stats.resolved_nodes, 2);
    assert_eq!(stats.single_document_nodes, 2);
}

#[test]
fn fuzzy_cap_fails_loud() {
    let store = store();
    let entities: Vec<(String, EntityType, f64)> = (0..5001)
        .map(|i| (format!("Person Number {i:04}"), EntityType::Person, 0.9))
        .collect();
    let borrowed: Vec<(&str, EntityType, f64)> = entities
        .iter()
        .map(|(name, et, conf)| (name.as_str(), *et, *conf))
        .collect();
    seed_doc_with_entities(&store, "big", &borrowed);

    let err = build_graph(&store, &fuzzy()).unwrap_err();
    match err {
        StoreError::TooManyEntities { count, cap, entity_type } => {
            assert_eq!(count, 5001);
            assert_eq!(cap, 5000);
            assert_eq!(entity_type, "person");
        }
        other => panic!("expected TooManyEntities, got {other}"),
    }
    // Nothing was persisted.
    assert!(store.list_nodes(&NodeFilter::default()).unwrap().is_empty());
}

#[test]
fn every_entity_gets_exactly_one_link() {
    let store = store();
    seed_doc_with_entities(
        &store,
        "d1",
        &[
            ("John Smith", EntityType::Person, 0.9),
            ("Acme Corp", EntityType::Organization, 0.85),
            ("2024-03-15", EntityType::Date, 0.99),
        ],
    );
    seed_doc_with_entities(
        &store,
        "d2",
        &[
            ("John Smith", EntityType::Person, 0.8),
            ("asthma", EntityType::Diagnosis, 0.9),
        ],
    );

    build_graph(&store, &fuzzy()).unwrap();

    let links = store.all_links().unwrap();
    assert_eq!(links.len(), 5);
    let mut entity_ids: Vec<&str> = links.iter().map(|l| l.entity_id.as_str()).collect();
    entity_ids.sort_unstable();
    entity_ids.dedup();
    assert_eq!(entity_ids.len(), 5);
}

#[test]
fn edge_weights_stay_in_range_and_dates_are_inferred() {
    let store = store();
    seed_doc_with_entities(
        &store,
        "d1",
        &[
            ("24-cv-1001", EntityType::CaseNumber, 0.95),
            ("2024-03-15", EntityType::Date, 0.99),
            ("John Smith", EntityType::Person, 0.9),
            ("Acme Corp", EntityType::Organization, 0.85),
        ],
    );

    build_graph(&store, &BuildOptions::default()).unwrap();

    let edges = store.all_edges().unwrap();
    assert!(!edges.is_empty());
    assert!(edges.iter().all(|e| e.weight > 0.0 && e.weight <= 1.0));

    let occurred: Vec<_> = edges
        .iter()
        .filter(|e| e.relationship_type == RelationshipType::OccurredAt)
        .collect();
    assert!(!occurred.is_empty());
    for edge in occurred {
        assert_eq!(edge.valid_from.as_deref(), Some("2024-03-15"));
        assert_eq!(edge.valid_until.as_deref(), Some("2024-03-15"));
    }

    // works_at is oriented person -> organization
    let person = store.get_node_by_name("John Smith").unwrap().unwrap();
    let org = store.get_node_by_name("Acme Corp").unwrap().unwrap();
    let works = store
        .all_edges()
        .unwrap()
        .into_iter()
        .find(|e| e.relationship_type == RelationshipType::WorksAt)
        .unwrap();
    assert_eq!(works.source_node_id, person.id);
    assert_eq!(works.target_node_id, org.id);
}

#[test]
fn stats_reflect_the_built_graph() {
    let store = store();
    seed_doc_with_entities(
        &store,
        "d1",
        &[
            ("John Smith", EntityType::Person, 0.9),
            ("Acme Corp", EntityType::Organization, 0.85),
        ],
    );
    seed_doc_with_entities(&store, "d2", &[("John Smith", EntityType::Person, 0.7)]);

    build_graph(&store, &BuildOptions::default()).unwrap();
    let stats = graph_stats(&store).unwrap();

    assert_eq!(stats.total_nodes, 2);
    assert_eq!(stats.cross_document_nodes, 1);
    assert_eq!(stats.single_document_nodes, 1);
    assert_eq!(stats.documents_covered, 2);
    assert_eq!(stats.nodes_by_type["person"], 1);
    assert_eq!(stats.nodes_by_type["organization"], 1);
    assert!((stats.avg_edges_per_node
        - 2.0 * stats.total_edges as f64 / stats.total_nodes as f64)
        .abs()
        < 1e-9);
    assert!(!stats.most_connected_nodes.is_empty());

    // Node counters match the persisted edge set.
    for node in store.list_nodes(&NodeFilter::default()).unwrap() {
        let incident = store.edges_for_node(&node.id).unwrap().len() as i64;
        assert_eq!(node.edge_count, incident);
    }
}

#[test]
fn node_listing_filters_combine() {
    let store = store();
    seed_doc_with_entities(
        &store,
        "d1",
        &[
            ("John Smith", EntityType::Person, 0.9),
            ("Jane Smithers", EntityType::Person, 0.8),
            ("Acme Corp", EntityType::Organization, 0.85),
        ],
    );
    build_graph(&store, &BuildOptions::default()).unwrap();

    let listing = provstore_graph::list_nodes(
        &store,
        &provstore_graph::NodeQuery {
            entity_type: Some(EntityType::Person),
            entity_name: Some("smith".to_string()),
            include_edges: true,
            ..provstore_graph::NodeQuery::default()
        },
    )
    .unwrap();
    assert_eq!(listing.nodes.len(), 2);
    // Both endpoints of every returned edge are in the node set.
    let ids: std::collections::HashSet<&str> =
        listing.nodes.iter().map(|n| n.id.as_str()).collect();
    assert!(listing
        .edges
        .iter()
        .all(|e| ids.contains(e.source_node_id.as_str())
            && ids.contains(e.target_node_id.as_str())));
}
