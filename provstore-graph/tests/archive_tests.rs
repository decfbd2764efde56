//! Pre-destruction archives of a document's knowledge subgraph

mod common;

use common::seed_doc_with_entities;
use provstore_core::prelude::*;
use provstore_graph::{build_graph, delete_document_archived, ArchiveWriter, BuildOptions};
use provstore_storage::DocumentStore;

#[test]
fn deletion_writes_an_archive_first() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = DocumentStore::in_memory()?;

    let doomed = seed_doc_with_entities(
        &store,
        "doomed",
        &[
            ("John Smith", EntityType::Person, 0.9),
            ("Acme Corp", EntityType::Organization, 0.85),
        ],
    );
    build_graph(&store, &BuildOptions::default()).unwrap();

    let writer = ArchiveWriter::new(dir.path()).unwrap();
    let path = delete_document_archived(&store, &writer, &doomed.document_id)
        .unwrap()
        .expect("archive should be written");

    let file_name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(file_name.starts_with(&format!("kg-archive-{}-", doomed.document_id)));
    assert!(file_name.ends_with(".json"));

    let payload: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(payload["document_id"], doomed.document_id.as_str());
    assert_eq!(payload["nodes"].as_array().unwrap().len(), 2);
    assert_eq!(payload["entities"].as_array().unwrap().len(), 2);
    assert!(payload["edges"].is_array());
    assert_eq!(payload["links"].as_array().unwrap().len(), 2);

    // The document really is gone afterwards.
    assert!(store.get_document(&doomed.document_id)?.is_none());
    Ok(())
}

#[test]
fn documents_without_linked_nodes_skip_the_archive() {
    let dir = tempfile::tempdir().unwrap();
    let store = DocumentStore::in_memory().unwrap();

    // Entities exist but no graph has been built, so nothing links to the
    // document.
    let fixture = seed_doc_with_entities(
        &store,
        "plain",
        &[("John Smith", EntityType::Person, 0.9)],
    );

    let writer = ArchiveWriter::new(dir.path()).unwrap();
    let written = delete_document_archived(&store, &writer, &fixture.document_id).unwrap();
    assert!(written.is_none());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    assert!(store.get_document(&fixture.document_id).unwrap().is_none());
}

#[test]
fn archive_failure_aborts_the_deletion() {
    let store = DocumentStore::in_memory().unwrap();
    let fixture = seed_doc_with_entities(
        &store,
        "kept",
        &[("John Smith", EntityType::Person, 0.9)],
    );
    build_graph(&store, &BuildOptions::default()).unwrap();

    let err = store
        .delete_document_with(&fixture.document_id, |_| {
            Err(provstore_core::StoreError::Storage("disk full".to_string()))
        })
        .unwrap_err();
    assert!(err.to_string().contains("disk full"));

    // Nothing was deleted.
    assert!(store.get_document(&fixture.document_id).unwrap().is_some());
    assert_eq!(store.all_links().unwrap().len(), 1);
}
