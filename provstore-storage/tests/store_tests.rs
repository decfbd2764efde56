//! Data-access contracts: constraint mapping, pagination bounds, lookups,
//! and full-text search

mod common;

use common::seed_document_chain;
use provstore_core::prelude::*;
use provstore_core::ErrorCategory;
use provstore_storage::DocumentStore;

fn store() -> DocumentStore {
    DocumentStore::in_memory().unwrap()
}

#[test]
fn foreign_key_violations_name_the_reference() {
    let store = store();
    let err = store
        .insert_document(&NewDocument {
            file_path: "/tmp/orphan.pdf".to_string(),
            file_name: "orphan.pdf".to_string(),
            file_hash: compute_hash("orphan"),
            file_size: 10,
            file_type: "pdf".to_string(),
            page_count: None,
            provenance_id: "missing-provenance".to_string(),
            title: None,
            author: None,
            subject: None,
        })
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::ForeignKeyViolation);
    assert!(err.to_string().contains("documents.provenance_id"));
}

#[test]
fn duplicate_provenance_reference_is_a_unique_violation() {
    let store = store();
    let fixture = seed_document_chain(&store, "first");
    let err = store
        .insert_document(&NewDocument {
            file_path: "/tmp/dup.pdf".to_string(),
            file_name: "dup.pdf".to_string(),
            file_hash: compute_hash("dup"),
            file_size: 10,
            file_type: "pdf".to_string(),
            page_count: None,
            provenance_id: fixture.document_provenance_id,
            title: None,
            author: None,
            subject: None,
        })
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::UniqueViolation);
}

#[test]
fn secondary_key_lookups_return_options() {
    let store = store();
    let fixture = seed_document_chain(&store, "lookup");
    let document = store.get_document(&fixture.document_id).unwrap().unwrap();

    assert!(store
        .get_document_by_path(&document.file_path)
        .unwrap()
        .is_some());
    assert!(store
        .get_document_by_hash(&document.file_hash)
        .unwrap()
        .is_some());
    assert!(store.get_document_by_path("/nowhere").unwrap().is_none());
    assert!(store.get_document("missing").unwrap().is_none());
}

#[test]
fn listing_filters_by_status_and_bounds_pagination() {
    let store = store();
    for tag in ["one", "two", "three"] {
        seed_document_chain(&store, tag);
    }
    store
        .update_document_status(
            &store.list_documents(&ListOptions::default()).unwrap()[0].id,
            DocumentStatus::Failed,
            Some("ocr timeout"),
        )
        .unwrap();

    let failed = store
        .list_documents(&ListOptions {
            status: Some("failed".to_string()),
            ..ListOptions::default()
        })
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].error_message.as_deref(), Some("ocr timeout"));

    // offset without limit still returns (bounded default applies)
    let offset_only = store
        .list_documents(&ListOptions {
            offset: Some(1),
            ..ListOptions::default()
        })
        .unwrap();
    assert_eq!(offset_only.len(), 2);

    let paged = store
        .list_documents(&ListOptions {
            limit: Some(1),
            offset: Some(1),
            ..ListOptions::default()
        })
        .unwrap();
    assert_eq!(paged.len(), 1);
}

#[test]
fn updates_on_missing_rows_fail_with_not_found() {
    let store = store();
    let err = store
        .update_document_status("missing", DocumentStatus::Complete, None)
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::DocumentNotFound);

    let err = store
        .update_chunk_embedding_status("missing", EmbeddingStatus::Complete)
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::ChunkNotFound);
}

#[test]
fn ocr_completion_marks_the_document_complete() {
    let store = store();
    let fixture = seed_document_chain(&store, "ocr-done");
    store
        .update_document_ocr_complete(&fixture.document_id, 12)
        .unwrap();
    let document = store.get_document(&fixture.document_id).unwrap().unwrap();
    assert_eq!(document.status, DocumentStatus::Complete);
    assert_eq!(document.page_count, Some(12));
    assert!(document.error_message.is_none());
}

#[test]
fn embeddings_require_exactly_one_source() {
    let store = store();
    let fixture = seed_document_chain(&store, "sources");
    let existing = store
        .get_embedding(&fixture.embedding_ids[0])
        .unwrap()
        .unwrap();

    let mut no_source = existing.clone();
    no_source.id = new_id();
    no_source.provenance_id = fixture.document_provenance_id.clone();
    no_source.chunk_id = None;
    let err = store.insert_embedding(&no_source).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::CheckConstraintViolation);

    let mut two_sources = existing;
    two_sources.id = new_id();
    two_sources.image_id = Some(fixture.image_id.clone());
    let err = store.insert_embedding(&two_sources).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::CheckConstraintViolation);
}

#[test]
fn chunk_search_hits_indexed_text() {
    let store = store();
    seed_document_chain(&store, "searchable");

    let hits = store.search_chunks("searchable", 10).unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.text.contains("searchable")));

    assert!(store.search_chunks("absent-token", 10).unwrap().is_empty());
    // FTS operators in user input are neutralized by escaping.
    assert!(store.search_chunks("\"unbalanced", 10).unwrap().is_empty());
}

#[test]
fn knn_is_filterable_by_document() {
    let store = store();
    let first = seed_document_chain(&store, "first");
    let second = seed_document_chain(&store, "second");

    let query = common::test_vector(0);
    let unfiltered = store.knn(&query, 10, None).unwrap();
    assert_eq!(unfiltered.len(), 4);

    let filtered = store.knn(&query, 10, Some(second.document_id.as_str())).unwrap();
    assert_eq!(filtered.len(), 2);
    assert!(filtered
        .iter()
        .all(|m| !first.embedding_ids.contains(&m.embedding_id)));
}

#[test]
fn document_summary_counts_every_artifact() {
    let store = store();
    let fixture = seed_document_chain(&store, "summary");
    let summary = store
        .document_summary(&fixture.document_id)
        .unwrap()
        .unwrap();
    assert_eq!(summary.ocr_results, 1);
    assert_eq!(summary.chunks, 2);
    assert_eq!(summary.embeddings, 2);
    assert_eq!(summary.images, 1);
    assert_eq!(summary.entities, 3);
    assert_eq!(summary.extractions, 0);
    assert!(store.document_summary("missing").unwrap().is_none());
}

#[test]
fn cluster_assignment_requires_assigned_at() {
    let store = store();
    let fixture = seed_document_chain(&store, "clustered");
    let err = store
        .assign_document_cluster(&DocumentClusterAssignment {
            id: new_id(),
            document_id: fixture.document_id,
            cluster_id: None,
            similarity_to_centroid: 0.8,
            assigned_at: String::new(),
        })
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::CheckConstraintViolation);
}
