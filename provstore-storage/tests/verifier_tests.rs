//! Forensic verification: chain walks, database scans, tamper detection

mod common;

use std::io::Write;

use common::seed_document_chain;
use provstore_storage::{DocumentStore, StorageConfig};

#[test]
fn intact_chain_verifies_end_to_end() {
    let store = DocumentStore::in_memory().unwrap();
    let fixture = seed_document_chain(&store, "clean");

    // Leaf embedding back to the document root.
    let embedding = store.get_embedding(&fixture.embedding_ids[0]).unwrap().unwrap();
    let report = store.verify_chain(&embedding.provenance_id).unwrap();
    assert!(report.valid, "failures: {:?}", report.results);
    assert_eq!(report.hashes_checked, 4); // embedding, chunk, ocr, document
    assert_eq!(report.hashes_failed, 0);

    let db_report = store.verify_database().unwrap();
    assert!(db_report.valid);
    assert_eq!(db_report.hashes_failed, 0);
    assert!(db_report.hashes_checked >= 6);
}

#[test]
fn tampered_hash_is_reported_not_thrown() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tamper.db");
    let config = StorageConfig::default();

    let ocr_provenance_id;
    {
        let store = DocumentStore::open_at(&path, &config).unwrap();
        let fixture = seed_document_chain(&store, "tampered");
        let ocr = store.get_ocr_result(&fixture.ocr_id).unwrap().unwrap();
        ocr_provenance_id = ocr.provenance_id;
    }

    // Overwrite the OCR provenance hash with a well-formed but wrong value.
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute(
            "UPDATE provenance SET content_hash = ?1 WHERE id = ?2",
            rusqlite::params![format!("sha256:{}", "ab".repeat(32)), ocr_provenance_id],
        )
        .unwrap();
    }

    let store = DocumentStore::open_at(&path, &config).unwrap();
    let check = store.verify_content_hash(&ocr_provenance_id).unwrap();
    assert!(check.format_valid);
    assert!(!check.valid);
    assert_ne!(check.computed.as_deref(), Some(check.expected.as_str()));

    let report = store.verify_database().unwrap();
    assert!(!report.valid);
    assert!(report.hashes_failed >= 1);
    assert_eq!(report.format_failures, 0);
}

#[test]
fn malformed_hash_fails_format_check() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("format.db");
    let config = StorageConfig::default();

    let chunk_provenance_id;
    {
        let store = DocumentStore::open_at(&path, &config).unwrap();
        let fixture = seed_document_chain(&store, "malformed");
        chunk_provenance_id = fixture.chunk_provenance_ids[0].clone();
    }
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute(
            "UPDATE provenance SET content_hash = 'md5:nonsense' WHERE id = ?1",
            [&chunk_provenance_id],
        )
        .unwrap();
    }

    let store = DocumentStore::open_at(&path, &config).unwrap();
    let check = store.verify_content_hash(&chunk_provenance_id).unwrap();
    assert!(!check.format_valid);
    assert!(!check.valid);
}

#[test]
fn missing_provenance_is_an_error() {
    let store = DocumentStore::in_memory().unwrap();
    assert!(store.verify_content_hash("missing").is_err());
}

#[test]
fn file_integrity_rehashes_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = DocumentStore::in_memory().unwrap();

    // A document whose file really exists on disk.
    let file_path = dir.path().join("real.txt");
    let mut file = std::fs::File::create(&file_path).unwrap();
    file.write_all(b"original contents").unwrap();
    drop(file);

    let file_hash = provstore_core::hash::compute_file_hash(&file_path).unwrap();
    let provenance = store
        .create_provenance(
            &provstore_core::types::ProvenanceSpec::new(
                provstore_core::types::ProvenanceType::Document,
                provstore_core::types::SourceType::FileUpload,
                file_hash.clone(),
                "ingest",
            )
            .with_file_hash(file_hash.clone()),
        )
        .unwrap();
    let document_id = store
        .insert_document(&provstore_core::types::NewDocument {
            file_path: file_path.to_string_lossy().into_owned(),
            file_name: "real.txt".to_string(),
            file_hash,
            file_size: 17,
            file_type: "txt".to_string(),
            page_count: None,
            provenance_id: provenance.id,
            title: None,
            author: None,
            subject: None,
        })
        .unwrap();

    let intact = store.verify_file_integrity(&document_id).unwrap();
    assert!(intact.valid);

    // Modify the file behind the store's back.
    std::fs::write(&file_path, b"tampered contents").unwrap();
    let tampered = store.verify_file_integrity(&document_id).unwrap();
    assert!(!tampered.valid);
    assert_ne!(tampered.computed, tampered.stored);
}
