//! Migration pipeline: fresh creation, idempotent reopen, seeded
//! singletons, and fail-loud version handling

use anyhow::Result;
use provstore_storage::{DocumentStore, StorageConfig, SCHEMA_VERSION};

#[test]
fn fresh_database_reaches_current_version() -> Result<()> {
    let store = DocumentStore::in_memory()?;
    assert_eq!(store.schema_version(), SCHEMA_VERSION);
    Ok(())
}

#[test]
fn schema_version_row_is_a_singleton() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("single.db");
    drop(DocumentStore::open_at(&path, &StorageConfig::default()).unwrap());

    let conn = rusqlite::Connection::open(&path).unwrap();
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
        .unwrap();
    assert_eq!(rows, 1);
    let version: i64 = conn
        .query_row("SELECT version FROM schema_version WHERE id = 1", [], |r| r.get(0))
        .unwrap();
    assert_eq!(version, SCHEMA_VERSION);

    // The CHECK forbids a second row.
    assert!(conn
        .execute("INSERT INTO schema_version (id, version) VALUES (2, 1)", [])
        .is_err());
}

#[test]
fn fts_metadata_counters_are_seeded() {
    let store = DocumentStore::in_memory().unwrap();
    let counters = store.fts_counters().unwrap();
    let names: Vec<&str> = counters.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["documents", "chunks", "entities"]);
    assert!(counters.iter().all(|c| c.row_count == 0));
}

#[test]
fn kg_statistics_singleton_is_seeded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stats.db");
    drop(DocumentStore::open_at(&path, &StorageConfig::default()).unwrap());

    let conn = rusqlite::Connection::open(&path).unwrap();
    let (nodes, edges): (i64, i64) = conn
        .query_row(
            "SELECT total_nodes, total_edges FROM kg_statistics WHERE id = 1",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert_eq!((nodes, edges), (0, 0));
}

#[test]
fn check_constraints_are_enforced_at_current_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("checks.db");
    drop(DocumentStore::open_at(&path, &StorageConfig::default()).unwrap());

    let conn = rusqlite::Connection::open(&path).unwrap();
    // provenance.type is a closed set
    assert!(conn
        .execute(
            "INSERT INTO provenance (id, type, source_type, root_document_id, chain_depth, \
                 content_hash, processor, processor_version, created_at) \
             VALUES ('p1', 'NOT_A_TYPE', 'system', 'p1', 0, 'h', 'x', '1', 't')",
            [],
        )
        .is_err());
    // chunks.embedding_status gained its CHECK in a table rebuild
    let chunk_insert = conn.execute(
        "INSERT INTO chunks (id, document_id, ocr_result_id, chunk_index, text, text_hash, \
             char_start, char_end, embedding_status, provenance_id, created_at) \
         VALUES ('c1', 'd1', 'o1', 0, 't', 'h', 0, 1, 'bogus', 'p1', 't')",
        [],
    );
    assert!(chunk_insert.is_err());
}

#[test]
fn reopening_applies_no_further_migrations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reopen.db");
    let config = StorageConfig::default();
    drop(DocumentStore::open_at(&path, &config).unwrap());
    let store = DocumentStore::open_at(&path, &config).unwrap();
    assert_eq!(store.schema_version(), SCHEMA_VERSION);
}
