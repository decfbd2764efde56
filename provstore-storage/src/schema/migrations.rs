//! Forward migration pipeline
//!
//! A linear chain of numbered migrations takes any database from its stored
//! version to [`SCHEMA_VERSION`]. Each step runs in its own transaction
//! with foreign-key enforcement suspended and `pragma_foreign_key_check`
//! run before commit, so a half-applied step can never be observed.
//!
//! SQLite cannot add a CHECK constraint to an existing table, so steps that
//! tighten constraints recreate the table: copy rows to a temporary, drop,
//! recreate with the new shape, copy back, rebuild the table's indexes and
//! any FTS companions.

use rusqlite::Connection;
use tracing::{debug, info};

use provstore_core::error::{Result, StoreError};

use crate::schema::current_version;
use crate::sqlutil::map_sql_err;

/// Version produced by the full migration chain
pub const SCHEMA_VERSION: i64 = 18;

struct Migration {
    version: i64,
    name: &'static str,
    apply: fn(&Connection) -> rusqlite::Result<()>,
}

const MIGRATIONS: &[Migration] = &[
    Migration { version: 1, name: "baseline", apply: migrate_v1 },
    Migration { version: 2, name: "vector-table", apply: migrate_v2 },
    Migration { version: 3, name: "images", apply: migrate_v3 },
    Migration { version: 4, name: "extractions-and-embedding-source-check", apply: migrate_v4 },
    Migration { version: 5, name: "entities", apply: migrate_v5 },
    Migration { version: 6, name: "clusters", apply: migrate_v6 },
    Migration { version: 7, name: "comparisons", apply: migrate_v7 },
    Migration { version: 8, name: "chunk-fts", apply: migrate_v8 },
    Migration { version: 9, name: "form-fills-and-uploads", apply: migrate_v9 },
    Migration { version: 10, name: "knowledge-graph", apply: migrate_v10 },
    Migration { version: 11, name: "extraction-segments", apply: migrate_v11 },
    Migration { version: 12, name: "provenance-type-expansion", apply: migrate_v12 },
    Migration { version: 13, name: "entity-embeddings", apply: migrate_v13 },
    Migration { version: 14, name: "edge-temporal-columns", apply: migrate_v14 },
    Migration { version: 15, name: "cluster-assignment-not-null", apply: migrate_v15 },
    Migration { version: 16, name: "chunk-embedding-status-check", apply: migrate_v16 },
    Migration { version: 17, name: "graph-statistics", apply: migrate_v17 },
    Migration { version: 18, name: "node-provenance-fk", apply: migrate_v18 },
];

/// Bring the database to [`SCHEMA_VERSION`], applying pending migrations in
/// order. Refuses to touch a database whose stored version is newer than
/// this build supports.
pub(crate) fn ensure_schema(conn: &mut Connection) -> Result<i64> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
             id INTEGER PRIMARY KEY CHECK (id = 1),
             version INTEGER NOT NULL
         );
         INSERT OR IGNORE INTO schema_version (id, version) VALUES (1, 0);",
    )
    .map_err(|e| map_sql_err("initialize schema_version", e))?;

    let stored = current_version(conn)?;
    if stored > SCHEMA_VERSION {
        return Err(StoreError::VersionTooNew {
            found: stored,
            supported: SCHEMA_VERSION,
        });
    }
    if stored == SCHEMA_VERSION {
        debug!(version = stored, "schema already current");
        return Ok(stored);
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > stored) {
        apply_migration(conn, migration)?;
    }
    info!(from = stored, to = SCHEMA_VERSION, "schema migrated");
    Ok(SCHEMA_VERSION)
}

fn apply_migration(conn: &mut Connection, migration: &Migration) -> Result<()> {
    debug!(version = migration.version, name = migration.name, "applying migration");

    conn.pragma_update(None, "foreign_keys", "OFF")
        .map_err(|e| map_sql_err("suspend foreign_keys", e))?;

    let outcome = (|| -> Result<()> {
        let tx = conn
            .transaction()
            .map_err(|e| map_sql_err("begin migration transaction", e))?;

        (migration.apply)(&tx).map_err(|e| StoreError::MigrationFailed {
            operation: migration.name.to_string(),
            table_name: None,
            cause: e.to_string(),
        })?;

        let violations: i64 = tx
            .query_row("SELECT COUNT(*) FROM pragma_foreign_key_check", [], |r| {
                r.get(0)
            })
            .map_err(|e| map_sql_err("foreign_key_check", e))?;
        if violations > 0 {
            return Err(StoreError::MigrationFailed {
                operation: migration.name.to_string(),
                table_name: None,
                cause: format!("{violations} foreign key violations after step"),
            });
        }

        tx.execute(
            "UPDATE schema_version SET version = ?1 WHERE id = 1",
            [migration.version],
        )
        .map_err(|e| map_sql_err("record schema version", e))?;

        tx.commit()
            .map_err(|e| map_sql_err("commit migration", e))
    })();

    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(|e| map_sql_err("restore foreign_keys", e))?;

    outcome
}

/// Recreate `table` with a new shape: copy rows to a temporary, drop,
/// recreate, copy back through `copy_select`, drop the temporary, and
/// rebuild the table's indexes.
fn recreate_table(
    conn: &Connection,
    table: &str,
    create_sql: &str,
    insert_columns: &str,
    copy_select: &str,
    indexes: &[&str],
) -> rusqlite::Result<()> {
    let tmp = format!("{table}_migration_tmp");
    conn.execute_batch(&format!("CREATE TABLE {tmp} AS SELECT * FROM {table};"))?;
    conn.execute_batch(&format!("DROP TABLE {table};"))?;
    conn.execute_batch(create_sql)?;
    conn.execute(
        &format!("INSERT INTO {table} ({insert_columns}) SELECT {copy_select} FROM {tmp}"),
        [],
    )?;
    conn.execute_batch(&format!("DROP TABLE {tmp};"))?;
    for index in indexes {
        conn.execute_batch(index)?;
    }
    Ok(())
}

const EMBEDDING_INDEXES: &[&str] = &[
    "CREATE INDEX idx_embeddings_document ON embeddings (document_id);",
    "CREATE INDEX idx_embeddings_chunk ON embeddings (chunk_id);",
];

const CHUNK_INDEXES: &[&str] = &[
    "CREATE INDEX idx_chunks_document ON chunks (document_id);",
    "CREATE INDEX idx_chunks_ocr_result ON chunks (ocr_result_id);",
];

const PROVENANCE_INDEXES: &[&str] = &[
    "CREATE INDEX idx_provenance_root_document ON provenance (root_document_id);",
    "CREATE INDEX idx_provenance_parent ON provenance (parent_id);",
    "CREATE INDEX idx_provenance_type ON provenance (type);",
];

const KNOWLEDGE_NODE_INDEXES: &[&str] = &[
    "CREATE INDEX idx_knowledge_nodes_type ON knowledge_nodes (entity_type);",
    "CREATE INDEX idx_knowledge_nodes_normalized ON knowledge_nodes (normalized_name);",
];

const PROVENANCE_COLUMNS: &str = "id, type, source_type, source_id, parent_id, parent_ids, \
     root_document_id, chain_depth, chain_path, content_hash, input_hash, file_hash, \
     processor, processor_version, processing_params, started_at, completed_at, \
     duration_ms, quality_score, created_at";

const EMBEDDING_COLUMNS: &str = "id, document_id, chunk_id, image_id, extraction_id, model_name, \
     dimension, original_text, source_file_name, source_file_path, page_number, content_hash, \
     provenance_id, created_at";

const CHUNK_COLUMNS: &str = "id, document_id, ocr_result_id, chunk_index, text, text_hash, \
     char_start, char_end, page_number, embedding_status, provenance_id, created_at";

const KNOWLEDGE_NODE_COLUMNS: &str = "id, entity_type, canonical_name, normalized_name, aliases, \
     document_count, mention_count, edge_count, avg_confidence, importance_score, \
     resolution_type, metadata, provenance_id, created_at";

fn migrate_v1(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE provenance (
             id TEXT PRIMARY KEY,
             type TEXT NOT NULL CHECK (type IN (
                 'DOCUMENT','OCR_RESULT','CHUNK','IMAGE','VLM_DESCRIPTION',
                 'EMBEDDING','EXTRACTION','FORM_FILL','ENTITY_EXTRACTION')),
             source_type TEXT NOT NULL,
             source_id TEXT REFERENCES provenance (id),
             parent_id TEXT REFERENCES provenance (id),
             parent_ids TEXT NOT NULL DEFAULT '[]',
             root_document_id TEXT NOT NULL,
             chain_depth INTEGER NOT NULL CHECK (chain_depth >= 0),
             chain_path TEXT NOT NULL DEFAULT '[]',
             content_hash TEXT NOT NULL,
             input_hash TEXT,
             file_hash TEXT,
             processor TEXT NOT NULL,
             processor_version TEXT NOT NULL,
             processing_params TEXT NOT NULL DEFAULT '{}',
             started_at TEXT,
             completed_at TEXT,
             duration_ms INTEGER,
             quality_score REAL,
             created_at TEXT NOT NULL
         );

         CREATE TABLE documents (
             id TEXT PRIMARY KEY,
             file_path TEXT NOT NULL,
             file_name TEXT NOT NULL,
             file_hash TEXT NOT NULL,
             file_size INTEGER NOT NULL,
             file_type TEXT NOT NULL,
             status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN (
                 'pending','processing','complete','failed')),
             page_count INTEGER,
             provenance_id TEXT NOT NULL UNIQUE REFERENCES provenance (id),
             created_at TEXT NOT NULL,
             updated_at TEXT NOT NULL,
             error_message TEXT,
             title TEXT,
             author TEXT,
             subject TEXT
         );

         CREATE TABLE ocr_results (
             id TEXT PRIMARY KEY,
             document_id TEXT NOT NULL REFERENCES documents (id),
             extracted_text TEXT NOT NULL,
             page_count INTEGER,
             ocr_mode TEXT,
             request_id TEXT,
             quality_score REAL,
             provenance_id TEXT NOT NULL UNIQUE REFERENCES provenance (id),
             created_at TEXT NOT NULL
         );

         CREATE TABLE chunks (
             id TEXT PRIMARY KEY,
             document_id TEXT NOT NULL REFERENCES documents (id),
             ocr_result_id TEXT NOT NULL REFERENCES ocr_results (id),
             chunk_index INTEGER NOT NULL,
             text TEXT NOT NULL,
             text_hash TEXT NOT NULL,
             char_start INTEGER NOT NULL,
             char_end INTEGER NOT NULL,
             page_number INTEGER,
             embedding_status TEXT NOT NULL DEFAULT 'pending',
             provenance_id TEXT NOT NULL UNIQUE REFERENCES provenance (id),
             created_at TEXT NOT NULL
         );

         CREATE TABLE embeddings (
             id TEXT PRIMARY KEY,
             document_id TEXT NOT NULL REFERENCES documents (id),
             chunk_id TEXT REFERENCES chunks (id),
             model_name TEXT NOT NULL,
             dimension INTEGER NOT NULL,
             original_text TEXT NOT NULL,
             source_file_name TEXT NOT NULL,
             source_file_path TEXT NOT NULL,
             page_number INTEGER,
             content_hash TEXT NOT NULL,
             provenance_id TEXT NOT NULL UNIQUE REFERENCES provenance (id),
             created_at TEXT NOT NULL
         );

         CREATE INDEX idx_provenance_root_document ON provenance (root_document_id);
         CREATE INDEX idx_provenance_parent ON provenance (parent_id);
         CREATE INDEX idx_provenance_type ON provenance (type);
         CREATE INDEX idx_documents_file_hash ON documents (file_hash);
         CREATE INDEX idx_documents_status ON documents (status);
         CREATE INDEX idx_ocr_results_document ON ocr_results (document_id);
         CREATE INDEX idx_chunks_document ON chunks (document_id);
         CREATE INDEX idx_chunks_ocr_result ON chunks (ocr_result_id);
         CREATE INDEX idx_embeddings_document ON embeddings (document_id);
         CREATE INDEX idx_embeddings_chunk ON embeddings (chunk_id);",
    )
}

fn migrate_v2(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE VIRTUAL TABLE vec_embeddings USING vec0(
             embedding_id TEXT PRIMARY KEY,
             vector FLOAT[768]
         );",
    )
}

fn migrate_v3(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE images (
             id TEXT PRIMARY KEY,
             document_id TEXT NOT NULL REFERENCES documents (id),
             page_number INTEGER,
             image_path TEXT,
             image_hash TEXT,
             vlm_description TEXT,
             vlm_status TEXT NOT NULL DEFAULT 'pending' CHECK (vlm_status IN (
                 'pending','complete','failed')),
             vlm_embedding_id TEXT REFERENCES embeddings (id),
             provenance_id TEXT NOT NULL UNIQUE REFERENCES provenance (id),
             created_at TEXT NOT NULL
         );

         CREATE INDEX idx_images_document ON images (document_id);

         ALTER TABLE embeddings ADD COLUMN image_id TEXT REFERENCES images (id);",
    )
}

fn migrate_v4(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE extractions (
             id TEXT PRIMARY KEY,
             document_id TEXT NOT NULL REFERENCES documents (id),
             schema_name TEXT NOT NULL,
             extracted_data TEXT NOT NULL,
             confidence REAL,
             provenance_id TEXT NOT NULL UNIQUE REFERENCES provenance (id),
             created_at TEXT NOT NULL
         );

         CREATE INDEX idx_extractions_document ON extractions (document_id);

         ALTER TABLE embeddings ADD COLUMN extraction_id TEXT REFERENCES extractions (id);",
    )?;

    // Exactly one embedding source. CHECK additions require a rebuild.
    recreate_table(
        conn,
        "embeddings",
        "CREATE TABLE embeddings (
             id TEXT PRIMARY KEY,
             document_id TEXT NOT NULL REFERENCES documents (id),
             chunk_id TEXT REFERENCES chunks (id),
             image_id TEXT REFERENCES images (id),
             extraction_id TEXT REFERENCES extractions (id),
             model_name TEXT NOT NULL,
             dimension INTEGER NOT NULL,
             original_text TEXT NOT NULL,
             source_file_name TEXT NOT NULL,
             source_file_path TEXT NOT NULL,
             page_number INTEGER,
             content_hash TEXT NOT NULL,
             provenance_id TEXT NOT NULL UNIQUE REFERENCES provenance (id),
             created_at TEXT NOT NULL,
             CHECK ((chunk_id IS NOT NULL) + (image_id IS NOT NULL)
                    + (extraction_id IS NOT NULL) = 1)
         );",
        EMBEDDING_COLUMNS,
        EMBEDDING_COLUMNS,
        EMBEDDING_INDEXES,
    )
}

fn migrate_v5(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE entities (
             id TEXT PRIMARY KEY,
             document_id TEXT NOT NULL REFERENCES documents (id),
             entity_type TEXT NOT NULL CHECK (entity_type IN (
                 'person','organization','date','amount','case_number','location',
                 'statute','exhibit','medication','diagnosis','medical_device','other')),
             raw_text TEXT NOT NULL,
             normalized_text TEXT NOT NULL,
             confidence REAL NOT NULL,
             provenance_id TEXT NOT NULL REFERENCES provenance (id),
             created_at TEXT NOT NULL
         );

         CREATE TABLE entity_mentions (
             id TEXT PRIMARY KEY,
             entity_id TEXT NOT NULL REFERENCES entities (id),
             chunk_id TEXT REFERENCES chunks (id),
             page_number INTEGER,
             mention_text TEXT,
             char_start INTEGER,
             char_end INTEGER,
             created_at TEXT NOT NULL
         );

         CREATE INDEX idx_entities_document ON entities (document_id);
         CREATE INDEX idx_entities_type_normalized ON entities (entity_type, normalized_text);
         CREATE INDEX idx_entity_mentions_entity ON entity_mentions (entity_id);
         CREATE INDEX idx_entity_mentions_chunk ON entity_mentions (chunk_id);",
    )
}

fn migrate_v6(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE clusters (
             id TEXT PRIMARY KEY,
             label TEXT NOT NULL,
             description TEXT,
             document_count INTEGER NOT NULL DEFAULT 0,
             centroid_embedding_id TEXT,
             provenance_id TEXT UNIQUE REFERENCES provenance (id),
             created_at TEXT NOT NULL
         );

         CREATE TABLE document_clusters (
             id TEXT PRIMARY KEY,
             document_id TEXT NOT NULL REFERENCES documents (id),
             cluster_id TEXT REFERENCES clusters (id),
             similarity_to_centroid REAL,
             assigned_at TEXT
         );

         CREATE INDEX idx_document_clusters_document ON document_clusters (document_id);
         CREATE INDEX idx_document_clusters_cluster ON document_clusters (cluster_id);",
    )
}

fn migrate_v7(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE comparisons (
             id TEXT PRIMARY KEY,
             document_a_id TEXT NOT NULL REFERENCES documents (id),
             document_b_id TEXT NOT NULL REFERENCES documents (id),
             comparison_type TEXT,
             result TEXT,
             similarity_score REAL,
             provenance_id TEXT UNIQUE REFERENCES provenance (id),
             created_at TEXT NOT NULL
         );

         CREATE INDEX idx_comparisons_document_a ON comparisons (document_a_id);
         CREATE INDEX idx_comparisons_document_b ON comparisons (document_b_id);",
    )
}

fn migrate_v8(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE VIRTUAL TABLE chunks_fts USING fts5(
             chunk_id UNINDEXED,
             document_id UNINDEXED,
             text
         );

         INSERT INTO chunks_fts (chunk_id, document_id, text)
             SELECT id, document_id, text FROM chunks;

         CREATE TABLE fts_metadata (
             id INTEGER PRIMARY KEY CHECK (id IN (1, 2, 3)),
             name TEXT NOT NULL,
             row_count INTEGER NOT NULL DEFAULT 0,
             updated_at TEXT
         );

         INSERT INTO fts_metadata (id, name, row_count)
             VALUES (1, 'documents', (SELECT COUNT(*) FROM documents)),
                    (2, 'chunks', (SELECT COUNT(*) FROM chunks)),
                    (3, 'entities', (SELECT COUNT(*) FROM entities));",
    )
}

fn migrate_v9(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE form_fills (
             id TEXT PRIMARY KEY,
             document_id TEXT NOT NULL REFERENCES documents (id),
             form_schema TEXT NOT NULL,
             filled_data TEXT NOT NULL,
             provenance_id TEXT UNIQUE REFERENCES provenance (id),
             created_at TEXT NOT NULL
         );

         CREATE TABLE uploaded_files (
             id TEXT PRIMARY KEY,
             document_id TEXT REFERENCES documents (id),
             remote_id TEXT,
             file_name TEXT NOT NULL,
             status TEXT,
             uploaded_at TEXT,
             created_at TEXT NOT NULL
         );",
    )
}

fn migrate_v10(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE knowledge_nodes (
             id TEXT PRIMARY KEY,
             entity_type TEXT NOT NULL,
             canonical_name TEXT NOT NULL,
             normalized_name TEXT NOT NULL,
             aliases TEXT NOT NULL DEFAULT '[]',
             document_count INTEGER NOT NULL DEFAULT 1,
             mention_count INTEGER NOT NULL DEFAULT 0,
             edge_count INTEGER NOT NULL DEFAULT 0,
             avg_confidence REAL NOT NULL DEFAULT 0,
             importance_score REAL NOT NULL DEFAULT 0,
             resolution_type TEXT NOT NULL DEFAULT 'exact',
             metadata TEXT NOT NULL DEFAULT '{}',
             provenance_id TEXT NOT NULL,
             created_at TEXT NOT NULL
         );

         CREATE TABLE knowledge_edges (
             id TEXT PRIMARY KEY,
             source_node_id TEXT NOT NULL REFERENCES knowledge_nodes (id),
             target_node_id TEXT NOT NULL REFERENCES knowledge_nodes (id),
             relationship_type TEXT NOT NULL CHECK (relationship_type IN (
                 'co_mentioned','co_located','works_at','represents','located_in',
                 'filed_in','cites','references','party_to','related_to','precedes',
                 'occurred_at','treated_with','administered_via','managed_by',
                 'interacts_with','same_as','parent_of','child_of','part_of',
                 'has_part','preceded_by','followed_by','referenced_in','signed_by')),
             weight REAL NOT NULL CHECK (weight > 0 AND weight <= 1),
             evidence_count INTEGER NOT NULL DEFAULT 1,
             document_ids TEXT NOT NULL DEFAULT '[]',
             metadata TEXT NOT NULL DEFAULT '{}',
             created_at TEXT NOT NULL
         );

         CREATE TABLE node_entity_links (
             id TEXT PRIMARY KEY,
             node_id TEXT NOT NULL REFERENCES knowledge_nodes (id),
             entity_id TEXT NOT NULL UNIQUE REFERENCES entities (id),
             document_id TEXT NOT NULL,
             similarity_score REAL NOT NULL,
             resolution_method TEXT NOT NULL,
             created_at TEXT NOT NULL
         );

         CREATE INDEX idx_knowledge_nodes_type ON knowledge_nodes (entity_type);
         CREATE INDEX idx_knowledge_nodes_normalized ON knowledge_nodes (normalized_name);
         CREATE INDEX idx_knowledge_edges_source ON knowledge_edges (source_node_id);
         CREATE INDEX idx_knowledge_edges_target ON knowledge_edges (target_node_id);
         CREATE INDEX idx_node_entity_links_node ON node_entity_links (node_id);
         CREATE INDEX idx_node_entity_links_document ON node_entity_links (document_id);",
    )
}

fn migrate_v11(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE entity_extraction_segments (
             id TEXT PRIMARY KEY,
             document_id TEXT NOT NULL REFERENCES documents (id),
             segment_index INTEGER NOT NULL,
             char_start INTEGER NOT NULL,
             char_end INTEGER NOT NULL,
             entity_count INTEGER NOT NULL DEFAULT 0,
             created_at TEXT NOT NULL
         );

         CREATE INDEX idx_segments_document ON entity_extraction_segments (document_id);

         ALTER TABLE entities ADD COLUMN extraction_id TEXT REFERENCES extractions (id);",
    )
}

fn migrate_v12(conn: &Connection) -> rusqlite::Result<()> {
    // Three artifact kinds arrived after the baseline; widening the CHECK
    // means rebuilding the table.
    recreate_table(
        conn,
        "provenance",
        "CREATE TABLE provenance (
             id TEXT PRIMARY KEY,
             type TEXT NOT NULL CHECK (type IN (
                 'DOCUMENT','OCR_RESULT','CHUNK','IMAGE','VLM_DESCRIPTION',
                 'EMBEDDING','EXTRACTION','FORM_FILL','ENTITY_EXTRACTION',
                 'COMPARISON','CLUSTERING','KNOWLEDGE_GRAPH')),
             source_type TEXT NOT NULL,
             source_id TEXT REFERENCES provenance (id),
             parent_id TEXT REFERENCES provenance (id),
             parent_ids TEXT NOT NULL DEFAULT '[]',
             root_document_id TEXT NOT NULL,
             chain_depth INTEGER NOT NULL CHECK (chain_depth >= 0),
             chain_path TEXT NOT NULL DEFAULT '[]',
             content_hash TEXT NOT NULL,
             input_hash TEXT,
             file_hash TEXT,
             processor TEXT NOT NULL,
             processor_version TEXT NOT NULL,
             processing_params TEXT NOT NULL DEFAULT '{}',
             started_at TEXT,
             completed_at TEXT,
             duration_ms INTEGER,
             quality_score REAL,
             created_at TEXT NOT NULL
         );",
        PROVENANCE_COLUMNS,
        PROVENANCE_COLUMNS,
        PROVENANCE_INDEXES,
    )
}

fn migrate_v13(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE entity_embeddings (
             id TEXT PRIMARY KEY,
             node_id TEXT NOT NULL REFERENCES knowledge_nodes (id),
             model_name TEXT,
             created_at TEXT NOT NULL
         );

         CREATE VIRTUAL TABLE vec_entity_embeddings USING vec0(
             node_id TEXT PRIMARY KEY,
             vector FLOAT[768]
         );",
    )
}

fn migrate_v14(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "ALTER TABLE knowledge_edges ADD COLUMN valid_from TEXT;
         ALTER TABLE knowledge_edges ADD COLUMN valid_until TEXT;
         ALTER TABLE knowledge_edges ADD COLUMN normalized_weight REAL;
         ALTER TABLE knowledge_edges ADD COLUMN contradiction_count INTEGER NOT NULL DEFAULT 0;",
    )
}

fn migrate_v15(conn: &Connection) -> rusqlite::Result<()> {
    recreate_table(
        conn,
        "document_clusters",
        "CREATE TABLE document_clusters (
             id TEXT PRIMARY KEY,
             document_id TEXT NOT NULL REFERENCES documents (id),
             cluster_id TEXT REFERENCES clusters (id),
             similarity_to_centroid REAL NOT NULL,
             assigned_at TEXT NOT NULL
         );",
        "id, document_id, cluster_id, similarity_to_centroid, assigned_at",
        "id, document_id, cluster_id, COALESCE(similarity_to_centroid, 0.0), \
         COALESCE(assigned_at, '1970-01-01T00:00:00.000Z')",
        &[
            "CREATE INDEX idx_document_clusters_document ON document_clusters (document_id);",
            "CREATE INDEX idx_document_clusters_cluster ON document_clusters (cluster_id);",
        ],
    )
}

fn migrate_v16(conn: &Connection) -> rusqlite::Result<()> {
    recreate_table(
        conn,
        "chunks",
        "CREATE TABLE chunks (
             id TEXT PRIMARY KEY,
             document_id TEXT NOT NULL REFERENCES documents (id),
             ocr_result_id TEXT NOT NULL REFERENCES ocr_results (id),
             chunk_index INTEGER NOT NULL,
             text TEXT NOT NULL,
             text_hash TEXT NOT NULL,
             char_start INTEGER NOT NULL,
             char_end INTEGER NOT NULL,
             page_number INTEGER,
             embedding_status TEXT NOT NULL DEFAULT 'pending' CHECK (embedding_status IN (
                 'pending','complete','failed')),
             provenance_id TEXT NOT NULL UNIQUE REFERENCES provenance (id),
             created_at TEXT NOT NULL
         );",
        CHUNK_COLUMNS,
        CHUNK_COLUMNS,
        CHUNK_INDEXES,
    )?;

    // The FTS companion indexes chunk rowids that the rebuild invalidated.
    conn.execute_batch(
        "DELETE FROM chunks_fts;
         INSERT INTO chunks_fts (chunk_id, document_id, text)
             SELECT id, document_id, text FROM chunks;",
    )
}

fn migrate_v17(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE kg_statistics (
             id INTEGER PRIMARY KEY CHECK (id = 1),
             total_nodes INTEGER NOT NULL DEFAULT 0,
             total_edges INTEGER NOT NULL DEFAULT 0,
             total_links INTEGER NOT NULL DEFAULT 0,
             built_at TEXT,
             build_params TEXT
         );

         INSERT INTO kg_statistics (id) VALUES (1);",
    )
}

fn migrate_v18(conn: &Connection) -> rusqlite::Result<()> {
    recreate_table(
        conn,
        "knowledge_nodes",
        "CREATE TABLE knowledge_nodes (
             id TEXT PRIMARY KEY,
             entity_type TEXT NOT NULL,
             canonical_name TEXT NOT NULL,
             normalized_name TEXT NOT NULL,
             aliases TEXT NOT NULL DEFAULT '[]',
             document_count INTEGER NOT NULL DEFAULT 1,
             mention_count INTEGER NOT NULL DEFAULT 0,
             edge_count INTEGER NOT NULL DEFAULT 0,
             avg_confidence REAL NOT NULL DEFAULT 0,
             importance_score REAL NOT NULL DEFAULT 0,
             resolution_type TEXT NOT NULL DEFAULT 'exact',
             metadata TEXT NOT NULL DEFAULT '{}',
             provenance_id TEXT NOT NULL REFERENCES provenance (id),
             created_at TEXT NOT NULL
         );",
        KNOWLEDGE_NODE_COLUMNS,
        KNOWLEDGE_NODE_COLUMNS,
        KNOWLEDGE_NODE_INDEXES,
    )
}
