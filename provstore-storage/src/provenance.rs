//! Provenance chain management
//!
//! Every artifact row points at a provenance row, and provenance rows point
//! at each other through `parent_id`/`source_id` self-references. The
//! creator derives the chain bookkeeping (`parent_ids`, `chain_depth`,
//! `chain_path`, `root_document_id`) from the parent, so callers only name
//! their immediate parent.

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use provstore_core::error::{Result, StoreError};
use provstore_core::hash::compute_hash;
use provstore_core::types::{
    new_id, now_timestamp, Provenance, ProvenanceSpec, ProvenanceType, SourceType,
    ORPHANED_ROOT_ID,
};

use crate::dal::{parse_json, to_json};
use crate::sqlutil::map_sql_err;
use crate::store::DocumentStore;

const PROVENANCE_COLUMNS: &str = "id, type, source_type, source_id, parent_id, parent_ids, \
     root_document_id, chain_depth, chain_path, content_hash, input_hash, file_hash, processor, \
     processor_version, processing_params, started_at, completed_at, duration_ms, quality_score, \
     created_at";

fn row_to_provenance(row: &Row<'_>) -> rusqlite::Result<Provenance> {
    Ok(Provenance {
        id: row.get(0)?,
        provenance_type: crate::dal::parse_enum(1, &row.get::<_, String>(1)?)?,
        source_type: crate::dal::parse_enum(2, &row.get::<_, String>(2)?)?,
        source_id: row.get(3)?,
        parent_id: row.get(4)?,
        parent_ids: parse_json(5, &row.get::<_, String>(5)?)?,
        root_document_id: row.get(6)?,
        chain_depth: row.get(7)?,
        chain_path: parse_json(8, &row.get::<_, String>(8)?)?,
        content_hash: row.get(9)?,
        input_hash: row.get(10)?,
        file_hash: row.get(11)?,
        processor: row.get(12)?,
        processor_version: row.get(13)?,
        processing_params: parse_json(14, &row.get::<_, String>(14)?)?,
        started_at: row.get(15)?,
        completed_at: row.get(16)?,
        duration_ms: row.get(17)?,
        quality_score: row.get(18)?,
        created_at: row.get(19)?,
    })
}

fn insert_row(conn: &Connection, p: &Provenance) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO provenance ({PROVENANCE_COLUMNS}) \
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20)"
        ),
        params![
            p.id,
            p.provenance_type.as_str(),
            p.source_type.as_str(),
            p.source_id,
            p.parent_id,
            to_json(&p.parent_ids)?,
            p.root_document_id,
            p.chain_depth,
            to_json(&p.chain_path)?,
            p.content_hash,
            p.input_hash,
            p.file_hash,
            p.processor,
            p.processor_version,
            to_json(&p.processing_params)?,
            p.started_at,
            p.completed_at,
            p.duration_ms,
            p.quality_score,
            p.created_at,
        ],
    )
    .map_err(|e| map_sql_err("insert provenance (provenance.parent_id -> provenance.id)", e))?;
    Ok(())
}

/// Create a provenance row from a spec, deriving the chain bookkeeping.
///
/// Roots: a parentless DOCUMENT row roots its own chain. A parentless row
/// of any other type derives from the corpus as a whole and is anchored
/// under the synthetic orphaned root instead.
pub(crate) fn create_provenance(conn: &Connection, spec: &ProvenanceSpec) -> Result<Provenance> {
    let id = new_id();

    let (parent_id, parent_ids, chain_path, root_document_id) = match &spec.parent_id {
        Some(parent_id) => {
            let parent = get_provenance(conn, parent_id)?.ok_or_else(|| {
                StoreError::ForeignKeyViolation(format!(
                    "provenance parent {parent_id} does not exist"
                ))
            })?;
            let mut parent_ids = parent.parent_ids.clone();
            parent_ids.push(parent.id.clone());
            let mut chain_path = parent.chain_path.clone();
            chain_path.push(spec.provenance_type);
            (
                Some(parent.id),
                parent_ids,
                chain_path,
                parent.root_document_id,
            )
        }
        None if spec.provenance_type == ProvenanceType::Document => {
            (None, Vec::new(), vec![ProvenanceType::Document], id.clone())
        }
        None => {
            let root = ensure_orphaned_root(conn)?;
            (
                Some(root.clone()),
                vec![root],
                vec![ProvenanceType::Document, spec.provenance_type],
                ORPHANED_ROOT_ID.to_string(),
            )
        }
    };

    let provenance = Provenance {
        id,
        provenance_type: spec.provenance_type,
        source_type: spec.source_type,
        source_id: spec.source_id.clone(),
        parent_id,
        chain_depth: parent_ids.len() as u32,
        parent_ids,
        root_document_id,
        chain_path,
        content_hash: spec.content_hash.clone(),
        input_hash: spec.input_hash.clone(),
        file_hash: spec.file_hash.clone(),
        processor: spec.processor.clone(),
        processor_version: spec.processor_version.clone(),
        processing_params: spec.processing_params.clone(),
        started_at: spec.started_at.clone(),
        completed_at: spec.completed_at.clone(),
        duration_ms: spec.duration_ms,
        quality_score: spec.quality_score,
        created_at: now_timestamp(),
    };

    insert_row(conn, &provenance)?;
    debug!(
        provenance_id = %provenance.id,
        provenance_type = provenance.provenance_type.as_str(),
        chain_depth = provenance.chain_depth,
        "provenance created"
    );
    Ok(provenance)
}

pub(crate) fn get_provenance(conn: &Connection, id: &str) -> Result<Option<Provenance>> {
    conn.query_row(
        &format!("SELECT {PROVENANCE_COLUMNS} FROM provenance WHERE id = ?1"),
        [id],
        row_to_provenance,
    )
    .optional()
    .map_err(|e| map_sql_err("get provenance", e))
}

/// Walk the chain leaf to root
pub(crate) fn chain_of(conn: &Connection, id: &str) -> Result<Vec<Provenance>> {
    let mut chain = Vec::new();
    let mut cursor = Some(id.to_string());
    while let Some(current) = cursor {
        let row = get_provenance(conn, &current)?.ok_or_else(|| StoreError::NotFound {
            entity: "provenance",
            id: current.clone(),
        })?;
        cursor = row.parent_id.clone();
        chain.push(row);
        if chain.len() > 64 {
            return Err(StoreError::Storage(format!(
                "provenance chain through {id} exceeds 64 links; cycle suspected"
            )));
        }
    }
    Ok(chain)
}

pub(crate) fn children_of(conn: &Connection, id: &str) -> Result<Vec<Provenance>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {PROVENANCE_COLUMNS} FROM provenance WHERE parent_id = ?1 ORDER BY created_at, id"
        ))
        .map_err(|e| map_sql_err("list provenance children", e))?;
    let rows = stmt
        .query_map([id], row_to_provenance)
        .map_err(|e| map_sql_err("list provenance children", e))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| map_sql_err("list provenance children", e))?);
    }
    Ok(out)
}

/// Every provenance row rooted at the given DOCUMENT provenance, shallowest
/// first
pub(crate) fn by_root_document(conn: &Connection, root_id: &str) -> Result<Vec<Provenance>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {PROVENANCE_COLUMNS} FROM provenance WHERE root_document_id = ?1 \
             ORDER BY chain_depth ASC, created_at, id"
        ))
        .map_err(|e| map_sql_err("list provenance by root", e))?;
    let rows = stmt
        .query_map([root_id], row_to_provenance)
        .map_err(|e| map_sql_err("list provenance by root", e))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| map_sql_err("list provenance by root", e))?);
    }
    Ok(out)
}

/// Fetch-or-create the synthetic orphaned-root DOCUMENT provenance.
///
/// Exactly one such row exists per database; it is created lazily inside
/// the calling transaction, and single-writer execution rules out a race.
pub(crate) fn ensure_orphaned_root(conn: &Connection) -> Result<String> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM provenance WHERE id = ?1",
            [ORPHANED_ROOT_ID],
            |r| r.get(0),
        )
        .optional()
        .map_err(|e| map_sql_err("probe orphaned root", e))?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let row = Provenance {
        id: ORPHANED_ROOT_ID.to_string(),
        provenance_type: ProvenanceType::Document,
        source_type: SourceType::System,
        source_id: None,
        parent_id: None,
        parent_ids: Vec::new(),
        root_document_id: ORPHANED_ROOT_ID.to_string(),
        chain_depth: 0,
        chain_path: vec![ProvenanceType::Document],
        content_hash: compute_hash(ORPHANED_ROOT_ID),
        input_hash: None,
        file_hash: None,
        processor: "provstore".to_string(),
        processor_version: env!("CARGO_PKG_VERSION").to_string(),
        processing_params: serde_json::Value::Object(serde_json::Map::new()),
        started_at: None,
        completed_at: None,
        duration_ms: None,
        quality_score: None,
        created_at: now_timestamp(),
    };
    insert_row(conn, &row)?;
    debug!("orphaned root provenance created");
    Ok(row.id)
}

/// True when any KNOWLEDGE_GRAPH provenance exists
pub(crate) fn graph_provenance_exists(conn: &Connection) -> Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM provenance WHERE type = 'KNOWLEDGE_GRAPH'",
        [],
        |r| r.get(0),
    )
    .map_err(|e| map_sql_err("probe graph provenance", e))
}

impl DocumentStore {
    /// Create a provenance row; returns the stored record with its derived
    /// chain fields
    pub fn create_provenance(&self, spec: &ProvenanceSpec) -> Result<Provenance> {
        self.with_tx(|conn| create_provenance(conn, spec))
    }

    /// Fetch a provenance row by id
    pub fn get_provenance(&self, id: &str) -> Result<Option<Provenance>> {
        self.with_conn(|conn| get_provenance(conn, id))
    }

    /// Chain from a leaf to its root, leaf first
    pub fn provenance_chain(&self, id: &str) -> Result<Vec<Provenance>> {
        self.with_conn(|conn| chain_of(conn, id))
    }

    /// Immediate children of a provenance row
    pub fn provenance_children(&self, id: &str) -> Result<Vec<Provenance>> {
        self.with_conn(|conn| children_of(conn, id))
    }

    /// Every provenance row rooted at a DOCUMENT provenance, shallowest
    /// first
    pub fn provenance_by_root_document(&self, root_id: &str) -> Result<Vec<Provenance>> {
        self.with_conn(|conn| by_root_document(conn, root_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provstore_core::types::ProvenanceSpec;

    fn store() -> DocumentStore {
        DocumentStore::in_memory().unwrap()
    }

    fn doc_spec() -> ProvenanceSpec {
        ProvenanceSpec::new(
            ProvenanceType::Document,
            SourceType::FileUpload,
            compute_hash("file"),
            "ingest",
        )
        .with_file_hash(compute_hash("file"))
    }

    #[test]
    fn document_root_is_self_rooted() {
        let store = store();
        let root = store.create_provenance(&doc_spec()).unwrap();
        assert_eq!(root.root_document_id, root.id);
        assert_eq!(root.chain_depth, 0);
        assert!(root.parent_ids.is_empty());
        assert_eq!(root.chain_path, vec![ProvenanceType::Document]);
    }

    #[test]
    fn chain_bookkeeping_follows_parent() {
        let store = store();
        let root = store.create_provenance(&doc_spec()).unwrap();
        let ocr = store
            .create_provenance(
                &ProvenanceSpec::new(
                    ProvenanceType::OcrResult,
                    SourceType::OcrProcessor,
                    compute_hash("text"),
                    "ocr",
                )
                .with_parent(&root.id),
            )
            .unwrap();
        let chunk = store
            .create_provenance(
                &ProvenanceSpec::new(
                    ProvenanceType::Chunk,
                    SourceType::Chunker,
                    compute_hash("chunk"),
                    "chunker",
                )
                .with_parent(&ocr.id),
            )
            .unwrap();

        assert_eq!(chunk.chain_depth, 2);
        assert_eq!(chunk.parent_ids, vec![root.id.clone(), ocr.id.clone()]);
        assert_eq!(
            chunk.chain_path,
            vec![
                ProvenanceType::Document,
                ProvenanceType::OcrResult,
                ProvenanceType::Chunk
            ]
        );
        assert_eq!(chunk.root_document_id, root.id);

        let chain = store.provenance_chain(&chunk.id).unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[0].id, chunk.id);
        assert_eq!(chain[2].id, root.id);

        let rooted = store.provenance_by_root_document(&root.id).unwrap();
        assert_eq!(rooted.len(), 3);
        assert!(rooted.windows(2).all(|w| w[0].chain_depth <= w[1].chain_depth));
    }

    #[test]
    fn parentless_non_document_anchors_under_orphaned_root() {
        let store = store();
        let kg = store
            .create_provenance(&ProvenanceSpec::new(
                ProvenanceType::KnowledgeGraph,
                SourceType::GraphBuilder,
                compute_hash("graph"),
                "knowledge-graph-builder",
            ))
            .unwrap();
        assert_eq!(kg.root_document_id, ORPHANED_ROOT_ID);
        assert_eq!(kg.parent_id.as_deref(), Some(ORPHANED_ROOT_ID));
        assert_eq!(kg.chain_depth, 1);

        let root = store.get_provenance(ORPHANED_ROOT_ID).unwrap().unwrap();
        assert_eq!(root.provenance_type, ProvenanceType::Document);
        assert_eq!(root.content_hash, compute_hash(ORPHANED_ROOT_ID));
    }

    #[test]
    fn missing_parent_is_a_foreign_key_violation() {
        let store = store();
        let err = store
            .create_provenance(
                &ProvenanceSpec::new(
                    ProvenanceType::Chunk,
                    SourceType::Chunker,
                    compute_hash("x"),
                    "chunker",
                )
                .with_parent("missing"),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation(_)));
    }
}
