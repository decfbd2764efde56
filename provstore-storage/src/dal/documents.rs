//! Document CRUD

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use provstore_core::error::{Result, StoreError};
use provstore_core::types::{new_id, now_timestamp, Document, DocumentStatus, ListOptions, NewDocument};

use crate::dal::parse_enum;
use crate::sqlutil::map_sql_err;
use crate::store::DocumentStore;

const DOCUMENT_COLUMNS: &str = "id, file_path, file_name, file_hash, file_size, file_type, \
     status, page_count, provenance_id, created_at, updated_at, error_message, title, author, \
     subject";

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        file_path: row.get(1)?,
        file_name: row.get(2)?,
        file_hash: row.get(3)?,
        file_size: row.get(4)?,
        file_type: row.get(5)?,
        status: parse_enum(6, &row.get::<_, String>(6)?)?,
        page_count: row.get(7)?,
        provenance_id: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        error_message: row.get(11)?,
        title: row.get(12)?,
        author: row.get(13)?,
        subject: row.get(14)?,
    })
}

pub(crate) fn insert_document(conn: &Connection, doc: &NewDocument) -> Result<String> {
    let id = new_id();
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO documents (id, file_path, file_name, file_hash, file_size, file_type, \
             status, page_count, provenance_id, created_at, updated_at, title, author, subject) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7, ?8, ?9, ?9, ?10, ?11, ?12)",
        params![
            id,
            doc.file_path,
            doc.file_name,
            doc.file_hash,
            doc.file_size,
            doc.file_type,
            doc.page_count,
            doc.provenance_id,
            now,
            doc.title,
            doc.author,
            doc.subject,
        ],
    )
    .map_err(|e| map_sql_err("insert document (documents.provenance_id -> provenance.id)", e))?;
    conn.execute(
        "UPDATE fts_metadata SET row_count = row_count + 1, updated_at = ?1 WHERE id = 1",
        [&now],
    )
    .map_err(|e| map_sql_err("bump document count", e))?;
    debug!(document_id = %id, file_name = %doc.file_name, "document inserted");
    Ok(id)
}

pub(crate) fn get_document(conn: &Connection, id: &str) -> Result<Option<Document>> {
    conn.query_row(
        &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
        [id],
        row_to_document,
    )
    .optional()
    .map_err(|e| map_sql_err("get document", e))
}

pub(crate) fn get_document_by_path(conn: &Connection, file_path: &str) -> Result<Option<Document>> {
    conn.query_row(
        &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE file_path = ?1"),
        [file_path],
        row_to_document,
    )
    .optional()
    .map_err(|e| map_sql_err("get document by path", e))
}

pub(crate) fn get_document_by_hash(conn: &Connection, file_hash: &str) -> Result<Option<Document>> {
    conn.query_row(
        &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE file_hash = ?1"),
        [file_hash],
        row_to_document,
    )
    .optional()
    .map_err(|e| map_sql_err("get document by hash", e))
}

pub(crate) fn list_documents(conn: &Connection, opts: &ListOptions) -> Result<Vec<Document>> {
    let (limit, offset) = opts.bounds();
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents \
             WHERE (?1 IS NULL OR status = ?1) \
             ORDER BY created_at, id LIMIT ?2 OFFSET ?3"
        ))
        .map_err(|e| map_sql_err("list documents", e))?;
    let rows = stmt
        .query_map(params![opts.status, limit, offset], row_to_document)
        .map_err(|e| map_sql_err("list documents", e))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| map_sql_err("list documents", e))?);
    }
    Ok(out)
}

pub(crate) fn count_documents(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))
        .map_err(|e| map_sql_err("count documents", e))
}

pub(crate) fn update_document_status(
    conn: &Connection,
    id: &str,
    status: DocumentStatus,
    error_message: Option<&str>,
) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE documents SET status = ?2, error_message = ?3, updated_at = ?4 WHERE id = ?1",
            params![id, status.as_str(), error_message, now_timestamp()],
        )
        .map_err(|e| map_sql_err("update document status", e))?;
    if changed == 0 {
        return Err(StoreError::DocumentNotFound(id.to_string()));
    }
    debug!(document_id = id, status = status.as_str(), "document status updated");
    Ok(())
}

/// Mark OCR finished: status becomes `complete` and the recognized page
/// count is recorded.
pub(crate) fn update_document_ocr_complete(
    conn: &Connection,
    id: &str,
    page_count: i64,
) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE documents SET status = 'complete', page_count = ?2, error_message = NULL, \
                 updated_at = ?3 \
             WHERE id = ?1",
            params![id, page_count, now_timestamp()],
        )
        .map_err(|e| map_sql_err("update document ocr complete", e))?;
    if changed == 0 {
        return Err(StoreError::DocumentNotFound(id.to_string()));
    }
    Ok(())
}

/// Per-artifact row counts for one document
#[derive(Debug, Clone, serde::Serialize)]
pub struct DocumentSummary {
    pub document: Document,
    pub ocr_results: i64,
    pub chunks: i64,
    pub embeddings: i64,
    pub images: i64,
    pub extractions: i64,
    pub entities: i64,
}

pub(crate) fn document_summary(conn: &Connection, id: &str) -> Result<Option<DocumentSummary>> {
    let Some(document) = get_document(conn, id)? else {
        return Ok(None);
    };
    let count = |table: &str| -> Result<i64> {
        conn.query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE document_id = ?1"),
            [id],
            |r| r.get(0),
        )
        .map_err(|e| map_sql_err("summarize document", e))
    };
    Ok(Some(DocumentSummary {
        document,
        ocr_results: count("ocr_results")?,
        chunks: count("chunks")?,
        embeddings: count("embeddings")?,
        images: count("images")?,
        extractions: count("extractions")?,
        entities: count("entities")?,
    }))
}

impl DocumentStore {
    /// Insert a document; returns the stored id
    pub fn insert_document(&self, doc: &NewDocument) -> Result<String> {
        self.with_tx(|conn| insert_document(conn, doc))
    }

    /// A document together with counts of every derived artifact
    pub fn document_summary(&self, id: &str) -> Result<Option<DocumentSummary>> {
        self.with_conn(|conn| document_summary(conn, id))
    }

    /// Fetch a document by id
    pub fn get_document(&self, id: &str) -> Result<Option<Document>> {
        self.with_conn(|conn| get_document(conn, id))
    }

    /// Fetch a document by its file path
    pub fn get_document_by_path(&self, file_path: &str) -> Result<Option<Document>> {
        self.with_conn(|conn| get_document_by_path(conn, file_path))
    }

    /// Fetch a document by its file hash
    pub fn get_document_by_hash(&self, file_hash: &str) -> Result<Option<Document>> {
        self.with_conn(|conn| get_document_by_hash(conn, file_hash))
    }

    /// List documents with optional status filter and bounded pagination
    pub fn list_documents(&self, opts: &ListOptions) -> Result<Vec<Document>> {
        self.with_conn(|conn| list_documents(conn, opts))
    }

    /// Total number of documents
    pub fn count_documents(&self) -> Result<i64> {
        self.with_conn(count_documents)
    }

    /// Update a document's status, replacing any error message
    pub fn update_document_status(
        &self,
        id: &str,
        status: DocumentStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        self.with_tx(|conn| update_document_status(conn, id, status, error_message))
    }

    /// Record successful OCR completion for a document
    pub fn update_document_ocr_complete(&self, id: &str, page_count: i64) -> Result<()> {
        self.with_tx(|conn| update_document_ocr_complete(conn, id, page_count))
    }
}
