//! OCR result and chunk CRUD, including the chunk FTS companion

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use provstore_core::error::{Result, StoreError};
use provstore_core::types::{now_timestamp, Chunk, EmbeddingStatus, OcrResult};

use crate::dal::parse_enum;
use crate::sqlutil::map_sql_err;
use crate::store::DocumentStore;

const OCR_COLUMNS: &str =
    "id, document_id, extracted_text, page_count, ocr_mode, request_id, quality_score, \
     provenance_id, created_at";

const CHUNK_COLUMNS: &str = "id, document_id, ocr_result_id, chunk_index, text, text_hash, \
     char_start, char_end, page_number, embedding_status, provenance_id, created_at";

fn row_to_ocr(row: &Row<'_>) -> rusqlite::Result<OcrResult> {
    Ok(OcrResult {
        id: row.get(0)?,
        document_id: row.get(1)?,
        extracted_text: row.get(2)?,
        page_count: row.get(3)?,
        ocr_mode: row.get(4)?,
        request_id: row.get(5)?,
        quality_score: row.get(6)?,
        provenance_id: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn row_to_chunk(row: &Row<'_>) -> rusqlite::Result<Chunk> {
    Ok(Chunk {
        id: row.get(0)?,
        document_id: row.get(1)?,
        ocr_result_id: row.get(2)?,
        chunk_index: row.get(3)?,
        text: row.get(4)?,
        text_hash: row.get(5)?,
        char_start: row.get(6)?,
        char_end: row.get(7)?,
        page_number: row.get(8)?,
        embedding_status: parse_enum(9, &row.get::<_, String>(9)?)?,
        provenance_id: row.get(10)?,
        created_at: row.get(11)?,
    })
}

pub(crate) fn insert_ocr_result(conn: &Connection, ocr: &OcrResult) -> Result<String> {
    conn.execute(
        &format!("INSERT INTO ocr_results ({OCR_COLUMNS}) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)"),
        params![
            ocr.id,
            ocr.document_id,
            ocr.extracted_text,
            ocr.page_count,
            ocr.ocr_mode,
            ocr.request_id,
            ocr.quality_score,
            ocr.provenance_id,
            ocr.created_at,
        ],
    )
    .map_err(|e| map_sql_err("insert ocr_result (ocr_results.document_id -> documents.id)", e))?;
    Ok(ocr.id.clone())
}

pub(crate) fn get_ocr_result(conn: &Connection, id: &str) -> Result<Option<OcrResult>> {
    conn.query_row(
        &format!("SELECT {OCR_COLUMNS} FROM ocr_results WHERE id = ?1"),
        [id],
        row_to_ocr,
    )
    .optional()
    .map_err(|e| map_sql_err("get ocr_result", e))
}

pub(crate) fn ocr_results_for_document(conn: &Connection, document_id: &str) -> Result<Vec<OcrResult>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {OCR_COLUMNS} FROM ocr_results WHERE document_id = ?1 ORDER BY created_at"
        ))
        .map_err(|e| map_sql_err("list ocr_results", e))?;
    let rows = stmt
        .query_map([document_id], row_to_ocr)
        .map_err(|e| map_sql_err("list ocr_results", e))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| map_sql_err("list ocr_results", e))?);
    }
    Ok(out)
}

pub(crate) fn insert_chunk(conn: &Connection, chunk: &Chunk) -> Result<String> {
    conn.execute(
        &format!(
            "INSERT INTO chunks ({CHUNK_COLUMNS}) \
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)"
        ),
        params![
            chunk.id,
            chunk.document_id,
            chunk.ocr_result_id,
            chunk.chunk_index,
            chunk.text,
            chunk.text_hash,
            chunk.char_start,
            chunk.char_end,
            chunk.page_number,
            chunk.embedding_status.as_str(),
            chunk.provenance_id,
            chunk.created_at,
        ],
    )
    .map_err(|e| map_sql_err("insert chunk (chunks.ocr_result_id -> ocr_results.id)", e))?;

    conn.execute(
        "INSERT INTO chunks_fts (chunk_id, document_id, text) VALUES (?1, ?2, ?3)",
        params![chunk.id, chunk.document_id, chunk.text],
    )
    .map_err(|e| map_sql_err("index chunk text", e))?;
    conn.execute(
        "UPDATE fts_metadata SET row_count = row_count + 1, updated_at = ?1 WHERE id = 2",
        [now_timestamp()],
    )
    .map_err(|e| map_sql_err("bump chunk count", e))?;

    Ok(chunk.id.clone())
}

pub(crate) fn get_chunk(conn: &Connection, id: &str) -> Result<Option<Chunk>> {
    conn.query_row(
        &format!("SELECT {CHUNK_COLUMNS} FROM chunks WHERE id = ?1"),
        [id],
        row_to_chunk,
    )
    .optional()
    .map_err(|e| map_sql_err("get chunk", e))
}

pub(crate) fn chunks_for_document(conn: &Connection, document_id: &str) -> Result<Vec<Chunk>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {CHUNK_COLUMNS} FROM chunks WHERE document_id = ?1 ORDER BY chunk_index"
        ))
        .map_err(|e| map_sql_err("list chunks", e))?;
    let rows = stmt
        .query_map([document_id], row_to_chunk)
        .map_err(|e| map_sql_err("list chunks", e))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| map_sql_err("list chunks", e))?);
    }
    Ok(out)
}

pub(crate) fn update_chunk_embedding_status(
    conn: &Connection,
    id: &str,
    status: EmbeddingStatus,
) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE chunks SET embedding_status = ?2 WHERE id = ?1",
            params![id, status.as_str()],
        )
        .map_err(|e| map_sql_err("update chunk embedding status", e))?;
    if changed == 0 {
        return Err(StoreError::ChunkNotFound(id.to_string()));
    }
    Ok(())
}

/// Escape a user query for FTS5 MATCH. Binding protects against SQL
/// injection but not against the FTS query mini-language, so every
/// non-bareword token is double-quoted.
fn escape_fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|token| {
            if token.chars().all(char::is_alphanumeric) {
                token.to_string()
            } else {
                format!("\"{}\"", token.replace('"', "\"\""))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A full-text hit over chunk text
#[derive(Debug, Clone)]
pub struct ChunkSearchHit {
    pub chunk_id: String,
    pub document_id: String,
    pub text: String,
    pub rank: f64,
}

pub(crate) fn search_chunks(
    conn: &Connection,
    query: &str,
    limit: u32,
) -> Result<Vec<ChunkSearchHit>> {
    let escaped = escape_fts_query(query);
    if escaped.is_empty() {
        return Ok(Vec::new());
    }
    let mut stmt = conn
        .prepare(
            "SELECT chunk_id, document_id, text, rank FROM chunks_fts \
             WHERE chunks_fts MATCH ?1 ORDER BY rank LIMIT ?2",
        )
        .map_err(|e| map_sql_err("search chunks", e))?;
    let rows = stmt
        .query_map(params![escaped, limit], |row| {
            Ok(ChunkSearchHit {
                chunk_id: row.get(0)?,
                document_id: row.get(1)?,
                text: row.get(2)?,
                rank: row.get(3)?,
            })
        })
        .map_err(|e| map_sql_err("search chunks", e))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| map_sql_err("search chunks", e))?);
    }
    debug!(query, hits = out.len(), "chunk search");
    Ok(out)
}

impl DocumentStore {
    /// Insert an OCR result; returns the stored id
    pub fn insert_ocr_result(&self, ocr: &OcrResult) -> Result<String> {
        self.with_tx(|conn| insert_ocr_result(conn, ocr))
    }

    /// Fetch an OCR result by id
    pub fn get_ocr_result(&self, id: &str) -> Result<Option<OcrResult>> {
        self.with_conn(|conn| get_ocr_result(conn, id))
    }

    /// OCR results for a document, oldest first
    pub fn ocr_results_for_document(&self, document_id: &str) -> Result<Vec<OcrResult>> {
        self.with_conn(|conn| ocr_results_for_document(conn, document_id))
    }

    /// Insert a chunk and index its text; returns the stored id
    pub fn insert_chunk(&self, chunk: &Chunk) -> Result<String> {
        self.with_tx(|conn| insert_chunk(conn, chunk))
    }

    /// Insert a batch of chunks atomically; returns the stored ids
    pub fn insert_chunks(&self, chunks: &[Chunk]) -> Result<Vec<String>> {
        self.with_tx(|conn| chunks.iter().map(|c| insert_chunk(conn, c)).collect())
    }

    /// Fetch a chunk by id
    pub fn get_chunk(&self, id: &str) -> Result<Option<Chunk>> {
        self.with_conn(|conn| get_chunk(conn, id))
    }

    /// Chunks of a document in positional order
    pub fn chunks_for_document(&self, document_id: &str) -> Result<Vec<Chunk>> {
        self.with_conn(|conn| chunks_for_document(conn, document_id))
    }

    /// Update a chunk's embedding status
    pub fn update_chunk_embedding_status(&self, id: &str, status: EmbeddingStatus) -> Result<()> {
        self.with_tx(|conn| update_chunk_embedding_status(conn, id, status))
    }

    /// Full-text search over chunk text, best matches first
    pub fn search_chunks(&self, query: &str, limit: u32) -> Result<Vec<ChunkSearchHit>> {
        self.with_conn(|conn| search_chunks(conn, query, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fts_escaping_quotes_non_barewords() {
        assert_eq!(escape_fts_query("plain words"), "plain words");
        assert_eq!(escape_fts_query("semi-colon"), "\"semi-colon\"");
        assert_eq!(escape_fts_query("say \"hi\""), "say \"\"\"hi\"\"\"");
    }
}
