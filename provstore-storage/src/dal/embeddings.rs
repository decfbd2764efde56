//! Embedding, image, extraction, and uploaded-file CRUD

use rusqlite::{params, Connection, OptionalExtension, Row};

use provstore_core::error::{Result, StoreError};
use provstore_core::types::{Embedding, Extraction, Image, UploadedFile, VlmStatus};

use crate::dal::parse_enum;
use crate::sqlutil::map_sql_err;
use crate::store::DocumentStore;

const EMBEDDING_COLUMNS: &str = "id, document_id, chunk_id, image_id, extraction_id, model_name, \
     dimension, original_text, source_file_name, source_file_path, page_number, content_hash, \
     provenance_id, created_at";

const IMAGE_COLUMNS: &str = "id, document_id, page_number, image_path, image_hash, \
     vlm_description, vlm_status, vlm_embedding_id, provenance_id, created_at";

const EXTRACTION_COLUMNS: &str =
    "id, document_id, schema_name, extracted_data, confidence, provenance_id, created_at";

fn row_to_embedding(row: &Row<'_>) -> rusqlite::Result<Embedding> {
    Ok(Embedding {
        id: row.get(0)?,
        document_id: row.get(1)?,
        chunk_id: row.get(2)?,
        image_id: row.get(3)?,
        extraction_id: row.get(4)?,
        model_name: row.get(5)?,
        dimension: row.get(6)?,
        original_text: row.get(7)?,
        source_file_name: row.get(8)?,
        source_file_path: row.get(9)?,
        page_number: row.get(10)?,
        content_hash: row.get(11)?,
        provenance_id: row.get(12)?,
        created_at: row.get(13)?,
    })
}

fn row_to_image(row: &Row<'_>) -> rusqlite::Result<Image> {
    Ok(Image {
        id: row.get(0)?,
        document_id: row.get(1)?,
        page_number: row.get(2)?,
        image_path: row.get(3)?,
        image_hash: row.get(4)?,
        vlm_description: row.get(5)?,
        vlm_status: parse_enum(6, &row.get::<_, String>(6)?)?,
        vlm_embedding_id: row.get(7)?,
        provenance_id: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn row_to_extraction(row: &Row<'_>) -> rusqlite::Result<Extraction> {
    Ok(Extraction {
        id: row.get(0)?,
        document_id: row.get(1)?,
        schema_name: row.get(2)?,
        extracted_data: row.get(3)?,
        confidence: row.get(4)?,
        provenance_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub(crate) fn insert_embedding(conn: &Connection, embedding: &Embedding) -> Result<String> {
    let sources = [
        embedding.chunk_id.is_some(),
        embedding.image_id.is_some(),
        embedding.extraction_id.is_some(),
    ]
    .iter()
    .filter(|set| **set)
    .count();
    if sources != 1 {
        return Err(StoreError::Validation(format!(
            "embedding {} must have exactly one of chunk_id/image_id/extraction_id, got {sources}",
            embedding.id
        )));
    }

    conn.execute(
        &format!(
            "INSERT INTO embeddings ({EMBEDDING_COLUMNS}) \
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)"
        ),
        params![
            embedding.id,
            embedding.document_id,
            embedding.chunk_id,
            embedding.image_id,
            embedding.extraction_id,
            embedding.model_name,
            embedding.dimension,
            embedding.original_text,
            embedding.source_file_name,
            embedding.source_file_path,
            embedding.page_number,
            embedding.content_hash,
            embedding.provenance_id,
            embedding.created_at,
        ],
    )
    .map_err(|e| map_sql_err("insert embedding (embeddings.chunk_id -> chunks.id)", e))?;
    Ok(embedding.id.clone())
}

pub(crate) fn get_embedding(conn: &Connection, id: &str) -> Result<Option<Embedding>> {
    conn.query_row(
        &format!("SELECT {EMBEDDING_COLUMNS} FROM embeddings WHERE id = ?1"),
        [id],
        row_to_embedding,
    )
    .optional()
    .map_err(|e| map_sql_err("get embedding", e))
}

pub(crate) fn embeddings_for_document(
    conn: &Connection,
    document_id: &str,
) -> Result<Vec<Embedding>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {EMBEDDING_COLUMNS} FROM embeddings WHERE document_id = ?1 ORDER BY created_at, id"
        ))
        .map_err(|e| map_sql_err("list embeddings", e))?;
    let rows = stmt
        .query_map([document_id], row_to_embedding)
        .map_err(|e| map_sql_err("list embeddings", e))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| map_sql_err("list embeddings", e))?);
    }
    Ok(out)
}

pub(crate) fn count_embeddings_for_document(conn: &Connection, document_id: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM embeddings WHERE document_id = ?1",
        [document_id],
        |r| r.get(0),
    )
    .map_err(|e| map_sql_err("count embeddings", e))
}

pub(crate) fn insert_image(conn: &Connection, image: &Image) -> Result<String> {
    conn.execute(
        &format!("INSERT INTO images ({IMAGE_COLUMNS}) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)"),
        params![
            image.id,
            image.document_id,
            image.page_number,
            image.image_path,
            image.image_hash,
            image.vlm_description,
            image.vlm_status.as_str(),
            image.vlm_embedding_id,
            image.provenance_id,
            image.created_at,
        ],
    )
    .map_err(|e| map_sql_err("insert image (images.vlm_embedding_id -> embeddings.id)", e))?;
    Ok(image.id.clone())
}

pub(crate) fn get_image(conn: &Connection, id: &str) -> Result<Option<Image>> {
    conn.query_row(
        &format!("SELECT {IMAGE_COLUMNS} FROM images WHERE id = ?1"),
        [id],
        row_to_image,
    )
    .optional()
    .map_err(|e| map_sql_err("get image", e))
}

pub(crate) fn images_for_document(conn: &Connection, document_id: &str) -> Result<Vec<Image>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images WHERE document_id = ?1 ORDER BY page_number, id"
        ))
        .map_err(|e| map_sql_err("list images", e))?;
    let rows = stmt
        .query_map([document_id], row_to_image)
        .map_err(|e| map_sql_err("list images", e))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| map_sql_err("list images", e))?);
    }
    Ok(out)
}

pub(crate) fn update_image_vlm(
    conn: &Connection,
    id: &str,
    description: Option<&str>,
    status: VlmStatus,
    vlm_embedding_id: Option<&str>,
) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE images SET vlm_description = ?2, vlm_status = ?3, vlm_embedding_id = ?4 \
             WHERE id = ?1",
            params![id, description, status.as_str(), vlm_embedding_id],
        )
        .map_err(|e| map_sql_err("update image vlm", e))?;
    if changed == 0 {
        return Err(StoreError::NotFound {
            entity: "image",
            id: id.to_string(),
        });
    }
    Ok(())
}

pub(crate) fn insert_extraction(conn: &Connection, extraction: &Extraction) -> Result<String> {
    conn.execute(
        &format!("INSERT INTO extractions ({EXTRACTION_COLUMNS}) VALUES (?1,?2,?3,?4,?5,?6,?7)"),
        params![
            extraction.id,
            extraction.document_id,
            extraction.schema_name,
            extraction.extracted_data,
            extraction.confidence,
            extraction.provenance_id,
            extraction.created_at,
        ],
    )
    .map_err(|e| map_sql_err("insert extraction (extractions.document_id -> documents.id)", e))?;
    Ok(extraction.id.clone())
}

pub(crate) fn extractions_for_document(
    conn: &Connection,
    document_id: &str,
) -> Result<Vec<Extraction>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {EXTRACTION_COLUMNS} FROM extractions WHERE document_id = ?1 ORDER BY created_at, id"
        ))
        .map_err(|e| map_sql_err("list extractions", e))?;
    let rows = stmt
        .query_map([document_id], row_to_extraction)
        .map_err(|e| map_sql_err("list extractions", e))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| map_sql_err("list extractions", e))?);
    }
    Ok(out)
}

pub(crate) fn insert_uploaded_file(conn: &Connection, upload: &UploadedFile) -> Result<String> {
    conn.execute(
        "INSERT INTO uploaded_files (id, document_id, remote_id, file_name, status, uploaded_at, \
             created_at) \
         VALUES (?1,?2,?3,?4,?5,?6,?7)",
        params![
            upload.id,
            upload.document_id,
            upload.remote_id,
            upload.file_name,
            upload.status,
            upload.uploaded_at,
            upload.created_at,
        ],
    )
    .map_err(|e| map_sql_err("insert uploaded_file (uploaded_files.document_id -> documents.id)", e))?;
    Ok(upload.id.clone())
}

impl DocumentStore {
    /// Insert an embedding row; returns the stored id.
    ///
    /// Exactly one of `chunk_id`/`image_id`/`extraction_id` must be set.
    pub fn insert_embedding(&self, embedding: &Embedding) -> Result<String> {
        self.with_tx(|conn| insert_embedding(conn, embedding))
    }

    /// Fetch an embedding by id
    pub fn get_embedding(&self, id: &str) -> Result<Option<Embedding>> {
        self.with_conn(|conn| get_embedding(conn, id))
    }

    /// Embeddings of a document, oldest first
    pub fn embeddings_for_document(&self, document_id: &str) -> Result<Vec<Embedding>> {
        self.with_conn(|conn| embeddings_for_document(conn, document_id))
    }

    /// Insert an image; returns the stored id
    pub fn insert_image(&self, image: &Image) -> Result<String> {
        self.with_tx(|conn| insert_image(conn, image))
    }

    /// Fetch an image by id
    pub fn get_image(&self, id: &str) -> Result<Option<Image>> {
        self.with_conn(|conn| get_image(conn, id))
    }

    /// Images of a document in page order
    pub fn images_for_document(&self, document_id: &str) -> Result<Vec<Image>> {
        self.with_conn(|conn| images_for_document(conn, document_id))
    }

    /// Update an image's VLM caption fields
    pub fn update_image_vlm(
        &self,
        id: &str,
        description: Option<&str>,
        status: VlmStatus,
        vlm_embedding_id: Option<&str>,
    ) -> Result<()> {
        self.with_tx(|conn| update_image_vlm(conn, id, description, status, vlm_embedding_id))
    }

    /// Insert an extraction; returns the stored id
    pub fn insert_extraction(&self, extraction: &Extraction) -> Result<String> {
        self.with_tx(|conn| insert_extraction(conn, extraction))
    }

    /// Extractions of a document, oldest first
    pub fn extractions_for_document(&self, document_id: &str) -> Result<Vec<Extraction>> {
        self.with_conn(|conn| extractions_for_document(conn, document_id))
    }

    /// Record a file handed to the external file manager
    pub fn insert_uploaded_file(&self, upload: &UploadedFile) -> Result<String> {
        self.with_tx(|conn| insert_uploaded_file(conn, upload))
    }
}
