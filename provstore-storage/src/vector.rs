//! Vector storage over the vec0 virtual table
//!
//! Vectors are fixed-dimension float32, keyed by embedding id. The adapter
//! does not own the ids; they come from the embeddings table, and a vector
//! row without a matching embedding row is an integrity bug that the
//! cascade controller cleans up.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;
use zerocopy::{FromBytes, IntoBytes};

use provstore_core::error::{Result, StoreError};
use provstore_core::EMBEDDING_DIM;

use crate::sqlutil::map_sql_err;
use crate::store::DocumentStore;

/// One k-NN hit, nearest first
#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub embedding_id: String,
    pub distance: f64,
}

fn vector_to_blob(vector: &[f32]) -> &[u8] {
    vector.as_bytes()
}

fn blob_to_vector(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(StoreError::Storage(format!(
            "vector blob length {} is not a multiple of 4",
            blob.len()
        )));
    }
    match <[f32]>::ref_from_bytes(blob) {
        Ok(slice) => Ok(slice.to_vec()),
        Err(_) => {
            // Blob came back misaligned; copy through an aligned buffer.
            let mut out = vec![0f32; blob.len() / 4];
            out.as_mut_slice().as_mut_bytes().copy_from_slice(blob);
            Ok(out)
        }
    }
}

fn check_dimension(vector: &[f32]) -> Result<()> {
    if vector.len() == EMBEDDING_DIM {
        Ok(())
    } else {
        Err(StoreError::Validation(format!(
            "vector has {} dimensions, expected {EMBEDDING_DIM}",
            vector.len()
        )))
    }
}

pub(crate) fn vector_store(conn: &Connection, embedding_id: &str, vector: &[f32]) -> Result<()> {
    check_dimension(vector)?;
    // vec0 has no upsert; replace by delete-then-insert.
    conn.execute(
        "DELETE FROM vec_embeddings WHERE embedding_id = ?1",
        [embedding_id],
    )
    .map_err(|e| map_sql_err("replace vector", e))?;
    conn.execute(
        "INSERT INTO vec_embeddings (embedding_id, vector) VALUES (?1, ?2)",
        params![embedding_id, vector_to_blob(vector)],
    )
    .map_err(|e| map_sql_err("store vector", e))?;
    Ok(())
}

pub(crate) fn vector_get(conn: &Connection, embedding_id: &str) -> Result<Option<Vec<f32>>> {
    let blob: Option<Vec<u8>> = conn
        .query_row(
            "SELECT vector FROM vec_embeddings WHERE embedding_id = ?1",
            [embedding_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(|e| map_sql_err("get vector", e))?;
    blob.map(|b| blob_to_vector(&b)).transpose()
}

pub(crate) fn vector_delete(conn: &Connection, embedding_id: &str) -> Result<bool> {
    let deleted = conn
        .execute(
            "DELETE FROM vec_embeddings WHERE embedding_id = ?1",
            [embedding_id],
        )
        .map_err(|e| map_sql_err("delete vector", e))?;
    Ok(deleted > 0)
}

pub(crate) fn vector_count(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM vec_embeddings", [], |r| r.get(0))
        .map_err(|e| map_sql_err("count vectors", e))
}

/// Delete every vector belonging to a document's embeddings. The id set
/// stays inside SQLite; nothing is materialized in application memory.
pub(crate) fn delete_vectors_for_document(conn: &Connection, document_id: &str) -> Result<usize> {
    conn.execute(
        "DELETE FROM vec_embeddings WHERE embedding_id IN (
             SELECT id FROM embeddings WHERE document_id = ?1)",
        [document_id],
    )
    .map_err(|e| map_sql_err("delete document vectors", e))
}

pub(crate) fn vector_knn(
    conn: &Connection,
    query: &[f32],
    limit: u32,
    document_filter: Option<&str>,
) -> Result<Vec<VectorMatch>> {
    check_dimension(query)?;
    // With a document filter the k-NN pass over-fetches, then the join
    // prunes; k stays bounded either way.
    let k = if document_filter.is_some() {
        limit.saturating_mul(8).max(limit)
    } else {
        limit
    };

    let mut stmt = conn
        .prepare(
            "SELECT embedding_id, distance FROM vec_embeddings \
             WHERE vector MATCH ?1 AND k = ?2 ORDER BY distance",
        )
        .map_err(|e| map_sql_err("knn search", e))?;
    let rows = stmt
        .query_map(params![vector_to_blob(query), k], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })
        .map_err(|e| map_sql_err("knn search", e))?;

    let mut hits: Vec<(String, f64)> = Vec::new();
    for row in rows {
        hits.push(row.map_err(|e| map_sql_err("knn search", e))?);
    }
    // Deterministic tie-break: embedding id within equal distances.
    hits.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    let mut out = Vec::new();
    for (embedding_id, distance) in hits {
        if let Some(document_id) = document_filter {
            let owned: Option<String> = conn
                .query_row(
                    "SELECT id FROM embeddings WHERE id = ?1 AND document_id = ?2",
                    params![embedding_id, document_id],
                    |r| r.get(0),
                )
                .optional()
                .map_err(|e| map_sql_err("knn filter", e))?;
            if owned.is_none() {
                continue;
            }
        }
        out.push(VectorMatch {
            embedding_id,
            distance,
        });
        if out.len() as u32 >= limit {
            break;
        }
    }
    debug!(hits = out.len(), limit, "knn search complete");
    Ok(out)
}

impl DocumentStore {
    /// Store (or replace) the vector for an embedding id
    pub fn store_vector(&self, embedding_id: &str, vector: &[f32]) -> Result<()> {
        self.with_tx(|conn| vector_store(conn, embedding_id, vector))
    }

    /// Fetch a stored vector
    pub fn get_vector(&self, embedding_id: &str) -> Result<Option<Vec<f32>>> {
        self.with_conn(|conn| vector_get(conn, embedding_id))
    }

    /// Delete a stored vector; returns whether a row was removed
    pub fn delete_vector(&self, embedding_id: &str) -> Result<bool> {
        self.with_tx(|conn| vector_delete(conn, embedding_id))
    }

    /// Number of stored vectors
    pub fn vector_count(&self) -> Result<i64> {
        self.with_conn(vector_count)
    }

    /// Nearest neighbors of `query`, ascending by distance; ties resolve in
    /// insertion order. `document_filter` restricts hits to one document's
    /// embeddings.
    pub fn knn(
        &self,
        query: &[f32],
        limit: u32,
        document_filter: Option<&str>,
    ) -> Result<Vec<VectorMatch>> {
        self.with_conn(|conn| vector_knn(conn, query, limit, document_filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_round_trip() {
        let v = vec![1.0f32; EMBEDDING_DIM];
        let blob = vector_to_blob(&v).to_vec();
        assert_eq!(blob.len(), EMBEDDING_DIM * 4);
        assert_eq!(blob_to_vector(&blob).unwrap(), v);
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let store = DocumentStore::in_memory().unwrap();
        let err = store.store_vector("e1", &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn store_get_delete_and_knn() {
        let store = DocumentStore::in_memory().unwrap();

        let mut a = vec![0.0f32; EMBEDDING_DIM];
        a[0] = 1.0;
        let mut b = vec![0.0f32; EMBEDDING_DIM];
        b[1] = 1.0;

        store.store_vector("ea", &a).unwrap();
        store.store_vector("eb", &b).unwrap();
        assert_eq!(store.vector_count().unwrap(), 2);
        assert_eq!(store.get_vector("ea").unwrap().unwrap(), a);

        let hits = store.knn(&a, 2, None).unwrap();
        assert_eq!(hits[0].embedding_id, "ea");
        assert!(hits[0].distance < hits[1].distance);

        assert!(store.delete_vector("ea").unwrap());
        assert!(!store.delete_vector("ea").unwrap());
        assert_eq!(store.vector_count().unwrap(), 1);
    }
}
