//! Cluster, comparison, and form-fill CRUD, plus the FTS metadata counters

use rusqlite::{params, Connection, OptionalExtension, Row};

use provstore_core::error::{Result, StoreError};
use provstore_core::types::{Cluster, Comparison, DocumentClusterAssignment, FormFill};

use crate::sqlutil::map_sql_err;
use crate::store::DocumentStore;

const CLUSTER_COLUMNS: &str =
    "id, label, description, document_count, centroid_embedding_id, provenance_id, created_at";

const ASSIGNMENT_COLUMNS: &str =
    "id, document_id, cluster_id, similarity_to_centroid, assigned_at";

const COMPARISON_COLUMNS: &str = "id, document_a_id, document_b_id, comparison_type, result, \
     similarity_score, provenance_id, created_at";

fn row_to_cluster(row: &Row<'_>) -> rusqlite::Result<Cluster> {
    Ok(Cluster {
        id: row.get(0)?,
        label: row.get(1)?,
        description: row.get(2)?,
        document_count: row.get(3)?,
        centroid_embedding_id: row.get(4)?,
        provenance_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn row_to_assignment(row: &Row<'_>) -> rusqlite::Result<DocumentClusterAssignment> {
    Ok(DocumentClusterAssignment {
        id: row.get(0)?,
        document_id: row.get(1)?,
        cluster_id: row.get(2)?,
        similarity_to_centroid: row.get(3)?,
        assigned_at: row.get(4)?,
    })
}

fn row_to_comparison(row: &Row<'_>) -> rusqlite::Result<Comparison> {
    Ok(Comparison {
        id: row.get(0)?,
        document_a_id: row.get(1)?,
        document_b_id: row.get(2)?,
        comparison_type: row.get(3)?,
        result: row.get(4)?,
        similarity_score: row.get(5)?,
        provenance_id: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub(crate) fn insert_cluster(conn: &Connection, cluster: &Cluster) -> Result<String> {
    conn.execute(
        &format!("INSERT INTO clusters ({CLUSTER_COLUMNS}) VALUES (?1,?2,?3,?4,?5,?6,?7)"),
        params![
            cluster.id,
            cluster.label,
            cluster.description,
            cluster.document_count,
            cluster.centroid_embedding_id,
            cluster.provenance_id,
            cluster.created_at,
        ],
    )
    .map_err(|e| map_sql_err("insert cluster (clusters.provenance_id -> provenance.id)", e))?;
    Ok(cluster.id.clone())
}

pub(crate) fn get_cluster(conn: &Connection, id: &str) -> Result<Option<Cluster>> {
    conn.query_row(
        &format!("SELECT {CLUSTER_COLUMNS} FROM clusters WHERE id = ?1"),
        [id],
        row_to_cluster,
    )
    .optional()
    .map_err(|e| map_sql_err("get cluster", e))
}

/// Assign a document to a cluster, bumping the cluster's document count
pub(crate) fn assign_document_cluster(
    conn: &Connection,
    assignment: &DocumentClusterAssignment,
) -> Result<String> {
    conn.execute(
        &format!("INSERT INTO document_clusters ({ASSIGNMENT_COLUMNS}) VALUES (?1,?2,?3,?4,?5)"),
        params![
            assignment.id,
            assignment.document_id,
            assignment.cluster_id,
            assignment.similarity_to_centroid,
            assignment.assigned_at,
        ],
    )
    .map_err(|e| {
        map_sql_err(
            "insert cluster assignment (document_clusters.cluster_id -> clusters.id)",
            e,
        )
    })?;
    if let Some(cluster_id) = &assignment.cluster_id {
        conn.execute(
            "UPDATE clusters SET document_count = document_count + 1 WHERE id = ?1",
            [cluster_id],
        )
        .map_err(|e| map_sql_err("bump cluster document count", e))?;
    }
    Ok(assignment.id.clone())
}

pub(crate) fn assignments_for_document(
    conn: &Connection,
    document_id: &str,
) -> Result<Vec<DocumentClusterAssignment>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM document_clusters WHERE document_id = ?1 \
             ORDER BY assigned_at, id"
        ))
        .map_err(|e| map_sql_err("list cluster assignments", e))?;
    let rows = stmt
        .query_map([document_id], row_to_assignment)
        .map_err(|e| map_sql_err("list cluster assignments", e))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| map_sql_err("list cluster assignments", e))?);
    }
    Ok(out)
}

pub(crate) fn insert_comparison(conn: &Connection, comparison: &Comparison) -> Result<String> {
    conn.execute(
        &format!("INSERT INTO comparisons ({COMPARISON_COLUMNS}) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)"),
        params![
            comparison.id,
            comparison.document_a_id,
            comparison.document_b_id,
            comparison.comparison_type,
            comparison.result,
            comparison.similarity_score,
            comparison.provenance_id,
            comparison.created_at,
        ],
    )
    .map_err(|e| {
        map_sql_err("insert comparison (comparisons.document_a_id -> documents.id)", e)
    })?;
    Ok(comparison.id.clone())
}

pub(crate) fn comparisons_for_document(
    conn: &Connection,
    document_id: &str,
) -> Result<Vec<Comparison>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {COMPARISON_COLUMNS} FROM comparisons \
             WHERE document_a_id = ?1 OR document_b_id = ?1 ORDER BY created_at, id"
        ))
        .map_err(|e| map_sql_err("list comparisons", e))?;
    let rows = stmt
        .query_map([document_id], row_to_comparison)
        .map_err(|e| map_sql_err("list comparisons", e))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| map_sql_err("list comparisons", e))?);
    }
    Ok(out)
}

pub(crate) fn insert_form_fill(conn: &Connection, form_fill: &FormFill) -> Result<String> {
    conn.execute(
        "INSERT INTO form_fills (id, document_id, form_schema, filled_data, provenance_id, \
             created_at) \
         VALUES (?1,?2,?3,?4,?5,?6)",
        params![
            form_fill.id,
            form_fill.document_id,
            form_fill.form_schema,
            form_fill.filled_data,
            form_fill.provenance_id,
            form_fill.created_at,
        ],
    )
    .map_err(|e| map_sql_err("insert form_fill (form_fills.document_id -> documents.id)", e))?;
    Ok(form_fill.id.clone())
}

/// One FTS metadata counter row
#[derive(Debug, Clone)]
pub struct FtsCounter {
    pub id: i64,
    pub name: String,
    pub row_count: i64,
    pub updated_at: Option<String>,
}

pub(crate) fn fts_counters(conn: &Connection) -> Result<Vec<FtsCounter>> {
    let mut stmt = conn
        .prepare("SELECT id, name, row_count, updated_at FROM fts_metadata ORDER BY id")
        .map_err(|e| map_sql_err("read fts metadata", e))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(FtsCounter {
                id: row.get(0)?,
                name: row.get(1)?,
                row_count: row.get(2)?,
                updated_at: row.get(3)?,
            })
        })
        .map_err(|e| map_sql_err("read fts metadata", e))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| map_sql_err("read fts metadata", e))?);
    }
    Ok(out)
}

impl DocumentStore {
    /// Insert a cluster; returns the stored id
    pub fn insert_cluster(&self, cluster: &Cluster) -> Result<String> {
        self.with_tx(|conn| insert_cluster(conn, cluster))
    }

    /// Fetch a cluster by id
    pub fn get_cluster(&self, id: &str) -> Result<Option<Cluster>> {
        self.with_conn(|conn| get_cluster(conn, id))
    }

    /// Assign a document to a cluster; returns the assignment id
    pub fn assign_document_cluster(
        &self,
        assignment: &DocumentClusterAssignment,
    ) -> Result<String> {
        if assignment.assigned_at.is_empty() {
            return Err(StoreError::Validation(
                "cluster assignment requires assigned_at".to_string(),
            ));
        }
        self.with_tx(|conn| assign_document_cluster(conn, assignment))
    }

    /// Cluster assignments of a document
    pub fn assignments_for_document(
        &self,
        document_id: &str,
    ) -> Result<Vec<DocumentClusterAssignment>> {
        self.with_conn(|conn| assignments_for_document(conn, document_id))
    }

    /// Insert a comparison; returns the stored id
    pub fn insert_comparison(&self, comparison: &Comparison) -> Result<String> {
        self.with_tx(|conn| insert_comparison(conn, comparison))
    }

    /// Comparisons mentioning a document on either side
    pub fn comparisons_for_document(&self, document_id: &str) -> Result<Vec<Comparison>> {
        self.with_conn(|conn| comparisons_for_document(conn, document_id))
    }

    /// Insert a form fill; returns the stored id
    pub fn insert_form_fill(&self, form_fill: &FormFill) -> Result<String> {
        self.with_tx(|conn| insert_form_fill(conn, form_fill))
    }

    /// Current FTS metadata counters
    pub fn fts_counters(&self) -> Result<Vec<FtsCounter>> {
        self.with_conn(fts_counters)
    }
}
