//! Entity, mention, and extraction-segment CRUD

use rusqlite::{params, Connection, OptionalExtension, Row};

use provstore_core::error::Result;
use provstore_core::types::{now_timestamp, Entity, EntityExtractionSegment, EntityMention};

use crate::dal::parse_enum;
use crate::sqlutil::map_sql_err;
use crate::store::DocumentStore;

const ENTITY_COLUMNS: &str = "id, document_id, entity_type, raw_text, normalized_text, \
     confidence, extraction_id, provenance_id, created_at";

const MENTION_COLUMNS: &str =
    "id, entity_id, chunk_id, page_number, mention_text, char_start, char_end, created_at";

fn row_to_entity(row: &Row<'_>) -> rusqlite::Result<Entity> {
    Ok(Entity {
        id: row.get(0)?,
        document_id: row.get(1)?,
        entity_type: parse_enum(2, &row.get::<_, String>(2)?)?,
        raw_text: row.get(3)?,
        normalized_text: row.get(4)?,
        confidence: row.get(5)?,
        extraction_id: row.get(6)?,
        provenance_id: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn row_to_mention(row: &Row<'_>) -> rusqlite::Result<EntityMention> {
    Ok(EntityMention {
        id: row.get(0)?,
        entity_id: row.get(1)?,
        chunk_id: row.get(2)?,
        page_number: row.get(3)?,
        mention_text: row.get(4)?,
        char_start: row.get(5)?,
        char_end: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub(crate) fn insert_entity(conn: &Connection, entity: &Entity) -> Result<String> {
    conn.execute(
        &format!("INSERT INTO entities ({ENTITY_COLUMNS}) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)"),
        params![
            entity.id,
            entity.document_id,
            entity.entity_type.as_str(),
            entity.raw_text,
            entity.normalized_text,
            entity.confidence,
            entity.extraction_id,
            entity.provenance_id,
            entity.created_at,
        ],
    )
    .map_err(|e| map_sql_err("insert entity (entities.document_id -> documents.id)", e))?;
    conn.execute(
        "UPDATE fts_metadata SET row_count = row_count + 1, updated_at = ?1 WHERE id = 3",
        [now_timestamp()],
    )
    .map_err(|e| map_sql_err("bump entity count", e))?;
    Ok(entity.id.clone())
}

pub(crate) fn get_entity(conn: &Connection, id: &str) -> Result<Option<Entity>> {
    conn.query_row(
        &format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE id = ?1"),
        [id],
        row_to_entity,
    )
    .optional()
    .map_err(|e| map_sql_err("get entity", e))
}

pub(crate) fn entities_for_document(conn: &Connection, document_id: &str) -> Result<Vec<Entity>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {ENTITY_COLUMNS} FROM entities WHERE document_id = ?1 ORDER BY created_at, id"
        ))
        .map_err(|e| map_sql_err("list entities", e))?;
    let rows = stmt
        .query_map([document_id], row_to_entity)
        .map_err(|e| map_sql_err("list entities", e))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| map_sql_err("list entities", e))?);
    }
    Ok(out)
}

/// Every entity in the store, in insertion (rowid) order. The knowledge
/// graph builder loads this once per build.
pub(crate) fn all_entities(conn: &Connection) -> Result<Vec<Entity>> {
    let mut stmt = conn
        .prepare(&format!("SELECT {ENTITY_COLUMNS} FROM entities ORDER BY rowid"))
        .map_err(|e| map_sql_err("list all entities", e))?;
    let rows = stmt
        .query_map([], row_to_entity)
        .map_err(|e| map_sql_err("list all entities", e))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| map_sql_err("list all entities", e))?);
    }
    Ok(out)
}

pub(crate) fn count_entities(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM entities", [], |r| r.get(0))
        .map_err(|e| map_sql_err("count entities", e))
}

pub(crate) fn insert_entity_mention(conn: &Connection, mention: &EntityMention) -> Result<String> {
    conn.execute(
        &format!("INSERT INTO entity_mentions ({MENTION_COLUMNS}) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)"),
        params![
            mention.id,
            mention.entity_id,
            mention.chunk_id,
            mention.page_number,
            mention.mention_text,
            mention.char_start,
            mention.char_end,
            mention.created_at,
        ],
    )
    .map_err(|e| map_sql_err("insert entity_mention (entity_mentions.entity_id -> entities.id)", e))?;
    Ok(mention.id.clone())
}

pub(crate) fn mentions_for_entity(conn: &Connection, entity_id: &str) -> Result<Vec<EntityMention>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {MENTION_COLUMNS} FROM entity_mentions WHERE entity_id = ?1 ORDER BY created_at, id"
        ))
        .map_err(|e| map_sql_err("list mentions", e))?;
    let rows = stmt
        .query_map([entity_id], row_to_mention)
        .map_err(|e| map_sql_err("list mentions", e))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| map_sql_err("list mentions", e))?);
    }
    Ok(out)
}

/// Chunk ids each entity is mentioned in, for co-location edge generation.
/// Returns `(entity_id, chunk_id)` pairs for anchored mentions only.
pub(crate) fn mention_chunk_pairs(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut stmt = conn
        .prepare(
            "SELECT entity_id, chunk_id FROM entity_mentions WHERE chunk_id IS NOT NULL \
             ORDER BY rowid",
        )
        .map_err(|e| map_sql_err("list mention chunks", e))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(|e| map_sql_err("list mention chunks", e))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| map_sql_err("list mention chunks", e))?);
    }
    Ok(out)
}

pub(crate) fn insert_extraction_segment(
    conn: &Connection,
    segment: &EntityExtractionSegment,
) -> Result<String> {
    conn.execute(
        "INSERT INTO entity_extraction_segments (id, document_id, segment_index, char_start, \
             char_end, entity_count, created_at) \
         VALUES (?1,?2,?3,?4,?5,?6,?7)",
        params![
            segment.id,
            segment.document_id,
            segment.segment_index,
            segment.char_start,
            segment.char_end,
            segment.entity_count,
            segment.created_at,
        ],
    )
    .map_err(|e| {
        map_sql_err(
            "insert extraction segment (entity_extraction_segments.document_id -> documents.id)",
            e,
        )
    })?;
    Ok(segment.id.clone())
}

impl DocumentStore {
    /// Insert an entity; returns the stored id
    pub fn insert_entity(&self, entity: &Entity) -> Result<String> {
        self.with_tx(|conn| insert_entity(conn, entity))
    }

    /// Insert an entity together with its mentions, atomically
    pub fn insert_entity_with_mentions(
        &self,
        entity: &Entity,
        mentions: &[EntityMention],
    ) -> Result<String> {
        self.with_tx(|conn| {
            let id = insert_entity(conn, entity)?;
            for mention in mentions {
                insert_entity_mention(conn, mention)?;
            }
            Ok(id)
        })
    }

    /// Fetch an entity by id
    pub fn get_entity(&self, id: &str) -> Result<Option<Entity>> {
        self.with_conn(|conn| get_entity(conn, id))
    }

    /// Entities of a document, oldest first
    pub fn entities_for_document(&self, document_id: &str) -> Result<Vec<Entity>> {
        self.with_conn(|conn| entities_for_document(conn, document_id))
    }

    /// Every entity in the store, in insertion order
    pub fn all_entities(&self) -> Result<Vec<Entity>> {
        self.with_conn(all_entities)
    }

    /// Total number of entities
    pub fn count_entities(&self) -> Result<i64> {
        self.with_conn(count_entities)
    }

    /// Mentions of an entity, oldest first
    pub fn mentions_for_entity(&self, entity_id: &str) -> Result<Vec<EntityMention>> {
        self.with_conn(|conn| mentions_for_entity(conn, entity_id))
    }

    /// `(entity_id, chunk_id)` pairs for every anchored mention
    pub fn mention_chunk_pairs(&self) -> Result<Vec<(String, String)>> {
        self.with_conn(mention_chunk_pairs)
    }

    /// Record an entity-extraction segment
    pub fn insert_extraction_segment(&self, segment: &EntityExtractionSegment) -> Result<String> {
        self.with_tx(|conn| insert_extraction_segment(conn, segment))
    }
}
