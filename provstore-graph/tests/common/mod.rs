//! Shared fixtures: documents with extracted entities

use provstore_core::hash::compute_hash;
use provstore_core::prelude::*;
use provstore_storage::DocumentStore;

#[allow(dead_code)]
pub struct DocFixture {
    pub document_id: String,
    pub provenance_id: String,
    pub entity_prov_id: String,
    pub entity_ids: Vec<String>,
    pub chunk_id: Option<String>,
}

/// Insert a document plus a flat list of entities, all mentioned in one
/// chunk so co-location evidence exists.
pub fn seed_doc_with_entities(
    store: &DocumentStore,
    tag: &str,
    entities: &[(&str, EntityType, f64)],
) -> DocFixture {
    let file_hash = compute_hash(&format!("body {tag}"));
    let doc_prov = store
        .create_provenance(
            &ProvenanceSpec::new(
                ProvenanceType::Document,
                SourceType::FileUpload,
                file_hash.clone(),
                "ingest",
            )
            .with_file_hash(file_hash.clone()),
        )
        .unwrap();
    let document_id = store
        .insert_document(&NewDocument {
            file_path: format!("/tmp/{tag}.pdf"),
            file_name: format!("{tag}.pdf"),
            file_hash,
            file_size: 64,
            file_type: "pdf".to_string(),
            page_count: Some(1),
            provenance_id: doc_prov.id.clone(),
            title: None,
            author: None,
            subject: None,
        })
        .unwrap();

    let ocr_text = format!("text of {tag}");
    let ocr_prov = store
        .create_provenance(
            &ProvenanceSpec::new(
                ProvenanceType::OcrResult,
                SourceType::OcrProcessor,
                compute_hash(&ocr_text),
                "ocr-engine",
            )
            .with_parent(&doc_prov.id),
        )
        .unwrap();
    let ocr_id = store
        .insert_ocr_result(&OcrResult {
            id: new_id(),
            document_id: document_id.clone(),
            extracted_text: ocr_text.clone(),
            page_count: Some(1),
            ocr_mode: None,
            request_id: None,
            quality_score: None,
            provenance_id: ocr_prov.id.clone(),
            created_at: now_timestamp(),
        })
        .unwrap();

    let chunk_prov = store
        .create_provenance(
            &ProvenanceSpec::new(
                ProvenanceType::Chunk,
                SourceType::Chunker,
                compute_hash(&ocr_text),
                "chunker",
            )
            .with_parent(&ocr_prov.id),
        )
        .unwrap();
    let chunk_id = store
        .insert_chunk(&Chunk {
            id: new_id(),
            document_id: document_id.clone(),
            ocr_result_id: ocr_id,
            chunk_index: 0,
            text: ocr_text.clone(),
            text_hash: compute_hash(&ocr_text),
            char_start: 0,
            char_end: ocr_text.len() as i64,
            page_number: Some(1),
            embedding_status: EmbeddingStatus::Pending,
            provenance_id: chunk_prov.id,
            created_at: now_timestamp(),
        })
        .unwrap();

    let entity_prov = store
        .create_provenance(
            &ProvenanceSpec::new(
                ProvenanceType::EntityExtraction,
                SourceType::EntityExtractor,
                compute_hash(&format!("entities {tag}")),
                "entity-extractor",
            )
            .with_parent(&ocr_prov.id),
        )
        .unwrap();

    let mut entity_ids = Vec::new();
    for (raw, entity_type, confidence) in entities {
        let entity = Entity {
            id: new_id(),
            document_id: document_id.clone(),
            entity_type: *entity_type,
            raw_text: (*raw).to_string(),
            normalized_text: normalize_entity_text(raw),
            confidence: *confidence,
            extraction_id: None,
            provenance_id: entity_prov.id.clone(),
            created_at: now_timestamp(),
        };
        let mention = EntityMention {
            id: new_id(),
            entity_id: entity.id.clone(),
            chunk_id: Some(chunk_id.clone()),
            page_number: Some(1),
            mention_text: Some((*raw).to_string()),
            char_start: None,
            char_end: None,
            created_at: now_timestamp(),
        };
        entity_ids.push(store.insert_entity_with_mentions(&entity, &[mention]).unwrap());
    }

    DocFixture {
        document_id,
        provenance_id: doc_prov.id,
        entity_prov_id: entity_prov.id,
        entity_ids,
        chunk_id: Some(chunk_id),
    }
}
