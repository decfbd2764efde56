//! Shared fixtures: a fully-populated document chain

use provstore_core::hash::{compute_hash, vector_content_hash};
use provstore_core::prelude::*;
use provstore_storage::DocumentStore;

#[allow(dead_code)]
pub struct ChainFixture {
    pub document_id: String,
    pub document_provenance_id: String,
    pub ocr_id: String,
    pub chunk_ids: Vec<String>,
    pub chunk_provenance_ids: Vec<String>,
    pub embedding_ids: Vec<String>,
    pub image_id: String,
    pub entity_ids: Vec<String>,
    pub entity_provenance_id: String,
}

/// Deterministic per-tag vector
pub fn test_vector(seed: u32) -> Vec<f32> {
    (0..EMBEDDING_DIM)
        .map(|i| ((seed as f32) + (i as f32) / 1000.0).sin())
        .collect()
}

/// Insert one document with an OCR result, two chunks, two embeddings
/// (with vectors), one image whose VLM caption points at the first
/// embedding, and three entities with mentions in the first chunk.
pub fn seed_document_chain(store: &DocumentStore, tag: &str) -> ChainFixture {
    let file_body = format!("file body for {tag}");
    let file_hash = compute_hash(&file_body);

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
            file_size: file_body.len() as i64,
            file_type: "pdf".to_string(),
            page_count: Some(2),
            provenance_id: doc_prov.id.clone(),
            title: Some(format!("Title {tag}")),
            author: None,
            subject: None,
        })
        .unwrap();

    let ocr_text = format!("Recognized text for {tag}. John Smith met Acme Corp.");
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
            page_count: Some(2),
            ocr_mode: Some("balanced".to_string()),
            request_id: Some(format!("req-{tag}")),
            quality_score: Some(0.97),
            provenance_id: ocr_prov.id.clone(),
            created_at: now_timestamp(),
        })
        .unwrap();

    let mut chunk_ids = Vec::new();
    let mut chunk_provenance_ids = Vec::new();
    let mut embedding_ids = Vec::new();
    for index in 0..2i64 {
        let text = format!("chunk {index} of {tag}");
        let chunk_prov = store
            .create_provenance(
                &ProvenanceSpec::new(
                    ProvenanceType::Chunk,
                    SourceType::Chunker,
                    compute_hash(&text),
                    "chunker",
                )
                .with_parent(&ocr_prov.id),
            )
            .unwrap();
        let chunk_id = store
            .insert_chunk(&Chunk {
                id: new_id(),
                document_id: document_id.clone(),
                ocr_result_id: ocr_id.clone(),
                chunk_index: index,
                text: text.clone(),
                text_hash: compute_hash(&text),
                char_start: index * 100,
                char_end: index * 100 + 99,
                page_number: Some(index + 1),
                embedding_status: EmbeddingStatus::Pending,
                provenance_id: chunk_prov.id.clone(),
                created_at: now_timestamp(),
            })
            .unwrap();

        let vector = test_vector(index as u32);
        let embedding_prov = store
            .create_provenance(
                &ProvenanceSpec::new(
                    ProvenanceType::Embedding,
                    SourceType::EmbeddingModel,
                    vector_content_hash(&vector),
                    "embedder",
                )
                .with_parent(&chunk_prov.id),
            )
            .unwrap();
        let embedding_id = store
            .insert_embedding(&Embedding {
                id: new_id(),
                document_id: document_id.clone(),
                chunk_id: Some(chunk_id.clone()),
                image_id: None,
                extraction_id: None,
                model_name: "test-model".to_string(),
                dimension: EMBEDDING_DIM as i64,
                original_text: text,
                source_file_name: format!("{tag}.pdf"),
                source_file_path: format!("/tmp/{tag}.pdf"),
                page_number: Some(index + 1),
                content_hash: vector_content_hash(&vector),
                provenance_id: embedding_prov.id.clone(),
                created_at: now_timestamp(),
            })
            .unwrap();
        store.store_vector(&embedding_id, &vector).unwrap();
        store
            .update_chunk_embedding_status(&chunk_id, EmbeddingStatus::Complete)
            .unwrap();

        chunk_ids.push(chunk_id);
        chunk_provenance_ids.push(chunk_prov.id);
        embedding_ids.push(embedding_id);
    }

    let image_prov = store
        .create_provenance(
            &ProvenanceSpec::new(
                ProvenanceType::Image,
                SourceType::ImageExtractor,
                compute_hash(&format!("image of {tag}")),
                "image-extractor",
            )
            .with_parent(&doc_prov.id),
        )
        .unwrap();
    let image_id = store
        .insert_image(&Image {
            id: new_id(),
            document_id: document_id.clone(),
            page_number: Some(1),
            image_path: Some(format!("/tmp/{tag}-p1.png")),
            image_hash: Some(compute_hash(&format!("image of {tag}"))),
            vlm_description: Some("a signature block".to_string()),
            vlm_status: VlmStatus::Complete,
            vlm_embedding_id: Some(embedding_ids[0].clone()),
            provenance_id: image_prov.id.clone(),
            created_at: now_timestamp(),
        })
        .unwrap();

    let entity_prov = store
        .create_provenance(
            &ProvenanceSpec::new(
                ProvenanceType::EntityExtraction,
                SourceType::EntityExtractor,
                compute_hash(&format!("entities of {tag}")),
                "entity-extractor",
            )
            .with_parent(&ocr_prov.id),
        )
        .unwrap();
    let mut entity_ids = Vec::new();
    for (raw, entity_type, confidence) in [
        ("John Smith", EntityType::Person, 0.95),
        ("Acme Corp", EntityType::Organization, 0.9),
        ("2024-03-15", EntityType::Date, 0.99),
    ] {
        let entity = Entity {
            id: new_id(),
            document_id: document_id.clone(),
            entity_type,
            raw_text: raw.to_string(),
            normalized_text: provstore_core::types::normalize_entity_text(raw),
            confidence,
            extraction_id: None,
            provenance_id: entity_prov.id.clone(),
            created_at: now_timestamp(),
        };
        let mention = EntityMention {
            id: new_id(),
            entity_id: entity.id.clone(),
            chunk_id: Some(chunk_ids[0].clone()),
            page_number: Some(1),
            mention_text: Some(raw.to_string()),
            char_start: Some(0),
            char_end: Some(raw.len() as i64),
            created_at: now_timestamp(),
        };
        entity_ids.push(store.insert_entity_with_mentions(&entity, &[mention]).unwrap());
    }

    ChainFixture {
        document_id,
        document_provenance_id: doc_prov.id,
        ocr_id,
        chunk_ids,
        chunk_provenance_ids,
        embedding_ids,
        image_id,
        entity_ids,
        entity_provenance_id: entity_prov.id,
    }
}
