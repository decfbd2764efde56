//! Extracted entity mentions, prior to knowledge-graph resolution

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

/// Category of an extracted entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Person,
    Organization,
    Date,
    Amount,
    CaseNumber,
    Location,
    Statute,
    Exhibit,
    Medication,
    Diagnosis,
    MedicalDevice,
    Other,
}

impl EntityType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Organization => "organization",
            Self::Date => "date",
            Self::Amount => "amount",
            Self::CaseNumber => "case_number",
            Self::Location => "location",
            Self::Statute => "statute",
            Self::Exhibit => "exhibit",
            Self::Medication => "medication",
            Self::Diagnosis => "diagnosis",
            Self::MedicalDevice => "medical_device",
            Self::Other => "other",
        }
    }

    /// All variants in declaration order
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[
            Self::Person,
            Self::Organization,
            Self::Date,
            Self::Amount,
            Self::CaseNumber,
            Self::Location,
            Self::Statute,
            Self::Exhibit,
            Self::Medication,
            Self::Diagnosis,
            Self::MedicalDevice,
            Self::Other,
        ]
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "person" => Ok(Self::Person),
            "organization" => Ok(Self::Organization),
            "date" => Ok(Self::Date),
            "amount" => Ok(Self::Amount),
            "case_number" => Ok(Self::CaseNumber),
            "location" => Ok(Self::Location),
            "statute" => Ok(Self::Statute),
            "exhibit" => Ok(Self::Exhibit),
            "medication" => Ok(Self::Medication),
            "diagnosis" => Ok(Self::Diagnosis),
            "medical_device" => Ok(Self::MedicalDevice),
            "other" => Ok(Self::Other),
            other => Err(StoreError::Validation(format!(
                "unknown entity type: {other}"
            ))),
        }
    }
}

/// A mention-level entity extracted from one document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub document_id: String,
    pub entity_type: EntityType,
    /// Text exactly as it appeared in the document
    pub raw_text: String,
    /// Lowercased, whitespace-collapsed form used for grouping
    pub normalized_text: String,
    pub confidence: f64,
    /// Extraction this entity came from, when schema-driven
    pub extraction_id: Option<String>,
    /// ENTITY_EXTRACTION-typed provenance row
    pub provenance_id: String,
    pub created_at: String,
}

/// One occurrence of an entity in the text
///
/// `chunk_id` is null for coreferential mentions that could not be anchored
/// to a specific chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMention {
    pub id: String,
    pub entity_id: String,
    pub chunk_id: Option<String>,
    pub page_number: Option<i64>,
    pub mention_text: Option<String>,
    pub char_start: Option<i64>,
    pub char_end: Option<i64>,
    pub created_at: String,
}

/// A contiguous text segment processed by one entity-extraction pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityExtractionSegment {
    pub id: String,
    pub document_id: String,
    pub segment_index: i64,
    pub char_start: i64,
    pub char_end: i64,
    pub entity_count: i64,
    pub created_at: String,
}

/// Normalize raw entity text for exact grouping: lowercase, collapse inner
/// whitespace, trim
#[must_use]
pub fn normalize_entity_text(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_types_round_trip() {
        for et in EntityType::all() {
            assert_eq!(et.as_str().parse::<EntityType>().unwrap(), *et);
        }
    }

    #[test]
    fn normalization_collapses_whitespace_and_case() {
        assert_eq!(normalize_entity_text("  John   SMITH "), "john smith");
    }
}
