//! Resolved knowledge-graph records and per-document computed artifacts

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;
use crate::types::EntityType;

/// How a node or link was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    Exact,
    Fuzzy,
    Containment,
}

impl ResolutionMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fuzzy => "fuzzy",
            Self::Containment => "containment",
        }
    }
}

impl FromStr for ResolutionMethod {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "exact" => Ok(Self::Exact),
            "fuzzy" => Ok(Self::Fuzzy),
            "containment" => Ok(Self::Containment),
            other => Err(StoreError::Validation(format!(
                "unknown resolution method: {other}"
            ))),
        }
    }
}

/// Relationship classification on a knowledge edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    CoMentioned,
    CoLocated,
    WorksAt,
    Represents,
    LocatedIn,
    FiledIn,
    Cites,
    References,
    PartyTo,
    RelatedTo,
    Precedes,
    OccurredAt,
    TreatedWith,
    AdministeredVia,
    ManagedBy,
    InteractsWith,
    SameAs,
    ParentOf,
    ChildOf,
    PartOf,
    HasPart,
    PrecededBy,
    FollowedBy,
    ReferencedIn,
    SignedBy,
}

impl RelationshipType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CoMentioned => "co_mentioned",
            Self::CoLocated => "co_located",
            Self::WorksAt => "works_at",
            Self::Represents => "represents",
            Self::LocatedIn => "located_in",
            Self::FiledIn => "filed_in",
            Self::Cites => "cites",
            Self::References => "references",
            Self::PartyTo => "party_to",
            Self::RelatedTo => "related_to",
            Self::Precedes => "precedes",
            Self::OccurredAt => "occurred_at",
            Self::TreatedWith => "treated_with",
            Self::AdministeredVia => "administered_via",
            Self::ManagedBy => "managed_by",
            Self::InteractsWith => "interacts_with",
            Self::SameAs => "same_as",
            Self::ParentOf => "parent_of",
            Self::ChildOf => "child_of",
            Self::PartOf => "part_of",
            Self::HasPart => "has_part",
            Self::PrecededBy => "preceded_by",
            Self::FollowedBy => "followed_by",
            Self::ReferencedIn => "referenced_in",
            Self::SignedBy => "signed_by",
        }
    }

    /// All variants in declaration order
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[
            Self::CoMentioned,
            Self::CoLocated,
            Self::WorksAt,
            Self::Represents,
            Self::LocatedIn,
            Self::FiledIn,
            Self::Cites,
            Self::References,
            Self::PartyTo,
            Self::RelatedTo,
            Self::Precedes,
            Self::OccurredAt,
            Self::TreatedWith,
            Self::AdministeredVia,
            Self::ManagedBy,
            Self::InteractsWith,
            Self::SameAs,
            Self::ParentOf,
            Self::ChildOf,
            Self::PartOf,
            Self::HasPart,
            Self::PrecededBy,
            Self::FollowedBy,
            Self::ReferencedIn,
            Self::SignedBy,
        ]
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|rt| rt.as_str() == value)
            .copied()
            .ok_or_else(|| StoreError::Validation(format!("unknown relationship type: {value}")))
    }
}

/// A resolved entity in the knowledge graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeNode {
    pub id: String,
    pub entity_type: EntityType,
    /// Raw text of the highest-confidence member of the equivalence class
    pub canonical_name: String,
    pub normalized_name: String,
    /// Other raw spellings merged into this node
    pub aliases: Vec<String>,
    /// Distinct documents contributing members; a node at zero is deleted
    pub document_count: i64,
    pub mention_count: i64,
    pub edge_count: i64,
    pub avg_confidence: f64,
    pub importance_score: f64,
    pub resolution_type: ResolutionMethod,
    pub metadata: serde_json::Value,
    /// KNOWLEDGE_GRAPH-typed provenance row
    pub provenance_id: String,
    pub created_at: String,
}

/// A typed relationship between two knowledge nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEdge {
    pub id: String,
    pub source_node_id: String,
    pub target_node_id: String,
    pub relationship_type: RelationshipType,
    /// In (0, 1]
    pub weight: f64,
    pub evidence_count: i64,
    /// Distinct documents whose entities support this edge
    pub document_ids: Vec<String>,
    pub metadata: serde_json::Value,
    pub valid_from: Option<String>,
    pub valid_until: Option<String>,
    pub normalized_weight: Option<f64>,
    pub contradiction_count: i64,
    pub created_at: String,
}

/// Many-to-one link from a per-document entity to its resolved node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeEntityLink {
    pub id: String,
    pub node_id: String,
    /// Unique: each entity resolves to exactly one node
    pub entity_id: String,
    pub document_id: String,
    pub similarity_score: f64,
    pub resolution_method: ResolutionMethod,
    pub created_at: String,
}

/// A document cluster produced by the clustering pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub document_count: i64,
    pub centroid_embedding_id: Option<String>,
    pub provenance_id: Option<String>,
    pub created_at: String,
}

/// Assignment of a document to a cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentClusterAssignment {
    pub id: String,
    pub document_id: String,
    pub cluster_id: Option<String>,
    pub similarity_to_centroid: f64,
    pub assigned_at: String,
}

/// A pairwise document comparison result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comparison {
    pub id: String,
    pub document_a_id: String,
    pub document_b_id: String,
    pub comparison_type: Option<String>,
    /// Result payload as JSON text
    pub result: Option<String>,
    pub similarity_score: Option<f64>,
    pub provenance_id: Option<String>,
    pub created_at: String,
}

/// A form filled from a document's extracted data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormFill {
    pub id: String,
    pub document_id: String,
    pub form_schema: String,
    pub filled_data: String,
    pub provenance_id: Option<String>,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relationship_types_round_trip() {
        for rt in RelationshipType::all() {
            assert_eq!(rt.as_str().parse::<RelationshipType>().unwrap(), *rt);
        }
        assert_eq!(RelationshipType::all().len(), 25);
    }
}
