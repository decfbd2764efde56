//! Edge generation
//!
//! Three additive sources: document co-mention, chunk co-location, and a
//! static rule table keyed by unordered entity-type pair. Duplicate
//! `(source, target, relationship)` candidates coalesce by keeping the
//! maximum weight and accumulating evidence. Extraction-schema membership
//! and a cluster hint can override rule weights upward.

use std::collections::{BTreeSet, HashMap};

use serde_json::json;
use tracing::debug;

use provstore_core::types::{
    new_id, now_timestamp, EntityType, KnowledgeEdge, RelationshipType,
};

use crate::temporal::{narrow_validity, parse_date};

/// Weight floor applied when both entities come from the same extraction
const EXTRACTION_OVERRIDE_BASE: f64 = 0.85;

/// Weight applied when an extraction confirms an existing rule match
const EXTRACTION_OVERRIDE_RULED: f64 = 0.90;

/// Weight floor applied by a matching cluster hint
const CLUSTER_HINT_WEIGHT: f64 = 0.88;

/// Per-node inputs for edge generation
#[derive(Debug, Clone)]
pub(crate) struct NodeSeed {
    pub node_id: String,
    pub entity_type: EntityType,
    pub canonical_name: String,
    pub document_ids: Vec<String>,
    pub extraction_ids: BTreeSet<String>,
    pub chunk_ids: BTreeSet<String>,
}

struct EdgeRule {
    source: EntityType,
    target: EntityType,
    relationship: RelationshipType,
    weight: f64,
}

/// Static relationship rules over unordered type pairs: legal, medical,
/// temporal, and financial patterns.
const RULES: &[EdgeRule] = &[
    EdgeRule { source: EntityType::Person, target: EntityType::Organization, relationship: RelationshipType::WorksAt, weight: 0.75 },
    EdgeRule { source: EntityType::Person, target: EntityType::Location, relationship: RelationshipType::LocatedIn, weight: 0.70 },
    EdgeRule { source: EntityType::Organization, target: EntityType::Location, relationship: RelationshipType::LocatedIn, weight: 0.75 },
    EdgeRule { source: EntityType::Person, target: EntityType::CaseNumber, relationship: RelationshipType::PartyTo, weight: 0.80 },
    EdgeRule { source: EntityType::Organization, target: EntityType::CaseNumber, relationship: RelationshipType::PartyTo, weight: 0.80 },
    EdgeRule { source: EntityType::CaseNumber, target: EntityType::Statute, relationship: RelationshipType::Cites, weight: 0.90 },
    EdgeRule { source: EntityType::CaseNumber, target: EntityType::Location, relationship: RelationshipType::FiledIn, weight: 0.80 },
    EdgeRule { source: EntityType::CaseNumber, target: EntityType::Date, relationship: RelationshipType::OccurredAt, weight: 0.75 },
    EdgeRule { source: EntityType::Person, target: EntityType::Statute, relationship: RelationshipType::References, weight: 0.70 },
    EdgeRule { source: EntityType::Organization, target: EntityType::Statute, relationship: RelationshipType::References, weight: 0.70 },
    EdgeRule { source: EntityType::Exhibit, target: EntityType::Person, relationship: RelationshipType::SignedBy, weight: 0.65 },
    EdgeRule { source: EntityType::Exhibit, target: EntityType::CaseNumber, relationship: RelationshipType::ReferencedIn, weight: 0.80 },
    EdgeRule { source: EntityType::Exhibit, target: EntityType::Date, relationship: RelationshipType::OccurredAt, weight: 0.70 },
    EdgeRule { source: EntityType::Person, target: EntityType::Date, relationship: RelationshipType::OccurredAt, weight: 0.65 },
    EdgeRule { source: EntityType::Organization, target: EntityType::Date, relationship: RelationshipType::OccurredAt, weight: 0.65 },
    EdgeRule { source: EntityType::Amount, target: EntityType::CaseNumber, relationship: RelationshipType::ReferencedIn, weight: 0.70 },
    EdgeRule { source: EntityType::Amount, target: EntityType::Organization, relationship: RelationshipType::RelatedTo, weight: 0.65 },
    EdgeRule { source: EntityType::Amount, target: EntityType::Date, relationship: RelationshipType::OccurredAt, weight: 0.70 },
    EdgeRule { source: EntityType::Diagnosis, target: EntityType::Medication, relationship: RelationshipType::TreatedWith, weight: 0.85 },
    EdgeRule { source: EntityType::Medication, target: EntityType::Medication, relationship: RelationshipType::InteractsWith, weight: 0.75 },
    EdgeRule { source: EntityType::Medication, target: EntityType::MedicalDevice, relationship: RelationshipType::AdministeredVia, weight: 0.80 },
    EdgeRule { source: EntityType::Diagnosis, target: EntityType::MedicalDevice, relationship: RelationshipType::ManagedBy, weight: 0.80 },
    EdgeRule { source: EntityType::Person, target: EntityType::Medication, relationship: RelationshipType::TreatedWith, weight: 0.70 },
    EdgeRule { source: EntityType::Person, target: EntityType::Diagnosis, relationship: RelationshipType::RelatedTo, weight: 0.70 },
    EdgeRule { source: EntityType::Diagnosis, target: EntityType::Date, relationship: RelationshipType::OccurredAt, weight: 0.70 },
    EdgeRule { source: EntityType::Statute, target: EntityType::Statute, relationship: RelationshipType::References, weight: 0.65 },
];

/// Relationship types a domain hint vouches for
fn hinted_relationships(hint: &str) -> &'static [RelationshipType] {
    match hint {
        "employment" => &[RelationshipType::WorksAt, RelationshipType::ManagedBy],
        "medical" => &[
            RelationshipType::TreatedWith,
            RelationshipType::InteractsWith,
            RelationshipType::AdministeredVia,
            RelationshipType::ManagedBy,
        ],
        "litigation" => &[
            RelationshipType::Cites,
            RelationshipType::FiledIn,
            RelationshipType::PartyTo,
            RelationshipType::ReferencedIn,
            RelationshipType::Represents,
        ],
        "financial" => &[RelationshipType::RelatedTo, RelationshipType::ReferencedIn],
        _ => &[],
    }
}

fn lookup_rule(a: EntityType, b: EntityType) -> Option<(&'static EdgeRule, bool)> {
    RULES.iter().find_map(|rule| {
        if rule.source == a && rule.target == b {
            Some((rule, false))
        } else if rule.source == b && rule.target == a {
            Some((rule, true))
        } else {
            None
        }
    })
}

/// Candidate edges accumulated under coalescing
struct EdgeAccumulator {
    edges: HashMap<(String, String, RelationshipType), KnowledgeEdge>,
    order: Vec<(String, String, RelationshipType)>,
}

impl EdgeAccumulator {
    fn new() -> Self {
        Self {
            edges: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Add a candidate; duplicates keep the maximum weight and accumulate
    /// evidence and document coverage
    fn add(
        &mut self,
        source: &str,
        target: &str,
        relationship: RelationshipType,
        weight: f64,
        evidence: i64,
        document_ids: &[String],
        metadata: serde_json::Value,
    ) {
        let weight = weight.clamp(f64::MIN_POSITIVE, 1.0);
        let key = (source.to_string(), target.to_string(), relationship);
        if let Some(existing) = self.edges.get_mut(&key) {
            existing.weight = existing.weight.max(weight);
            existing.evidence_count += evidence;
            for doc in document_ids {
                if !existing.document_ids.contains(doc) {
                    existing.document_ids.push(doc.clone());
                }
            }
            merge_metadata(&mut existing.metadata, metadata);
        } else {
            self.order.push(key.clone());
            self.edges.insert(
                key,
                KnowledgeEdge {
                    id: new_id(),
                    source_node_id: source.to_string(),
                    target_node_id: target.to_string(),
                    relationship_type: relationship,
                    weight,
                    evidence_count: evidence,
                    document_ids: document_ids.to_vec(),
                    metadata,
                    valid_from: None,
                    valid_until: None,
                    normalized_weight: None,
                    contradiction_count: 0,
                    created_at: now_timestamp(),
                },
            );
        }
    }

    fn into_edges(mut self) -> Vec<KnowledgeEdge> {
        self.order
            .into_iter()
            .filter_map(|key| self.edges.remove(&key))
            .collect()
    }
}

fn merge_metadata(existing: &mut serde_json::Value, incoming: serde_json::Value) {
    if let (Some(map), Some(new_map)) = (existing.as_object_mut(), incoming.as_object()) {
        for (k, v) in new_map {
            map.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
}

fn shared<'a>(a: &'a [String], b: &[String]) -> Vec<&'a String> {
    a.iter().filter(|x| b.contains(x)).collect()
}

/// Generate every edge for the resolved node set
pub(crate) fn generate_edges(seeds: &[NodeSeed], cluster_hint: Option<&str>) -> Vec<KnowledgeEdge> {
    let mut acc = EdgeAccumulator::new();
    let hinted = cluster_hint.map(hinted_relationships).unwrap_or(&[]);

    for i in 0..seeds.len() {
        for j in (i + 1)..seeds.len() {
            let a = &seeds[i];
            let b = &seeds[j];

            let shared_docs = shared(&a.document_ids, &b.document_ids);
            if shared_docs.is_empty() {
                continue;
            }
            let shared_docs: Vec<String> = shared_docs.into_iter().cloned().collect();
            let co_mention_weight = (shared_docs.len() as f64 / 3.0).min(1.0);

            acc.add(
                &a.node_id,
                &b.node_id,
                RelationshipType::CoMentioned,
                co_mention_weight,
                shared_docs.len() as i64,
                &shared_docs,
                json!({}),
            );

            let shared_chunks: Vec<&String> =
                a.chunk_ids.intersection(&b.chunk_ids).collect();
            if !shared_chunks.is_empty() {
                acc.add(
                    &a.node_id,
                    &b.node_id,
                    RelationshipType::CoLocated,
                    (co_mention_weight * 1.5).min(1.0),
                    shared_chunks.len() as i64,
                    &shared_docs,
                    json!({ "shared_chunk_ids": shared_chunks }),
                );
            }

            let rule = lookup_rule(a.entity_type, b.entity_type);
            if let Some((rule, reversed)) = rule {
                let (source, target) = if reversed { (b, a) } else { (a, b) };
                let mut weight = rule.weight;
                let mut metadata = json!({});

                let same_extraction = a
                    .extraction_ids
                    .intersection(&b.extraction_ids)
                    .next()
                    .is_some();
                if same_extraction {
                    weight = weight.max(EXTRACTION_OVERRIDE_RULED);
                    metadata["classifier"] = json!("extraction_schema");
                }
                if hinted.contains(&rule.relationship) {
                    weight = weight.max(CLUSTER_HINT_WEIGHT);
                    metadata["cluster_hint"] = json!(cluster_hint);
                }

                acc.add(
                    &source.node_id,
                    &target.node_id,
                    rule.relationship,
                    weight,
                    shared_docs.len() as i64,
                    &shared_docs,
                    metadata,
                );
            } else if a
                .extraction_ids
                .intersection(&b.extraction_ids)
                .next()
                .is_some()
            {
                // No rule, but the same extraction produced both: record a
                // generic association at the extraction override floor.
                acc.add(
                    &a.node_id,
                    &b.node_id,
                    RelationshipType::RelatedTo,
                    EXTRACTION_OVERRIDE_BASE,
                    shared_docs.len() as i64,
                    &shared_docs,
                    json!({ "classifier": "extraction_schema" }),
                );
            }
        }
    }

    let mut edges = acc.into_edges();
    infer_temporal_bounds(seeds, &mut edges);
    debug!(nodes = seeds.len(), edges = edges.len(), "edges generated");
    edges
}

/// Copy parseable dates from date-typed endpoints onto `occurred_at`
/// edges, narrowing only
fn infer_temporal_bounds(seeds: &[NodeSeed], edges: &mut [KnowledgeEdge]) {
    let dates: HashMap<&str, String> = seeds
        .iter()
        .filter(|s| s.entity_type == EntityType::Date)
        .filter_map(|s| parse_date(&s.canonical_name).map(|d| (s.node_id.as_str(), d)))
        .collect();
    if dates.is_empty() {
        return;
    }

    for edge in edges.iter_mut() {
        if edge.relationship_type != RelationshipType::OccurredAt {
            continue;
        }
        let date = dates
            .get(edge.source_node_id.as_str())
            .or_else(|| dates.get(edge.target_node_id.as_str()));
        if let Some(date) = date {
            let (from, until) =
                narrow_validity(edge.valid_from.take(), edge.valid_until.take(), date);
            edge.valid_from = from;
            edge.valid_until = until;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(id: &str, et: EntityType, name: &str, docs: &[&str]) -> NodeSeed {
        NodeSeed {
            node_id: id.to_string(),
            entity_type: et,
            canonical_name: name.to_string(),
            document_ids: docs.iter().map(|d| (*d).to_string()).collect(),
            extraction_ids: BTreeSet::new(),
            chunk_ids: BTreeSet::new(),
        }
    }

    #[test]
    fn co_mention_weight_scales_with_shared_documents() {
        let a = seed("n1", EntityType::Person, "John Smith", &["d1", "d2", "d3", "d4"]);
        let b = seed("n2", EntityType::Other, "Widget", &["d1", "d2", "d3", "d4"]);
        let edges = generate_edges(&[a, b], None);
        let co = edges
            .iter()
            .find(|e| e.relationship_type == RelationshipType::CoMentioned)
            .unwrap();
        assert!((co.weight - 1.0).abs() < 1e-9);
        assert_eq!(co.evidence_count, 4);
    }

    #[test]
    fn rule_table_orients_asymmetric_relationships() {
        let org = seed("n1", EntityType::Organization, "Acme", &["d1"]);
        let person = seed("n2", EntityType::Person, "John Smith", &["d1"]);
        let edges = generate_edges(&[org, person], None);
        let works = edges
            .iter()
            .find(|e| e.relationship_type == RelationshipType::WorksAt)
            .unwrap();
        // person -> organization, regardless of seed order
        assert_eq!(works.source_node_id, "n2");
        assert_eq!(works.target_node_id, "n1");
        assert!((works.weight - 0.75).abs() < 1e-9);
    }

    #[test]
    fn colocation_records_shared_chunks() {
        let mut a = seed("n1", EntityType::Person, "John Smith", &["d1"]);
        let mut b = seed("n2", EntityType::Diagnosis, "asthma", &["d1"]);
        a.chunk_ids.insert("c1".into());
        b.chunk_ids.insert("c1".into());
        let edges = generate_edges(&[a, b], None);
        let co = edges
            .iter()
            .find(|e| e.relationship_type == RelationshipType::CoLocated)
            .unwrap();
        assert_eq!(co.metadata["shared_chunk_ids"], serde_json::json!(["c1"]));
        // 1/3 co-mention weight boosted by 1.5
        assert!((co.weight - 0.5).abs() < 1e-9);
    }

    #[test]
    fn extraction_membership_overrides_rule_weight() {
        let mut diag = seed("n1", EntityType::Diagnosis, "asthma", &["d1"]);
        let mut med = seed("n2", EntityType::Medication, "albuterol", &["d1"]);
        diag.extraction_ids.insert("x1".into());
        med.extraction_ids.insert("x1".into());
        let edges = generate_edges(&[diag, med], None);
        let treated = edges
            .iter()
            .find(|e| e.relationship_type == RelationshipType::TreatedWith)
            .unwrap();
        assert!((treated.weight - 0.90).abs() < 1e-9);
        assert_eq!(treated.metadata["classifier"], "extraction_schema");
    }

    #[test]
    fn cluster_hint_boosts_domain_rules() {
        let person = seed("n1", EntityType::Person, "John Smith", &["d1"]);
        let org = seed("n2", EntityType::Organization, "Acme", &["d1"]);
        let edges = generate_edges(&[person, org], Some("employment"));
        let works = edges
            .iter()
            .find(|e| e.relationship_type == RelationshipType::WorksAt)
            .unwrap();
        assert!((works.weight - CLUSTER_HINT_WEIGHT).abs() < 1e-9);
    }

    #[test]
    fn occurred_at_edges_pick_up_parseable_dates() {
        let case = seed("n1", EntityType::CaseNumber, "24-cv-1001", &["d1"]);
        let date = seed("n2", EntityType::Date, "2024-03-15", &["d1"]);
        let edges = generate_edges(&[case, date], None);
        let occurred = edges
            .iter()
            .find(|e| e.relationship_type == RelationshipType::OccurredAt)
            .unwrap();
        assert_eq!(occurred.valid_from.as_deref(), Some("2024-03-15"));
        assert_eq!(occurred.valid_until.as_deref(), Some("2024-03-15"));
    }

    #[test]
    fn disjoint_documents_produce_no_edges() {
        let a = seed("n1", EntityType::Person, "John Smith", &["d1"]);
        let b = seed("n2", EntityType::Organization, "Acme", &["d2"]);
        assert!(generate_edges(&[a, b], None).is_empty());
    }
}
