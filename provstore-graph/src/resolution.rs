//! Two-tier entity resolution
//!
//! Tier 1 groups entities of one type by normalized text; every group is a
//! cluster. Tier 2 (fuzzy mode only) runs pairwise similarity across the
//! tier-1 clusters of each type and merges above a threshold. The pairwise
//! pass is O(M²), so it refuses to run past a hard per-type cap rather than
//! silently truncating.

use std::collections::HashMap;

use tracing::{debug, info};

use provstore_core::error::{Result, StoreError};
use provstore_core::types::{Entity, EntityType, ResolutionMethod};
use serde::{Deserialize, Serialize};

/// Hard per-type input cap for the O(M²) fuzzy pass
pub const FUZZY_ENTITY_CAP: usize = 5_000;

/// Combined similarity at or above this merges two clusters
pub const MERGE_THRESHOLD: f64 = 0.85;

/// Score contributed by an initial match, never higher
pub const INITIAL_MATCH_BOOST: f64 = 0.90;

/// Score assigned to a word-boundary containment merge (locations)
const CONTAINMENT_SCORE: f64 = 0.95;

/// Resolution strategy for a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMode {
    Exact,
    Fuzzy,
}

impl ResolutionMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fuzzy => "fuzzy",
        }
    }
}

/// One entity's membership in a resolved cluster
#[derive(Debug, Clone)]
pub struct ClusterMember {
    pub entity_id: String,
    pub document_id: String,
    pub confidence: f64,
    pub extraction_id: Option<String>,
    pub similarity: f64,
    pub method: ResolutionMethod,
}

/// A resolved equivalence class of entities
#[derive(Debug, Clone)]
pub struct ResolvedCluster {
    pub entity_type: EntityType,
    /// Raw text of the highest-confidence member
    pub canonical_name: String,
    pub normalized_name: String,
    /// Sorted distinct raw spellings other than the canonical name
    pub aliases: Vec<String>,
    pub members: Vec<ClusterMember>,
    /// Distinct contributing document ids, first-seen order
    pub document_ids: Vec<String>,
    /// Document of the canonical member
    pub primary_document_id: String,
    pub avg_confidence: f64,
    pub resolution_type: ResolutionMethod,
}

impl ResolvedCluster {
    #[must_use]
    pub fn mention_count(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn document_count(&self) -> usize {
        self.document_ids.len()
    }
}

/// Output of a resolution run
#[derive(Debug, Clone)]
pub struct Resolution {
    pub clusters: Vec<ResolvedCluster>,
    pub total_entities: usize,
    /// Entities skipped for having no usable normalized text
    pub unmatched: usize,
}

/// Resolve entities into clusters, per type bucket
pub fn resolve_entities(entities: &[Entity], mode: ResolutionMode) -> Result<Resolution> {
    let mut buckets: Vec<(EntityType, Vec<&Entity>)> = Vec::new();
    let mut bucket_index: HashMap<EntityType, usize> = HashMap::new();
    let mut unmatched = 0usize;

    for entity in entities {
        if entity.normalized_text.trim().is_empty() {
            unmatched += 1;
            continue;
        }
        let idx = *bucket_index.entry(entity.entity_type).or_insert_with(|| {
            buckets.push((entity.entity_type, Vec::new()));
            buckets.len() - 1
        });
        buckets[idx].1.push(entity);
    }

    let mut clusters = Vec::new();
    for (entity_type, bucket) in &buckets {
        let mut tier1 = exact_clusters(*entity_type, bucket);
        if mode == ResolutionMode::Fuzzy {
            if tier1.len() > FUZZY_ENTITY_CAP {
                return Err(StoreError::TooManyEntities {
                    entity_type: entity_type.as_str().to_string(),
                    count: tier1.len(),
                    cap: FUZZY_ENTITY_CAP,
                });
            }
            tier1 = fuzzy_merge(*entity_type, tier1);
        }
        debug!(
            entity_type = entity_type.as_str(),
            entities = bucket.len(),
            clusters = tier1.len(),
            "type bucket resolved"
        );
        clusters.extend(tier1);
    }

    info!(
        total_entities = entities.len(),
        clusters = clusters.len(),
        unmatched,
        mode = mode.as_str(),
        "entity resolution complete"
    );
    Ok(Resolution {
        clusters,
        total_entities: entities.len(),
        unmatched,
    })
}

/// Tier 1: one cluster per distinct normalized text
fn exact_clusters(entity_type: EntityType, entities: &[&Entity]) -> Vec<ResolvedCluster> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&Entity>> = HashMap::new();
    for entity in entities {
        let key = entity.normalized_text.clone();
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(entity);
    }

    order
        .into_iter()
        .map(|key| {
            let group = &groups[&key];
            // Highest confidence wins; insertion order breaks ties.
            let canonical = group.iter().copied().fold(group[0], |best, e| {
                if e.confidence > best.confidence {
                    e
                } else {
                    best
                }
            });

            let mut aliases: Vec<String> = group
                .iter()
                .filter(|e| e.raw_text != canonical.raw_text)
                .map(|e| e.raw_text.clone())
                .collect();
            aliases.sort();
            aliases.dedup();

            let mut document_ids: Vec<String> = Vec::new();
            for e in group {
                if !document_ids.contains(&e.document_id) {
                    document_ids.push(e.document_id.clone());
                }
            }

            let members = group
                .iter()
                .map(|e| ClusterMember {
                    entity_id: e.id.clone(),
                    document_id: e.document_id.clone(),
                    confidence: e.confidence,
                    extraction_id: e.extraction_id.clone(),
                    similarity: 1.0,
                    method: ResolutionMethod::Exact,
                })
                .collect::<Vec<_>>();

            let avg_confidence = round4(
                members.iter().map(|m| m.confidence).sum::<f64>() / members.len() as f64,
            );

            ResolvedCluster {
                entity_type,
                canonical_name: canonical.raw_text.clone(),
                normalized_name: key,
                aliases,
                primary_document_id: canonical.document_id.clone(),
                document_ids,
                members,
                avg_confidence,
                resolution_type: ResolutionMethod::Exact,
            }
        })
        .collect()
}

/// Tier 2: pairwise similarity over tier-1 clusters, union-find merge
fn fuzzy_merge(entity_type: EntityType, clusters: Vec<ResolvedCluster>) -> Vec<ResolvedCluster> {
    let n = clusters.len();
    let mut parent: Vec<usize> = (0..n).collect();
    let mut pair_method: HashMap<(usize, usize), (f64, ResolutionMethod)> = HashMap::new();

    fn find(parent: &mut Vec<usize>, i: usize) -> usize {
        if parent[i] != i {
            let root = find(parent, parent[i]);
            parent[i] = root;
        }
        parent[i]
    }

    for i in 0..n {
        for j in (i + 1)..n {
            let a = &clusters[i].normalized_name;
            let b = &clusters[j].normalized_name;

            let merge = if entity_type == EntityType::Location && is_contained(a, b) {
                Some((CONTAINMENT_SCORE, ResolutionMethod::Containment))
            } else {
                let score = name_similarity(a, b);
                (score >= MERGE_THRESHOLD).then_some((score, ResolutionMethod::Fuzzy))
            };

            if let Some(found) = merge {
                pair_method.insert((i, j), found);
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[rj.max(ri)] = rj.min(ri);
                }
            }
        }
    }

    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..n {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(i);
    }

    let mut roots: Vec<usize> = groups.keys().copied().collect();
    roots.sort_unstable();

    roots
        .into_iter()
        .map(|root| {
            let mut indices = groups.remove(&root).unwrap_or_default();
            indices.sort_unstable();
            if indices.len() == 1 {
                return clusters[indices[0]].clone();
            }

            // Higher document_count wins the canonical name; insertion
            // order breaks ties.
            let winner = *indices
                .iter()
                .max_by(|a, b| {
                    clusters[**a]
                        .document_count()
                        .cmp(&clusters[**b].document_count())
                        .then(b.cmp(a))
                })
                .unwrap_or(&indices[0]);

            merge_group(&clusters, winner, &indices, &pair_method)
        })
        .collect()
}

fn merge_group(
    clusters: &[ResolvedCluster],
    winner: usize,
    indices: &[usize],
    pair_method: &HashMap<(usize, usize), (f64, ResolutionMethod)>,
) -> ResolvedCluster {
    let base = &clusters[winner];
    let mut merged = base.clone();
    merged.resolution_type = ResolutionMethod::Fuzzy;

    for &idx in indices {
        if idx == winner {
            continue;
        }
        let other = &clusters[idx];

        let key = (winner.min(idx), winner.max(idx));
        let (score, method) = pair_method.get(&key).copied().unwrap_or_else(|| {
            // Transitive merge without a direct pair score; recompute
            // against the winner.
            (
                name_similarity(&base.normalized_name, &other.normalized_name),
                ResolutionMethod::Fuzzy,
            )
        });
        if method == ResolutionMethod::Containment {
            merged.resolution_type = ResolutionMethod::Containment;
        }

        merged.aliases.push(other.canonical_name.clone());
        merged.aliases.extend(other.aliases.iter().cloned());
        for doc in &other.document_ids {
            if !merged.document_ids.contains(doc) {
                merged.document_ids.push(doc.clone());
            }
        }
        merged
            .members
            .extend(other.members.iter().map(|m| ClusterMember {
                similarity: score,
                method,
                ..m.clone()
            }));
    }

    merged.aliases.retain(|a| *a != merged.canonical_name);
    merged.aliases.sort();
    merged.aliases.dedup();
    merged.avg_confidence = round4(
        merged.members.iter().map(|m| m.confidence).sum::<f64>() / merged.members.len() as f64,
    );
    merged
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

// ---- similarity -----------------------------------------------------------

/// Lowercase, strip punctuation that varies between spellings, collapse
/// whitespace
fn canonicalize(name: &str) -> String {
    name.to_lowercase()
        .replace(['.', ','], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn token_sort(name: &str) -> String {
    let mut tokens: Vec<&str> = name.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn expand_abbreviations(name: &str) -> String {
    const EXPANSIONS: &[(&str, &str)] = &[
        ("corp", "corporation"),
        ("inc", "incorporated"),
        ("ltd", "limited"),
        ("co", "company"),
        ("assn", "association"),
        ("dept", "department"),
        ("univ", "university"),
        ("natl", "national"),
        ("intl", "international"),
        ("bros", "brothers"),
        ("mfg", "manufacturing"),
        ("svcs", "services"),
    ];
    name.split_whitespace()
        .map(|token| {
            EXPANSIONS
                .iter()
                .find(|(abbr, _)| *abbr == token)
                .map_or(token, |(_, full)| *full)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(prev[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut prev, &mut current);
    }
    prev[b.len()]
}

fn ratio(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// Tokens with single-letter initials removed
fn without_initials(name: &str) -> Vec<&str> {
    name.split_whitespace()
        .filter(|t| t.chars().count() > 1)
        .collect()
}

/// First-initial + surname against full first name + same surname, or the
/// same name modulo dropped middle initials
fn initials_match(a: &str, b: &str) -> bool {
    let ta: Vec<&str> = a.split_whitespace().collect();
    let tb: Vec<&str> = b.split_whitespace().collect();
    if ta.len() < 2 || tb.len() < 2 || ta.last() != tb.last() {
        return false;
    }

    let first_initial = |tokens: &[&str], other: &[&str]| {
        tokens[0].chars().count() == 1
            && other[0].chars().next() == tokens[0].chars().next()
    };
    if first_initial(&ta, &tb) || first_initial(&tb, &ta) {
        return true;
    }

    // "john d smith" vs "john smith": equal once initials are dropped.
    let stripped_a = without_initials(a);
    let stripped_b = without_initials(b);
    stripped_a == stripped_b && (stripped_a.len() < ta.len() || stripped_b.len() < tb.len())
}

/// Combined name similarity in [0, 1]
#[must_use]
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let ca = canonicalize(a);
    let cb = canonicalize(b);
    if ca == cb {
        return 1.0;
    }

    let base = ratio(&token_sort(&ca), &token_sort(&cb));
    let expanded = ratio(
        &token_sort(&expand_abbreviations(&ca)),
        &token_sort(&expand_abbreviations(&cb)),
    );
    let mut score = base.max(expanded);

    if initials_match(&ca, &cb) {
        score = score.max(INITIAL_MATCH_BOOST);
    }
    score
}

/// One normalized form contained in the other at word boundaries
#[must_use]
pub fn is_contained(a: &str, b: &str) -> bool {
    let ca = canonicalize(a);
    let cb = canonicalize(b);
    if ca.is_empty() || cb.is_empty() || ca == cb {
        return false;
    }
    let (needle, haystack) = if ca.len() <= cb.len() { (&ca, &cb) } else { (&cb, &ca) };
    let padded = format!(" {haystack} ");
    padded.contains(&format!(" {needle} "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviations_expand_to_equality() {
        assert!(name_similarity("Acme Corp.", "Acme Corporation") >= MERGE_THRESHOLD);
        assert!(name_similarity("Widget Inc", "Widget Incorporated") >= MERGE_THRESHOLD);
        assert!(name_similarity("Foo Ltd", "Foo Limited") >= MERGE_THRESHOLD);
    }

    #[test]
    fn initials_boost_to_ninety() {
        let score = name_similarity("J. Smith", "John Smith");
        assert!(score >= INITIAL_MATCH_BOOST - 1e-9);
        assert!(score <= INITIAL_MATCH_BOOST + 1e-9);
    }

    #[test]
    fn middle_initial_is_ignored() {
        assert!(name_similarity("John D. Smith", "John Smith") >= MERGE_THRESHOLD);
    }

    #[test]
    fn different_surnames_do_not_match() {
        assert!(name_similarity("J. Smith", "John Doe") < MERGE_THRESHOLD);
        assert!(name_similarity("Acme Corporation", "Bolt Limited") < MERGE_THRESHOLD);
    }

    #[test]
    fn containment_is_word_bounded() {
        assert!(is_contained("New York", "New York City"));
        assert!(is_contained("new york city", "New York"));
        assert!(!is_contained("York", "New Yorkshire"));
        assert!(!is_contained("Springfield", "Springfield"));
    }
}
