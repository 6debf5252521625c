//! Deterministic merge of knowledge-base and web evidence.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::guardrails::lexicon::key_terms;
use crate::traits::{EvidenceItem, RetrievalResult};

/// Key-term overlap at or above which two snippets count as the same.
pub const NEAR_DUPLICATE_OVERLAP: f64 = 0.9;

/// Snippets with fewer key terms are only deduplicated on exact text.
const MIN_TERMS_FOR_OVERLAP: usize = 4;

/// Merge two result sets into one evidence list.
///
/// Items are ordered by relevance (descending), then by source kind with
/// the knowledge base first, then by their rank within their own result
/// set. Near-identical snippets keep only their highest-ranked copy. The
/// output depends only on the contents of the two sets, never on which
/// call finished first.
#[must_use]
pub fn merge_evidence(first: &RetrievalResult, second: &RetrievalResult) -> Vec<EvidenceItem> {
    let mut ranked: Vec<(usize, &EvidenceItem)> = first
        .items
        .iter()
        .enumerate()
        .chain(second.items.iter().enumerate())
        .collect();
    ranked.sort_by(|(rank_a, a), (rank_b, b)| compare(a, *rank_a, b, *rank_b));

    let mut kept: Vec<EvidenceItem> = Vec::with_capacity(ranked.len());
    let mut fingerprints: Vec<(String, BTreeSet<String>)> = Vec::with_capacity(ranked.len());
    for (_, item) in ranked {
        let normalized = normalize(&item.content);
        let terms = key_terms(&item.content);
        let duplicate = fingerprints
            .iter()
            .any(|(text, seen)| {
                *text == normalized || overlap(seen, &terms) >= NEAR_DUPLICATE_OVERLAP
            });
        if duplicate {
            tracing::trace!(source = %item.source_id, "Dropping near-duplicate snippet");
            continue;
        }
        fingerprints.push((normalized, terms));
        kept.push(item.clone());
    }
    kept
}

fn compare(a: &EvidenceItem, rank_a: usize, b: &EvidenceItem, rank_b: usize) -> Ordering {
    b.relevance
        .total_cmp(&a.relevance)
        .then(a.kind.cmp(&b.kind))
        .then(rank_a.cmp(&rank_b))
        .then_with(|| a.source_id.cmp(&b.source_id))
        .then_with(|| a.content.cmp(&b.content))
}

/// Lowercase alphanumerics with whitespace collapsed.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn overlap(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.len().min(b.len()) < MIN_TERMS_FOR_OVERLAP {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    let union = a.union(b).count();
    #[allow(clippy::cast_precision_loss)]
    let ratio = shared as f64 / union as f64;
    ratio
}
