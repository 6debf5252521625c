//! Confidence scoring over retrieval results.
//!
//! A [`ConfidenceScore`] combines three signals:
//!
//! - the highest relevance among the results,
//! - a saturating function of the result count,
//! - a bonus when knowledge-base and web snippets share key terms.
//!
//! The combination is
//!
//! ```text
//! value = max_relevance * (relevance_weight + count_weight * n / (n + half_saturation))
//!       + agreement_bonus * agreement
//! ```
//!
//! clamped to `[0, 1]`. All weights live in [`ScoringWeights`]. Scoring is a
//! pure function of its inputs.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::guardrails::lexicon::key_terms;
use crate::traits::{RetrievalResult, SourceKind};

/// Tunable weights of the confidence formula.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Share of the score carried by the best relevance alone.
    pub relevance_weight: f64,
    /// Share unlocked by having several results.
    pub count_weight: f64,
    /// Result count at which the count factor reaches one half.
    pub count_half_saturation: f64,
    /// Maximum bonus for cross-source agreement.
    pub agreement_bonus: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            relevance_weight: 0.9,
            count_weight: 0.1,
            count_half_saturation: 1.0,
            agreement_bonus: 0.1,
        }
    }
}

impl ScoringWeights {
    /// Saturating count factor in `[0, 1)`.
    #[must_use]
    pub fn count_factor(&self, count: usize) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let n = count as f64;
        if n <= 0.0 {
            return 0.0;
        }
        n / (n + self.count_half_saturation.max(f64::EPSILON))
    }
}

/// Normalised confidence with the factors that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScore {
    /// Score in `[0, 1]`.
    pub value: f64,
    /// Highest relevance among the scored results.
    pub max_relevance: f64,
    /// Number of results scored.
    pub result_count: usize,
    /// Key-term agreement between knowledge-base and web snippets, if both
    /// were present.
    pub agreement: Option<f64>,
}

impl ConfidenceScore {
    /// Score of an empty result set.
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            value: 0.0,
            max_relevance: 0.0,
            result_count: 0,
            agreement: None,
        }
    }
}

impl Default for ConfidenceScore {
    fn default() -> Self {
        Self::zero()
    }
}

/// Computes confidence scores.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceScorer {
    weights: ScoringWeights,
}

impl ConfidenceScorer {
    /// Create a scorer with the given weights.
    #[must_use]
    pub const fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// The weights in use.
    #[must_use]
    pub const fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Score one or more retrieval results together.
    ///
    /// The agreement bonus applies only when both a knowledge-base and a web
    /// result set contribute items.
    #[must_use]
    pub fn score(&self, results: &[&RetrievalResult]) -> ConfidenceScore {
        let result_count: usize = results.iter().map(|r| r.len()).sum();
        if result_count == 0 {
            return ConfidenceScore::zero();
        }

        let max_relevance = results
            .iter()
            .map(|r| r.max_relevance())
            .fold(0.0, f64::max);
        let agreement = agreement(results);

        let w = &self.weights;
        let base = max_relevance
            * w.count_weight.mul_add(w.count_factor(result_count), w.relevance_weight);
        let value = w
            .agreement_bonus
            .mul_add(agreement.unwrap_or(0.0), base)
            .clamp(0.0, 1.0);

        ConfidenceScore {
            value,
            max_relevance,
            result_count,
            agreement,
        }
    }

    /// Score a single result set.
    #[must_use]
    pub fn score_one(&self, result: &RetrievalResult) -> ConfidenceScore {
        self.score(&[result])
    }
}

/// Jaccard overlap of key terms between knowledge-base and web snippets.
fn agreement(results: &[&RetrievalResult]) -> Option<f64> {
    let terms_of = |kind: SourceKind| -> BTreeSet<String> {
        results
            .iter()
            .filter(|r| r.kind == kind)
            .flat_map(|r| r.items.iter())
            .flat_map(|item| key_terms(&item.content))
            .collect()
    };

    let kb = terms_of(SourceKind::KnowledgeBase);
    let web = terms_of(SourceKind::WebSearch);
    if kb.is_empty() || web.is_empty() {
        return None;
    }

    let shared = kb.intersection(&web).count();
    let union = kb.union(&web).count();
    #[allow(clippy::cast_precision_loss)]
    Some(shared as f64 / union as f64)
}
