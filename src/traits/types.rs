//! Types exchanged with the collaborator interfaces.
//!
//! - [`SourceKind`]: which retriever produced a result
//! - [`EvidenceItem`]: one ranked snippet with its source identifier
//! - [`RetrievalResult`]: the ranked output of one retrieval call
//! - [`GenerationRequest`] / [`GeneratedSolution`]: generation contract

use serde::{Deserialize, Serialize};

use crate::model::{Difficulty, Route, Topic};

/// Which retriever produced a result.
///
/// Ordering puts the knowledge base first; merges rely on it for tie-breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Curated knowledge base.
    KnowledgeBase,
    /// Web search.
    WebSearch,
}

impl SourceKind {
    /// Wire name of the source.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::KnowledgeBase => "knowledge_base",
            Self::WebSearch => "web_search",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ranked snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Snippet text.
    pub content: String,
    /// Citation identifier (URL, document id). Blank means uncitable.
    pub source_id: String,
    /// Relevance in `[0, 1]`.
    pub relevance: f64,
    /// Producing retriever.
    pub kind: SourceKind,
}

impl EvidenceItem {
    /// Create an evidence item, clamping relevance into `[0, 1]`.
    #[must_use]
    pub fn new(
        kind: SourceKind,
        content: impl Into<String>,
        source_id: impl Into<String>,
        relevance: f64,
    ) -> Self {
        let relevance = if relevance.is_nan() {
            0.0
        } else {
            relevance.clamp(0.0, 1.0)
        };
        Self {
            content: content.into(),
            source_id: source_id.into(),
            relevance,
            kind,
        }
    }

    /// Returns true if the item carries a usable citation.
    #[must_use]
    pub fn is_cited(&self) -> bool {
        !self.source_id.trim().is_empty()
    }
}

/// Output of one retrieval call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Producing retriever.
    pub kind: SourceKind,
    /// Items ordered by relevance, highest first.
    pub items: Vec<EvidenceItem>,
    /// Time the call took, in milliseconds.
    pub latency_ms: u64,
}

impl RetrievalResult {
    /// Create a result; items are re-sorted by relevance descending.
    #[must_use]
    pub fn new(kind: SourceKind, mut items: Vec<EvidenceItem>, latency_ms: u64) -> Self {
        items.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
        Self {
            kind,
            items,
            latency_ms,
        }
    }

    /// An empty result, used for timeouts and failures.
    #[must_use]
    pub const fn empty(kind: SourceKind, latency_ms: u64) -> Self {
        Self {
            kind,
            items: Vec::new(),
            latency_ms,
        }
    }

    /// Returns true if no items were retrieved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Highest relevance, or 0 when empty.
    #[must_use]
    pub fn max_relevance(&self) -> f64 {
        self.items
            .iter()
            .map(|i| i.relevance)
            .fold(0.0, f64::max)
    }

    /// Drop items without a citation; returns how many were dropped.
    pub fn retain_cited(&mut self) -> usize {
        let before = self.items.len();
        self.items.retain(EvidenceItem::is_cited);
        before - self.items.len()
    }
}

/// Request passed to the generation interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Question text.
    pub question: String,
    /// User-supplied context.
    pub context: Option<String>,
    /// Topic hint.
    pub topic: Option<Topic>,
    /// Requested difficulty.
    pub requested_difficulty: Option<Difficulty>,
    /// Evidence, in merge order.
    pub evidence: Vec<EvidenceItem>,
    /// Route the evidence came from.
    pub route: Route,
    /// Attempt number (1-based).
    pub attempt: u32,
}

/// Raw output of the generation interface, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedSolution {
    /// Ordered steps.
    #[serde(default)]
    pub steps: Vec<String>,
    /// Explanation.
    #[serde(default)]
    pub explanation: String,
    /// Final answer.
    #[serde(default)]
    pub final_answer: String,
    /// Free-text difficulty estimate.
    #[serde(default)]
    pub difficulty: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evidence_clamps_relevance() {
        assert!((EvidenceItem::new(SourceKind::WebSearch, "a", "u", 1.7).relevance - 1.0).abs() < f64::EPSILON);
        assert!(EvidenceItem::new(SourceKind::WebSearch, "a", "u", -0.3).relevance.abs() < f64::EPSILON);
        assert!(EvidenceItem::new(SourceKind::WebSearch, "a", "u", f64::NAN).relevance.abs() < f64::EPSILON);
    }

    #[test]
    fn test_retrieval_result_sorted_and_max() {
        let result = RetrievalResult::new(
            SourceKind::KnowledgeBase,
            vec![
                EvidenceItem::new(SourceKind::KnowledgeBase, "low", "kb:1", 0.2),
                EvidenceItem::new(SourceKind::KnowledgeBase, "high", "kb:2", 0.9),
            ],
            12,
        );
        assert_eq!(result.items[0].content, "high");
        assert!((result.max_relevance() - 0.9).abs() < f64::EPSILON);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_empty_result() {
        let result = RetrievalResult::empty(SourceKind::WebSearch, 800);
        assert!(result.is_empty());
        assert!(result.max_relevance().abs() < f64::EPSILON);
    }

    #[test]
    fn test_retain_cited() {
        let mut result = RetrievalResult::new(
            SourceKind::WebSearch,
            vec![
                EvidenceItem::new(SourceKind::WebSearch, "a", "https://a", 0.5),
                EvidenceItem::new(SourceKind::WebSearch, "b", "  ", 0.6),
                EvidenceItem::new(SourceKind::WebSearch, "c", "", 0.4),
            ],
            5,
        );
        assert_eq!(result.retain_cited(), 2);
        assert_eq!(result.len(), 1);
        assert_eq!(result.items[0].source_id, "https://a");
    }

    #[test]
    fn test_source_kind_orders_knowledge_base_first() {
        assert!(SourceKind::KnowledgeBase < SourceKind::WebSearch);
    }
}
