//! Route kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The evidence source chosen for answering a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Curated knowledge base only.
    KnowledgeBase,
    /// Live web search only.
    WebSearch,
    /// Merged evidence from both sources.
    Hybrid,
}

impl Route {
    /// All routes, in stable order.
    pub const ALL: [Self; 3] = [Self::KnowledgeBase, Self::WebSearch, Self::Hybrid];

    /// Wire name of the route.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::KnowledgeBase => "knowledge_base",
            Self::WebSearch => "web_search",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Route {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "knowledge_base" => Ok(Self::KnowledgeBase),
            "web_search" => Ok(Self::WebSearch),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!("unknown route: {other}")),
        }
    }
}
