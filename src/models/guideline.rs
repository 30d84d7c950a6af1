//! Guideline snippets returned by the retriever.

use serde::{Deserialize, Serialize};

/// A reference passage used to ground a worker's critique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidelineSnippet {
    pub text: String,
    pub source_id: String,
    /// Relevance in `[0, 1]`; higher is more relevant.
    pub relevance_score: f64,
}
