//! Worker definition types.

use serde::{Deserialize, Serialize};

use crate::models::suggestion::WorkerKind;

/// A parsed worker profile from markdown+YAML frontmatter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerDefinition {
    /// Metadata from the YAML frontmatter.
    pub profile: WorkerProfile,
    /// The system prompt (markdown body after frontmatter).
    pub system_prompt: String,
}

impl WorkerDefinition {
    pub fn kind(&self) -> WorkerKind {
        WorkerKind::new(&self.profile.name)
    }
}

/// Metadata from the YAML frontmatter of a worker definition file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerProfile {
    /// Unique name; becomes the worker kind.
    pub name: String,
    /// Human-readable description, also shown to the model.
    pub description: String,
    /// Optional model override for this worker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Which sections the worker accepts.
    #[serde(default)]
    pub sections: SectionScope,
    /// How to build the guideline query for this worker.
    #[serde(default)]
    pub retrieval: RetrievalPlan,
}

/// Section routing policy of a worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionScope {
    /// Every non-empty section.
    #[default]
    All,
    /// Methodology/results sections and sections containing math environments.
    Technical,
}

/// Guideline query template of a worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalPlan {
    /// Base query text.
    #[serde(default)]
    pub query: String,
    /// Focus phrases appended when the sampled content triggers them.
    #[serde(default)]
    pub hints: Vec<QueryHint>,
    /// Overrides `guidelines.top_k`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
}

/// A conditional focus phrase for the guideline query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryHint {
    /// Triggers when any keyword appears in the sampled content.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Triggers when some section has more words than this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_words: Option<usize>,
    pub focus: String,
}
