//! Suggestion types: severities, per-worker candidates, and merged results.

use clap::ValueEnum;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::section::SectionRef;

/// Severity level of a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ValueEnum, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Stylistic or optional improvement.
    Info,
    /// Weakens the section and should be addressed.
    Warning,
    /// Undermines correctness or comprehension.
    Error,
}

/// Accepts the looser vocabulary generation models tend to produce
/// ("critical", "major", "minor", ...). Unknown words map to warning.
impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Severity::lenient(&s))
    }
}

impl Severity {
    /// Normalise a free-form severity word.
    pub fn lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "info" | "note" | "suggestion" | "low" | "minor" | "trivial" | "style" => {
                Severity::Info
            }
            "error" | "critical" | "high" | "severe" | "blocker" | "fatal" => Severity::Error,
            _ => Severity::Warning,
        }
    }

    /// Derive a severity from a confidence score in `[0, 1]`.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.70 {
            Severity::Error
        } else if score >= 0.40 {
            Severity::Warning
        } else {
            Severity::Info
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// Name of a critique worker, e.g. `clarity` or `rigor`.
///
/// Ordered by name so grouping and tie-breaking are deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerKind(String);

impl WorkerKind {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkerKind {
    fn from(s: &str) -> Self {
        WorkerKind::new(s)
    }
}

/// An unmerged finding produced by exactly one worker for one section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionCandidate {
    pub section: SectionRef,
    pub worker: WorkerKind,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity_score: Option<f64>,
    pub line: usize,
    pub issue: String,
    pub explanation: String,
    pub suggested_fix: String,
}

/// A deduplicated suggestion in the final report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedSuggestion {
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity_score: Option<f64>,
    pub line: usize,
    pub issue_text: String,
    pub explanation: String,
    pub suggested_fix: String,
    /// Every worker that independently raised this finding, sorted.
    pub workers: Vec<WorkerKind>,
}

impl AggregatedSuggestion {
    pub fn from_candidate(c: SuggestionCandidate) -> Self {
        Self {
            severity: c.severity,
            severity_score: c.severity_score,
            line: c.line,
            issue_text: c.issue,
            explanation: c.explanation,
            suggested_fix: c.suggested_fix,
            workers: vec![c.worker],
        }
    }
}
