//! The review report returned to callers.
//!
//! Serialized with camelCase keys; this is the sole contract with the
//! surrounding application.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::section::{SectionKind, SectionRef};
use crate::models::suggestion::{AggregatedSuggestion, Severity, WorkerKind};

/// Final, ranked review output for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    pub sections: Vec<SectionReport>,
    pub summary: Summary,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl Report {
    /// An empty, successful report.
    pub fn empty() -> Self {
        Self {
            success: true,
            error: None,
            request_id: None,
            processing_time_ms: None,
            sections: Vec::new(),
            summary: Summary::default(),
            annotations: Vec::new(),
        }
    }

    /// A failed report carrying a human-readable error.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Self::empty()
        }
    }

    /// Iterate every suggestion in report order.
    pub fn suggestions(&self) -> impl Iterator<Item = &AggregatedSuggestion> {
        self.sections
            .iter()
            .flat_map(|s| s.suggestion_groups.iter())
            .flat_map(|g| g.items.iter())
    }

    /// Annotations of a given kind.
    pub fn annotations_of(&self, kind: AnnotationKind) -> impl Iterator<Item = &Annotation> {
        self.annotations.iter().filter(move |a| a.kind == kind)
    }
}

/// Suggestions for one section, grouped by worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionReport {
    pub section_title: String,
    pub section_kind: SectionKind,
    pub section_start_line: usize,
    pub section_end_line: usize,
    pub suggestion_groups: Vec<SuggestionGroup>,
}

impl SectionReport {
    pub fn new(section: &SectionRef) -> Self {
        Self {
            section_title: section.title.clone(),
            section_kind: section.kind,
            section_start_line: section.start_line,
            section_end_line: section.end_line,
            suggestion_groups: Vec::new(),
        }
    }
}

/// Suggestions attributed to one worker kind within a section.
///
/// A merged suggestion is listed under the first of its workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionGroup {
    pub worker_kind: WorkerKind,
    pub count: usize,
    pub items: Vec<AggregatedSuggestion>,
}

/// Counts per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub info: usize,
    pub warning: usize,
    pub error: usize,
}

impl SeverityCounts {
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Info => self.info += 1,
            Severity::Warning => self.warning += 1,
            Severity::Error => self.error += 1,
        }
    }

    /// Number of suggestions at or above `threshold`.
    pub fn at_or_above(&self, threshold: Severity) -> usize {
        match threshold {
            Severity::Info => self.info + self.warning + self.error,
            Severity::Warning => self.warning + self.error,
            Severity::Error => self.error,
        }
    }
}

/// Summary counts for the whole report.
///
/// `by_worker` credits a merged suggestion to each contributing worker,
/// so its values may sum to more than `total`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: usize,
    pub by_severity: SeverityCounts,
    pub by_worker: BTreeMap<WorkerKind, usize>,
}

/// What an annotation records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    /// A (section, worker) task failed after its retries.
    TaskFailed,
    /// A (section, worker) task exceeded its per-task timeout.
    TaskTimedOut,
    /// The request deadline expired before this task finished.
    DeadlineExceeded,
    /// The pair was never dispatched (empty section, worker declined it).
    Skipped,
    /// A requested worker kind is not registered.
    UnknownWorker,
    /// No guidelines were used for this worker.
    GuidelinesUnavailable,
    /// Markup could not be parsed cleanly.
    Segmentation,
}

/// A non-fatal note attached to the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub kind: AnnotationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_start_line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_kind: Option<WorkerKind>,
    pub message: String,
}

impl Annotation {
    pub fn new(kind: AnnotationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            section_title: None,
            section_start_line: None,
            worker_kind: None,
            message: message.into(),
        }
    }

    /// Annotation scoped to a (section, worker) pair.
    pub fn for_pair(
        kind: AnnotationKind,
        section: &SectionRef,
        worker: &WorkerKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            section_title: Some(section.title.clone()),
            section_start_line: Some(section.start_line),
            worker_kind: Some(worker.clone()),
            message: message.into(),
        }
    }

    pub fn with_worker(mut self, worker: &WorkerKind) -> Self {
        self.worker_kind = Some(worker.clone());
        self
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.section_start_line = Some(line);
        self
    }
}
