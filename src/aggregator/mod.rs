//! Merge per-worker candidates into the final report.
//!
//! Aggregation is a pure function of the candidate set: candidates are
//! validated, put into a total order, deduplicated per section, and
//! grouped. The arrival order of candidates never affects the output.

pub mod dedup;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use thiserror::Error;

use crate::config::AggregationConfig;
use crate::models::{
    AggregatedSuggestion, Report, SectionRef, SectionReport, SuggestionCandidate,
    SuggestionGroup, Summary, WorkerKind,
};

/// Corrupt candidate data. Fatal for the request.
#[derive(Error, Debug, PartialEq)]
pub enum AggregationError {
    #[error("candidate from '{worker}' targets line {line} outside section '{section}' (lines {start}-{end})")]
    LineOutOfRange {
        worker: WorkerKind,
        section: String,
        line: usize,
        start: usize,
        end: usize,
    },

    #[error("candidate from '{worker}' has severity score {score} outside [0, 1]")]
    InvalidScore { worker: WorkerKind, score: f64 },

    #[error("section index {index} refers to both '{first}' and '{second}'")]
    SectionMismatch {
        index: usize,
        first: String,
        second: String,
    },
}

/// Build a report from every candidate collected for a request.
pub fn aggregate(
    mut candidates: Vec<SuggestionCandidate>,
    config: &AggregationConfig,
) -> Result<Report, AggregationError> {
    for c in &candidates {
        validate(c)?;
    }

    candidates.sort_by(total_order);

    let mut by_section: BTreeMap<usize, (SectionRef, Vec<SuggestionCandidate>)> = BTreeMap::new();
    for c in candidates {
        match by_section.get_mut(&c.section.index) {
            Some((section, list)) => {
                if *section != c.section {
                    return Err(AggregationError::SectionMismatch {
                        index: section.index,
                        first: section.title.clone(),
                        second: c.section.title.clone(),
                    });
                }
                list.push(c);
            }
            None => {
                by_section.insert(c.section.index, (c.section.clone(), vec![c]));
            }
        }
    }

    let mut report = Report::empty();
    for (section, list) in by_section.into_values() {
        let mut survivors = dedup::deduplicate(list, config);
        survivors.sort_by(|a, b| {
            a.line
                .cmp(&b.line)
                .then_with(|| b.severity.cmp(&a.severity))
                .then_with(|| a.issue_text.cmp(&b.issue_text))
        });

        tally(&mut report.summary, &survivors);

        let mut section_report = SectionReport::new(&section);
        section_report.suggestion_groups = group_by_worker(survivors);
        report.sections.push(section_report);
    }

    Ok(report)
}

fn validate(c: &SuggestionCandidate) -> Result<(), AggregationError> {
    if !c.section.contains_line(c.line) {
        return Err(AggregationError::LineOutOfRange {
            worker: c.worker.clone(),
            section: c.section.title.clone(),
            line: c.line,
            start: c.section.start_line,
            end: c.section.end_line,
        });
    }
    if let Some(score) = c.severity_score {
        if !(0.0..=1.0).contains(&score) {
            return Err(AggregationError::InvalidScore {
                worker: c.worker.clone(),
                score,
            });
        }
    }
    Ok(())
}

/// Section, line, severity (most severe first), then every remaining
/// field, so that equal keys only occur for identical candidates.
fn total_order(a: &SuggestionCandidate, b: &SuggestionCandidate) -> Ordering {
    a.section
        .index
        .cmp(&b.section.index)
        .then_with(|| a.line.cmp(&b.line))
        .then_with(|| b.severity.cmp(&a.severity))
        .then_with(|| a.worker.cmp(&b.worker))
        .then_with(|| a.issue.cmp(&b.issue))
        .then_with(|| a.explanation.cmp(&b.explanation))
        .then_with(|| a.suggested_fix.cmp(&b.suggested_fix))
        .then_with(|| {
            let a = a.severity_score.unwrap_or(-1.0);
            let b = b.severity_score.unwrap_or(-1.0);
            b.total_cmp(&a)
        })
}

/// Groups keyed by each suggestion's first worker, in worker-name order.
fn group_by_worker(survivors: Vec<AggregatedSuggestion>) -> Vec<SuggestionGroup> {
    let mut groups: BTreeMap<WorkerKind, Vec<AggregatedSuggestion>> = BTreeMap::new();
    for s in survivors {
        let Some(first) = s.workers.first().cloned() else {
            continue;
        };
        groups.entry(first).or_default().push(s);
    }
    groups
        .into_iter()
        .map(|(worker_kind, items)| SuggestionGroup {
            worker_kind,
            count: items.len(),
            items,
        })
        .collect()
}

fn tally(summary: &mut Summary, survivors: &[AggregatedSuggestion]) {
    for s in survivors {
        summary.total += 1;
        summary.by_severity.add(s.severity);
        for w in &s.workers {
            *summary.by_worker.entry(w.clone()).or_default() += 1;
        }
    }
}
