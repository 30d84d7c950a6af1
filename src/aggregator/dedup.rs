//! Suggestion deduplication by line proximity + text similarity.
//!
//! Two suggestions in the same section are the same finding when their
//! lines are within the configured window and their issue texts agree:
//!
//! 1. **Issue word overlap** at or above the threshold, over
//!    stopword-filtered words.
//! 2. **Shared symbol**: a backtick or `$...$` span present in both, but
//!    only when issue overlap already reaches half the threshold.
//!
//! Explanations never decide a merge on their own. Two workers describing
//! different problems with the same notation stay separate.

use std::collections::BTreeSet;

use crate::config::AggregationConfig;
use crate::models::{AggregatedSuggestion, SuggestionCandidate};

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "in", "is", "it",
    "its", "of", "on", "or", "that", "the", "this", "to", "was", "were", "with",
];

/// Merge equivalent candidates of one section.
///
/// `candidates` must already be in the aggregator's total order; the
/// first candidate of each equivalence class becomes the survivor.
pub fn deduplicate(
    candidates: Vec<SuggestionCandidate>,
    config: &AggregationConfig,
) -> Vec<AggregatedSuggestion> {
    let mut survivors: Vec<AggregatedSuggestion> = Vec::new();

    for candidate in candidates {
        match survivors
            .iter_mut()
            .find(|s| is_duplicate(s, &candidate, config))
        {
            Some(existing) => merge(existing, candidate),
            None => survivors.push(AggregatedSuggestion::from_candidate(candidate)),
        }
    }

    survivors
}

fn is_duplicate(
    existing: &AggregatedSuggestion,
    candidate: &SuggestionCandidate,
    config: &AggregationConfig,
) -> bool {
    existing.line.abs_diff(candidate.line) <= config.line_window
        && content_similar(
            &existing.issue_text,
            &existing.explanation,
            &candidate.issue,
            &candidate.explanation,
            config.similarity_threshold,
        )
}

/// Fold `candidate` into `existing`: highest severity and score win,
/// workers are unioned.
fn merge(existing: &mut AggregatedSuggestion, candidate: SuggestionCandidate) {
    existing.severity = existing.severity.max(candidate.severity);
    existing.severity_score = match (existing.severity_score, candidate.severity_score) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };
    if !existing.workers.contains(&candidate.worker) {
        existing.workers.push(candidate.worker);
        existing.workers.sort();
    }
}

fn content_similar(
    a_issue: &str,
    a_explanation: &str,
    b_issue: &str,
    b_explanation: &str,
    threshold: f64,
) -> bool {
    let overlap = word_overlap(a_issue, b_issue);
    if overlap >= threshold {
        return true;
    }
    if overlap < threshold / 2.0 {
        return false;
    }

    let a_text = format!("{a_issue} {a_explanation}");
    let b_text = format!("{b_issue} {b_explanation}");
    has_shared_symbol(&a_text, &b_text)
}

/// Lowercased content words of `text`.
fn words(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Fraction of the larger word set shared by both, in `[0, 1]`.
pub fn word_overlap(a: &str, b: &str) -> f64 {
    let a = words(a);
    let b = words(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let common = a.intersection(&b).count();
    common as f64 / a.len().max(b.len()) as f64
}

fn has_shared_symbol(a: &str, b: &str) -> bool {
    let a_symbols = extract_symbols(a);
    if a_symbols.is_empty() {
        return false;
    }
    let b_symbols = extract_symbols(b);
    !a_symbols.is_disjoint(&b_symbols)
}

/// Backtick- and dollar-delimited spans, lowercased with trailing
/// punctuation stripped. Spans shorter than two characters are ignored.
fn extract_symbols(text: &str) -> BTreeSet<String> {
    let mut symbols = BTreeSet::new();
    for delim in ['`', '$'] {
        let mut rest = text;
        while let Some(start) = rest.find(delim) {
            rest = &rest[start + 1..];
            let Some(end) = rest.find(delim) else {
                break;
            };
            let normalized = rest[..end]
                .trim()
                .trim_end_matches(['(', ')', ';', ',', '.'])
                .to_lowercase();
            if normalized.chars().count() >= 2 {
                symbols.insert(normalized);
            }
            rest = &rest[end + 1..];
        }
    }
    symbols
}
