//! Validation of generation replies into suggestion candidates.
//!
//! With `output_schema` enforcing [`WorkerReply`] at the provider level the
//! reply is normally clean JSON. Some providers still wrap it in markdown
//! fences or return a bare array, so several candidate slices are tried.
//! Individual items that fail validation are dropped; the reply as a whole
//! is malformed only when nothing usable can be recovered from it.

use std::ops::RangeInclusive;
use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{SectionRef, Severity, SuggestionCandidate, WorkerKind};

/// Maximum length of reply text quoted in a malformed-reply reason.
const PREVIEW_LEN: usize = 300;

/// Reply schema requested from the generation provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct WorkerReply {
    pub suggestions: Vec<ReplyItem>,
}

/// One suggestion as the model reports it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReplyItem {
    /// One-sentence statement of the problem.
    #[serde(alias = "issueText", alias = "text")]
    pub issue: String,
    /// Why it matters, one or two sentences.
    #[serde(default)]
    pub explanation: String,
    /// Concrete rewrite or action.
    #[serde(default, alias = "suggestedFix", alias = "fix")]
    pub suggested_fix: String,
    #[serde(default)]
    pub severity: Option<Severity>,
    /// Confidence in `[0, 1]`.
    #[serde(default, alias = "severityScore")]
    pub severity_score: Option<f64>,
    /// Absolute document line the issue is on.
    #[serde(default)]
    pub line: Option<usize>,
}

/// Validated candidates plus the number of items rejected.
#[derive(Debug, Default)]
pub struct ParsedReply {
    pub candidates: Vec<SuggestionCandidate>,
    pub dropped: usize,
}

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*\n(.*?)\n```").unwrap());

/// Parse and validate a raw reply for one (section, worker) pair.
///
/// `lines` is the range the section owns directly; lines inside its
/// subsections are rejected. Returns `Err(reason)` when the reply is
/// malformed and worth retrying.
pub fn parse_reply(
    text: &str,
    section: &SectionRef,
    lines: RangeInclusive<usize>,
    worker: &WorkerKind,
) -> Result<ParsedReply, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err("empty reply".to_string());
    }

    let items = extract_json_candidates(trimmed)
        .iter()
        .find_map(|c| suggestion_array(c))
        .ok_or_else(|| {
            format!(
                "reply is not a suggestion list: {}",
                preview(trimmed)
            )
        })?;

    let total = items.len();
    let mut parsed = ParsedReply::default();
    for value in items {
        match serde_json::from_value::<ReplyItem>(value) {
            Ok(item) => match validate(item, section, &lines, worker) {
                Ok(candidate) => parsed.candidates.push(candidate),
                Err(reason) => {
                    warn!(worker = %worker, section = %section.title, %reason, "dropping suggestion");
                    parsed.dropped += 1;
                }
            },
            Err(e) => {
                warn!(worker = %worker, section = %section.title, error = %e, "dropping suggestion");
                parsed.dropped += 1;
            }
        }
    }

    if total > 0 && parsed.candidates.is_empty() {
        return Err(format!("all {total} suggestions failed validation"));
    }
    Ok(parsed)
}

fn validate(
    item: ReplyItem,
    section: &SectionRef,
    lines: &RangeInclusive<usize>,
    worker: &WorkerKind,
) -> Result<SuggestionCandidate, String> {
    let issue = item.issue.trim();
    if issue.is_empty() {
        return Err("empty issue text".to_string());
    }

    let line = match item.line {
        None | Some(0) => *lines.start(),
        Some(l) if lines.contains(&l) => l,
        Some(l) => {
            return Err(format!(
                "line {l} outside section lines {}-{}",
                lines.start(),
                lines.end()
            ));
        }
    };

    let severity_score = item
        .severity_score
        .filter(|s| s.is_finite())
        .map(|s| s.clamp(0.0, 1.0));
    let severity = item
        .severity
        .or_else(|| severity_score.map(Severity::from_score))
        .unwrap_or(Severity::Warning);

    Ok(SuggestionCandidate {
        section: section.clone(),
        worker: worker.clone(),
        severity,
        severity_score,
        line,
        issue: issue.to_string(),
        explanation: item.explanation.trim().to_string(),
        suggested_fix: item.suggested_fix.trim().to_string(),
    })
}

/// The suggestion array inside `candidate`, if it holds one.
///
/// Accepts a bare array or an object with a `suggestions` array.
fn suggestion_array(candidate: &str) -> Option<Vec<serde_json::Value>> {
    match serde_json::from_str::<serde_json::Value>(candidate).ok()? {
        serde_json::Value::Array(items) => Some(items),
        serde_json::Value::Object(mut map) => match map.remove("suggestions")? {
            serde_json::Value::Array(items) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

/// Candidate JSON strings from a reply: the raw text, the outermost
/// object and array slices, and the contents of markdown code fences.
fn extract_json_candidates(text: &str) -> Vec<String> {
    let mut candidates = vec![text.to_string()];

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (text.find(open), text.rfind(close)) {
            if start < end {
                candidates.push(text[start..=end].to_string());
            }
        }
    }

    for cap in FENCE_RE.captures_iter(text) {
        if let Some(inner) = cap.get(1) {
            let inner = inner.as_str().trim();
            if !inner.is_empty() {
                candidates.push(inner.to_string());
            }
        }
    }

    candidates
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_LEN) {
        Some((i, _)) => format!("{}...", &text[..i]),
        None => text.to_string(),
    }
}
