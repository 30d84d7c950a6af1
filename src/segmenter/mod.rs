//! Single-pass segmentation of LaTeX-style markup into a section forest.
//!
//! Recognises `\chapter`, `\section`, `\subsection`, and `\subsubsection`
//! at the start of a line, with an optional `*` and `[short title]`.
//! Titles may contain nested braces. Lines whose first non-blank
//! character is `%` are never markers. Segmentation stops at an
//! uncommented `\end{document}`; anything after it is ignored.
//!
//! Malformed markers never abort segmentation: the line is kept as plain
//! content and a [`SegmentationError`] is recorded alongside the result.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::constants::FALLBACK_SECTION_TITLE;
use crate::models::section::{Section, SectionKind, SectionTopic};

/// A marker that could not be parsed. Always recoverable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SegmentationError {
    #[error("line {line}: unterminated title in \\{command} marker")]
    UnterminatedTitle { line: usize, command: String },

    #[error("line {line}: unterminated optional argument in \\{command} marker")]
    UnterminatedOption { line: usize, command: String },

    #[error("line {line}: \\{command} marker has no title")]
    MissingTitle { line: usize, command: String },
}

impl SegmentationError {
    pub fn line(&self) -> usize {
        match self {
            SegmentationError::UnterminatedTitle { line, .. }
            | SegmentationError::UnterminatedOption { line, .. }
            | SegmentationError::MissingTitle { line, .. } => *line,
        }
    }
}

/// Segmentation output with any degraded-marker diagnostics.
#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    pub sections: Vec<Section>,
    pub errors: Vec<SegmentationError>,
    pub line_count: usize,
}

/// Split `text` into an ordered section forest.
pub fn segment(text: &str) -> Vec<Section> {
    segment_with_diagnostics(text).sections
}

/// Like [`segment`], but also returns the markers that were degraded to content.
pub fn segment_with_diagnostics(text: &str) -> Segmentation {
    let mut roots: Vec<Section> = Vec::new();
    let mut stack: Vec<Section> = Vec::new();
    let mut errors = Vec::new();
    let mut saw_marker = false;
    let mut line_count = 0;

    for (idx, line) in text.lines().enumerate() {
        let n = idx + 1;
        if line.trim_start().starts_with(END_DOCUMENT) {
            debug!(line = n, "end of document");
            break;
        }
        line_count = n;

        match parse_marker(line, n) {
            Marker::Open { kind, title } => {
                saw_marker = true;
                close_to_level(&mut stack, &mut roots, kind.level(), n - 1);
                debug!(line = n, %kind, title = %title, "section marker");
                stack.push(Section {
                    kind,
                    topic: SectionTopic::classify(&title),
                    title,
                    start_line: n,
                    end_line: n,
                    content_start: n + 1,
                    content: String::new(),
                    children: Vec::new(),
                });
            }
            Marker::Malformed(err) => {
                warn!(line = n, error = %err, "treating malformed marker as content");
                errors.push(err);
                append_content(&mut stack, line);
            }
            Marker::None => append_content(&mut stack, line),
        }
    }

    close_to_level(&mut stack, &mut roots, 0, line_count);

    if !saw_marker && line_count > 0 {
        roots.push(Section {
            kind: SectionKind::Section,
            title: FALLBACK_SECTION_TITLE.to_string(),
            start_line: 1,
            end_line: line_count,
            content_start: 1,
            content: text.lines().take(line_count).collect::<Vec<_>>().join("\n"),
            topic: SectionTopic::General,
            children: Vec::new(),
        });
    }

    Segmentation {
        sections: roots,
        errors,
        line_count,
    }
}

/// Close every open section at `level` or deeper, ending at `end_line`.
fn close_to_level(stack: &mut Vec<Section>, roots: &mut Vec<Section>, level: u8, end_line: usize) {
    while stack.last().is_some_and(|s| s.kind.level() >= level) {
        let Some(mut done) = stack.pop() else { break };
        done.end_line = end_line.max(done.start_line);
        if done.content.ends_with('\n') {
            done.content.pop();
        }
        match stack.last_mut() {
            Some(parent) => parent.children.push(done),
            None => roots.push(done),
        }
    }
}

fn append_content(stack: &mut [Section], line: &str) {
    // Preamble lines (nothing open) are dropped.
    if let Some(open) = stack.last_mut() {
        open.content.push_str(line);
        open.content.push('\n');
    }
}

const END_DOCUMENT: &str = "\\end{document}";

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\\(chapter|section|subsection|subsubsection)\*?").unwrap()
});

enum Marker {
    None,
    Open { kind: SectionKind, title: String },
    Malformed(SegmentationError),
}

fn parse_marker(line: &str, n: usize) -> Marker {
    if line.trim_start().starts_with('%') {
        return Marker::None;
    }
    let Some(caps) = MARKER_RE.captures(line) else {
        return Marker::None;
    };
    let command = caps[1].to_string();
    let Some(kind) = SectionKind::from_command(&command) else {
        return Marker::None;
    };

    let mut rest = line[caps[0].len()..].trim_start();

    // A letter right after the command means a different macro (`\sectionmark`).
    if rest.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Marker::None;
    }

    if rest.starts_with('[') {
        match scan_group(rest, '[', ']') {
            Some((_, after)) => rest = after.trim_start(),
            None => {
                return Marker::Malformed(SegmentationError::UnterminatedOption { line: n, command });
            }
        }
    }

    if !rest.starts_with('{') {
        return Marker::Malformed(SegmentationError::MissingTitle { line: n, command });
    }

    match scan_group(rest, '{', '}') {
        Some((inner, _)) => {
            let title = inner.split_whitespace().collect::<Vec<_>>().join(" ");
            Marker::Open { kind, title }
        }
        None => Marker::Malformed(SegmentationError::UnterminatedTitle { line: n, command }),
    }
}

/// Scan a balanced `open ... close` group at the start of `s`.
///
/// Returns the inner text and the remainder after the closing delimiter.
/// Backslash-escaped delimiters do not count.
fn scan_group(s: &str, open: char, close: char) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
        } else if c == open {
            depth += 1;
        } else if c == close {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some((&s[open.len_utf8()..i], &s[i + close.len_utf8()..]));
            }
        }
    }
    None
}
