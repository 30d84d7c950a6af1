//! Section tree types produced by the segmenter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hierarchy level of a sectioning marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Chapter,
    Section,
    Subsection,
    Subsubsection,
}

impl SectionKind {
    /// Depth in the hierarchy; chapters are outermost.
    pub fn level(self) -> u8 {
        match self {
            SectionKind::Chapter => 0,
            SectionKind::Section => 1,
            SectionKind::Subsection => 2,
            SectionKind::Subsubsection => 3,
        }
    }

    /// Map a marker command name (without backslash) to its kind.
    pub fn from_command(command: &str) -> Option<Self> {
        match command {
            "chapter" => Some(SectionKind::Chapter),
            "section" => Some(SectionKind::Section),
            "subsection" => Some(SectionKind::Subsection),
            "subsubsection" => Some(SectionKind::Subsubsection),
            _ => None,
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionKind::Chapter => write!(f, "chapter"),
            SectionKind::Section => write!(f, "section"),
            SectionKind::Subsection => write!(f, "subsection"),
            SectionKind::Subsubsection => write!(f, "subsubsection"),
        }
    }
}

/// Coarse role of a section inferred from its title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionTopic {
    Introduction,
    Background,
    Methodology,
    Results,
    Discussion,
    Conclusion,
    #[default]
    General,
}

impl SectionTopic {
    /// Classify a section title by keyword.
    ///
    /// The first matching rule wins, so "Results and Discussion" is
    /// classified as results.
    pub fn classify(title: &str) -> Self {
        let t = title.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| t.contains(w));

        if has(&["introduction", "intro", "motivation"]) {
            SectionTopic::Introduction
        } else if has(&["related work", "background", "literature", "preliminar"]) {
            SectionTopic::Background
        } else if has(&["method", "approach", "design", "model", "algorithm", "framework"]) {
            SectionTopic::Methodology
        } else if has(&["result", "experiment", "evaluation", "analysis", "benchmark"]) {
            SectionTopic::Results
        } else if has(&["discussion", "limitation"]) {
            SectionTopic::Discussion
        } else if has(&["conclusion", "summary", "future work"]) {
            SectionTopic::Conclusion
        } else {
            SectionTopic::General
        }
    }

    /// Topics that carry methods, experiments, or results.
    pub fn is_technical(self) -> bool {
        matches!(self, SectionTopic::Methodology | SectionTopic::Results)
    }
}

impl fmt::Display for SectionTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SectionTopic::Introduction => "introduction",
            SectionTopic::Background => "background",
            SectionTopic::Methodology => "methodology",
            SectionTopic::Results => "results",
            SectionTopic::Discussion => "discussion",
            SectionTopic::Conclusion => "conclusion",
            SectionTopic::General => "general",
        };
        f.write_str(s)
    }
}

/// A titled, line-bounded region of the document.
///
/// Line numbers are 1-based and inclusive. `content` holds only the lines
/// owned directly by this section; lines inside children belong to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub kind: SectionKind,
    pub title: String,
    pub start_line: usize,
    pub end_line: usize,
    /// Line number of the first line of `content`.
    pub content_start: usize,
    pub content: String,
    pub topic: SectionTopic,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Section>,
}

impl Section {
    /// Whether `line` lies within this section's range.
    pub fn contains_line(&self, line: usize) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    /// Last line owned directly by this section, before its first child.
    pub fn own_end_line(&self) -> usize {
        self.children
            .first()
            .map(|c| c.start_line.saturating_sub(1).max(self.start_line))
            .unwrap_or(self.end_line)
    }

    /// Whether the section owns any non-blank text of its own.
    pub fn has_content(&self) -> bool {
        self.content.lines().any(|l| !l.trim().is_empty())
    }

    /// Content lines paired with their document line numbers.
    pub fn numbered_lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.content
            .lines()
            .enumerate()
            .map(move |(i, l)| (self.content_start + i, l))
    }
}

/// Flatten a section forest in document (pre-)order.
pub fn flatten(sections: &[Section]) -> Vec<&Section> {
    fn walk<'a>(list: &'a [Section], out: &mut Vec<&'a Section>) {
        for s in list {
            out.push(s);
            walk(&s.children, out);
        }
    }
    let mut out = Vec::new();
    walk(sections, &mut out);
    out
}

/// A lightweight handle to one section of a segmented document.
///
/// `index` is the section's position in document order and is what the
/// aggregator groups and sorts by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRef {
    pub index: usize,
    pub kind: SectionKind,
    pub title: String,
    pub start_line: usize,
    pub end_line: usize,
}

impl SectionRef {
    pub fn new(index: usize, section: &Section) -> Self {
        Self {
            index,
            kind: section.kind,
            title: section.title.clone(),
            start_line: section.start_line,
            end_line: section.end_line,
        }
    }

    pub fn contains_line(&self, line: usize) -> bool {
        self.start_line <= line && line <= self.end_line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_levels_are_ordered() {
        assert!(SectionKind::Chapter.level() < SectionKind::Section.level());
        assert!(SectionKind::Subsection.level() < SectionKind::Subsubsection.level());
        assert_eq!(SectionKind::from_command("subsection"), Some(SectionKind::Subsection));
        assert_eq!(SectionKind::from_command("paragraph"), None);
    }

    #[test]
    fn classify_topics() {
        assert_eq!(SectionTopic::classify("Introduction"), SectionTopic::Introduction);
        assert_eq!(SectionTopic::classify("Related Work"), SectionTopic::Background);
        assert_eq!(SectionTopic::classify("Our Approach"), SectionTopic::Methodology);
        assert_eq!(SectionTopic::classify("Experimental Results"), SectionTopic::Results);
        assert_eq!(SectionTopic::classify("Discussion"), SectionTopic::Discussion);
        assert_eq!(SectionTopic::classify("Conclusions"), SectionTopic::Conclusion);
        assert_eq!(SectionTopic::classify("Acknowledgements"), SectionTopic::General);
    }

    #[test]
    fn numbered_lines_start_at_content_start() {
        let s = Section {
            kind: SectionKind::Section,
            title: "A".into(),
            start_line: 3,
            end_line: 5,
            content_start: 4,
            content: "first\nsecond".into(),
            topic: SectionTopic::General,
            children: vec![],
        };
        let lines: Vec<_> = s.numbered_lines().collect();
        assert_eq!(lines, vec![(4, "first"), (5, "second")]);
        assert!(s.has_content());
        assert!(s.contains_line(3));
        assert!(!s.contains_line(6));
        assert_eq!(s.own_end_line(), 5);
    }

    #[test]
    fn own_lines_stop_before_the_first_child() {
        let child = Section {
            kind: SectionKind::Subsection,
            title: "B".into(),
            start_line: 6,
            end_line: 9,
            content_start: 7,
            content: "nested".into(),
            topic: SectionTopic::General,
            children: vec![],
        };
        let parent = Section {
            kind: SectionKind::Section,
            title: "A".into(),
            start_line: 1,
            end_line: 9,
            content_start: 2,
            content: "intro".into(),
            topic: SectionTopic::General,
            children: vec![child],
        };
        assert_eq!(parent.own_end_line(), 5);
        assert!(parent.contains_line(7));
    }
}
