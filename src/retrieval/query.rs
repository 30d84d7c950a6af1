//! Guideline query formulation.
//!
//! A worker's query is its base text, the topics of the sections under
//! review, any triggered focus hints, and a content sample from every
//! section. The character budget is split evenly across sections, and
//! each share is spread over the start, middle, and end of the section,
//! so late sections weigh as much as early ones.

use crate::models::section::{Section, SectionTopic};
use crate::models::worker::RetrievalPlan;

/// Smallest per-section sample, regardless of how many sections there are.
pub const MIN_SECTION_SHARE: usize = 60;

/// Build the guideline query for one worker over the sections under review.
pub fn formulate_query(plan: &RetrievalPlan, sections: &[&Section], budget: usize) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !plan.query.trim().is_empty() {
        parts.push(plan.query.trim().to_string());
    }

    let mut topics: Vec<SectionTopic> = Vec::new();
    for s in sections {
        if s.topic != SectionTopic::General && !topics.contains(&s.topic) {
            topics.push(s.topic);
        }
    }
    parts.extend(topics.iter().map(|t| t.to_string()));

    for hint in &plan.hints {
        if hint_triggered(hint, sections) && !parts.contains(&hint.focus) {
            parts.push(hint.focus.clone());
        }
    }

    if !sections.is_empty() {
        let share = (budget / sections.len()).max(MIN_SECTION_SHARE);
        for s in sections {
            let sample = sample_evenly(&s.content, share);
            if !sample.is_empty() {
                parts.push(sample);
            }
        }
    }

    parts.join(" ")
}

fn hint_triggered(hint: &crate::models::worker::QueryHint, sections: &[&Section]) -> bool {
    sections.iter().any(|s| {
        let text = format!("{} {}", s.title, s.content).to_lowercase();
        let keyword_hit = hint
            .keywords
            .iter()
            .any(|k| !k.is_empty() && text.contains(&k.to_lowercase()));
        let long = hint
            .min_words
            .is_some_and(|n| s.content.split_whitespace().count() > n);
        keyword_hit || long
    })
}

/// Take up to `share` characters spread over the start, middle, and end of `text`.
pub fn sample_evenly(text: &str, share: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let chars: Vec<char> = flat.chars().collect();
    if chars.len() <= share {
        return flat;
    }

    let window = (share / 3).max(1);
    let mid_start = (chars.len() - window) / 2;
    let end_start = chars.len() - window;

    [0, mid_start, end_start]
        .iter()
        .map(|&start| chars[start..start + window].iter().collect::<String>())
        .map(|w| w.trim().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::section::SectionKind;
    use crate::models::worker::QueryHint;

    fn section(title: &str, content: &str) -> Section {
        Section {
            kind: SectionKind::Section,
            title: title.into(),
            start_line: 1,
            end_line: 1,
            content_start: 2,
            content: content.into(),
            topic: SectionTopic::classify(title),
            children: vec![],
        }
    }

    fn plan() -> RetrievalPlan {
        RetrievalPlan {
            query: "writing clarity guidelines".into(),
            hints: vec![
                QueryHint {
                    keywords: vec!["theorem".into(), "lemma".into()],
                    min_words: None,
                    focus: "clear mathematical statements".into(),
                },
                QueryHint {
                    keywords: vec![],
                    min_words: Some(100),
                    focus: "simplifying complex sentences".into(),
                },
            ],
            top_k: None,
        }
    }

    #[test]
    fn every_section_contributes_a_sample() {
        let filler = "lorem ipsum dolor sit amet ".repeat(40);
        let owned: Vec<Section> = (0..12)
            .map(|i| section(&format!("S{i}"), &format!("marker{i} {filler} tail{i}")))
            .collect();
        let refs: Vec<&Section> = owned.iter().collect();

        let q = formulate_query(&plan(), &refs, 1200);
        for i in 0..12 {
            assert!(q.contains(&format!("marker{i}")), "missing start of section {i}");
            assert!(q.contains(&format!("tail{i}")), "missing end of section {i}");
        }
    }

    #[test]
    fn topics_and_hints_are_appended() {
        let owned = vec![
            section("Introduction", "We study things."),
            section("Main Results", "\\begin{theorem} x \\end{theorem}"),
        ];
        let refs: Vec<&Section> = owned.iter().collect();
        let q = formulate_query(&plan(), &refs, 400);
        assert!(q.starts_with("writing clarity guidelines introduction results"));
        assert!(q.contains("clear mathematical statements"));
        assert!(!q.contains("simplifying complex sentences"));
    }

    #[test]
    fn word_count_hint() {
        let long = "word ".repeat(150);
        let owned = vec![section("Body", &long)];
        let refs: Vec<&Section> = owned.iter().collect();
        assert!(formulate_query(&plan(), &refs, 400).contains("simplifying complex sentences"));
    }

    #[test]
    fn sample_respects_share() {
        let text = "abcdefghij".repeat(30);
        let sample = sample_evenly(&text, 30);
        assert!(sample.chars().count() <= 32);
        assert!(sample.starts_with("abcdefghij"));
        assert_eq!(sample_evenly("short  text", 30), "short text");
    }
}
