//! Terminal renderer: styled flowing text grouped by section.

use colored::Colorize;

use crate::models::{AnnotationKind, Report, Section, Severity};
use crate::output::OutputRenderer;

/// Terminal output renderer with colored, flowing text.
pub struct TerminalRenderer;

impl OutputRenderer for TerminalRenderer {
    fn render(&self, report: &Report) -> String {
        let mut output = String::new();

        if !report.success {
            output.push_str(&format!(
                " {} {}\n",
                "✖ review failed:".red().bold(),
                report.error.as_deref().unwrap_or("unknown error")
            ));
        }

        if report.success && report.summary.total == 0 {
            output.push_str(&format!("{}", "  ✔ No issues found.\n".green()));
        }

        for section in &report.sections {
            output.push_str(&format!(
                "{} {} {}\n",
                "§".cyan().bold(),
                section.section_title.bold(),
                format!(
                    "({}, lines {}-{})",
                    section.section_kind, section.section_start_line, section.section_end_line
                )
                .dimmed()
            ));

            for group in &section.suggestion_groups {
                for item in &group.items {
                    let (icon, severity_str) = severity_label(item.severity);
                    output.push_str(&format!(
                        " {} {} at {} {}\n",
                        icon,
                        severity_str,
                        format!("line {}", item.line).bold(),
                        format!("[{}]", join_workers(&item.workers)).dimmed()
                    ));
                    if item.explanation.is_empty() {
                        output.push_str(&format!("   {}\n", item.issue_text.bold()));
                    } else {
                        output.push_str(&format!(
                            "   {}: {}\n",
                            item.issue_text.bold(),
                            item.explanation
                        ));
                    }
                    if !item.suggested_fix.is_empty() {
                        output.push_str(&format!("   {} {}\n", "→".cyan(), item.suggested_fix));
                    }
                    output.push('\n');
                }
            }
        }

        if !report.annotations.is_empty() {
            output.push_str(&format!("{}\n", "Notes".bold()));
            for note in &report.annotations {
                let location = match (&note.section_title, note.section_start_line) {
                    (Some(title), Some(line)) => format!("{title} (line {line})"),
                    (None, Some(line)) => format!("line {line}"),
                    (Some(title), None) => title.clone(),
                    (None, None) => String::new(),
                };
                let worker = note
                    .worker_kind
                    .as_ref()
                    .map(|w| format!(" [{w}]"))
                    .unwrap_or_default();
                output.push_str(&format!(
                    " {} {}{} {}\n",
                    annotation_icon(note.kind),
                    location,
                    worker.dimmed(),
                    note.message.dimmed()
                ));
            }
            output.push('\n');
        }

        let summary = &report.summary;
        let counts = &summary.by_severity;
        output.push_str(&format!("{}\n", "───────────────────────────────────".dimmed()));
        output.push_str(&format!(
            " {} suggestions: {} {}, {} {}, {} {}\n",
            summary.total.to_string().bold(),
            counts.error.to_string().red().bold(),
            if counts.error == 1 { "error" } else { "errors" },
            counts.warning.to_string().yellow().bold(),
            if counts.warning == 1 { "warning" } else { "warnings" },
            counts.info.to_string().blue().bold(),
            if counts.info == 1 { "info" } else { "infos" },
        ));
        if !summary.by_worker.is_empty() {
            let per_worker: Vec<String> = summary
                .by_worker
                .iter()
                .map(|(w, n)| format!("{w}: {n}"))
                .collect();
            output.push_str(&format!(" {}\n", per_worker.join(", ").dimmed()));
        }

        output
    }
}

fn severity_label(severity: Severity) -> (String, String) {
    match severity {
        Severity::Error => ("✖".red().bold().to_string(), "error".red().bold().to_string()),
        Severity::Warning => (
            "⚠".yellow().bold().to_string(),
            "warning".yellow().bold().to_string(),
        ),
        Severity::Info => ("ℹ".blue().bold().to_string(), "info".blue().bold().to_string()),
    }
}

fn annotation_icon(kind: AnnotationKind) -> String {
    match kind {
        AnnotationKind::TaskFailed | AnnotationKind::TaskTimedOut | AnnotationKind::DeadlineExceeded => {
            "✖".red().to_string()
        }
        AnnotationKind::GuidelinesUnavailable
        | AnnotationKind::Segmentation
        | AnnotationKind::UnknownWorker => "⚠".yellow().to_string(),
        AnnotationKind::Skipped => "○".dimmed().to_string(),
    }
}

fn join_workers(workers: &[crate::models::WorkerKind]) -> String {
    workers.iter().map(|w| w.as_str()).collect::<Vec<_>>().join(", ")
}

/// Indented section outline, one line per section.
pub fn render_outline(sections: &[Section]) -> String {
    fn walk(out: &mut String, sections: &[Section], depth: usize) {
        for s in sections {
            out.push_str(&format!(
                "{}{} {} {} {}\n",
                "  ".repeat(depth),
                format!("{}", s.kind).dimmed(),
                s.title.bold(),
                format!("[{}-{}]", s.start_line, s.end_line).cyan(),
                s.topic.to_string().dimmed()
            ));
            walk(out, &s.children, depth + 1);
        }
    }

    let mut out = String::new();
    walk(&mut out, sections, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AggregatedSuggestion, Annotation, SectionKind, SectionRef, SectionReport, SuggestionGroup,
        WorkerKind,
    };

    #[test]
    fn render_empty() {
        let output = TerminalRenderer.render(&Report::empty());
        assert!(output.contains("No issues found"));
    }

    #[test]
    fn render_suggestions_and_notes() {
        let section = SectionRef {
            index: 1,
            kind: SectionKind::Section,
            title: "Methods".into(),
            start_line: 11,
            end_line: 20,
        };
        let mut report = Report::empty();
        let mut sr = SectionReport::new(&section);
        sr.suggestion_groups.push(SuggestionGroup {
            worker_kind: WorkerKind::new("rigor"),
            count: 1,
            items: vec![AggregatedSuggestion {
                severity: Severity::Error,
                severity_score: None,
                line: 15,
                issue_text: "Missing validation".into(),
                explanation: "No baseline comparison.".into(),
                suggested_fix: "Add a baseline".into(),
                workers: vec![WorkerKind::new("clarity"), WorkerKind::new("rigor")],
            }],
        });
        report.sections.push(sr);
        report.summary.total = 1;
        report.summary.by_severity.error = 1;
        report.annotations.push(Annotation::for_pair(
            AnnotationKind::TaskTimedOut,
            &section,
            &WorkerKind::new("clarity"),
            "timed out after 30s",
        ));

        let output = TerminalRenderer.render(&report);
        assert!(output.contains("Methods"));
        assert!(output.contains("line 15"));
        assert!(output.contains("clarity, rigor"));
        assert!(output.contains("Add a baseline"));
        assert!(output.contains("timed out after 30s"));
        assert!(output.contains("suggestions"));
    }

    #[test]
    fn render_failure() {
        let output = TerminalRenderer.render(&Report::failure("corrupt candidate"));
        assert!(output.contains("review failed"));
        assert!(output.contains("corrupt candidate"));
        assert!(!output.contains("No issues found"));
    }

    #[test]
    fn outline_indents_children() {
        let sections = crate::segmenter::segment("\\section{A}\n\\subsection{B}\ntext\n");
        let out = render_outline(&sections);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("  "));
    }
}
