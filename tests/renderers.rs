//! Snapshot-style tests for output renderers.
//!
//! Each test renders a standard report through a renderer and checks the
//! parts of the output that callers depend on.

use pretty_assertions::assert_eq;

use peerly::aggregator::aggregate;
use peerly::config::AggregationConfig;
use peerly::models::{
    Annotation, AnnotationKind, Report, SectionKind, SectionRef, Severity, SuggestionCandidate,
    WorkerKind,
};
use peerly::output::OutputRenderer;
use peerly::output::json::JsonRenderer;
use peerly::output::terminal::TerminalRenderer;

fn section(index: usize, title: &str, start: usize, end: usize) -> SectionRef {
    SectionRef {
        index,
        kind: SectionKind::Section,
        title: title.into(),
        start_line: start,
        end_line: end,
    }
}

fn candidate(
    section: &SectionRef,
    worker: &str,
    line: usize,
    severity: Severity,
    issue: &str,
) -> SuggestionCandidate {
    SuggestionCandidate {
        section: section.clone(),
        worker: WorkerKind::new(worker),
        severity,
        severity_score: None,
        line,
        issue: issue.into(),
        explanation: "Readers cannot follow the argument without it.".into(),
        suggested_fix: "Add a sentence that introduces it.".into(),
    }
}

/// Standard report used across renderer tests.
fn test_report() -> Report {
    let intro = section(0, "Intro", 1, 10);
    let methods = section(1, "Methods", 11, 20);
    let mut report = aggregate(
        vec![
            candidate(&intro, "clarity", 5, Severity::Warning, "Undefined term ergodic"),
            candidate(&intro, "rigor", 5, Severity::Error, "Term ergodic is undefined"),
            candidate(&methods, "rigor", 15, Severity::Error, "Missing validation"),
            candidate(&methods, "clarity", 12, Severity::Info, "Sentence is too long"),
        ],
        &AggregationConfig::default(),
    )
    .unwrap();
    report.annotations.push(Annotation::for_pair(
        AnnotationKind::TaskTimedOut,
        &methods,
        &WorkerKind::new("notation"),
        "timed out after 30s",
    ));
    report
}

#[test]
fn json_matches_external_contract() {
    let output = JsonRenderer.render(&test_report());
    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

    assert_eq!(parsed["success"], true);
    assert!(parsed.get("error").is_none());

    let sections = parsed["sections"].as_array().unwrap();
    assert_eq!(sections.len(), 2);
    assert_eq!(sections[0]["sectionTitle"], "Intro");
    assert_eq!(sections[0]["sectionKind"], "section");
    assert_eq!(sections[1]["sectionEndLine"], 20);

    let merged = &sections[0]["suggestionGroups"][0];
    assert_eq!(merged["workerKind"], "clarity");
    assert_eq!(merged["count"], 1);
    assert_eq!(merged["items"][0]["severity"], "error");
    assert_eq!(merged["items"][0]["workers"], serde_json::json!(["clarity", "rigor"]));
    assert!(merged["items"][0].get("severityScore").is_none());

    let methods_groups = sections[1]["suggestionGroups"].as_array().unwrap();
    let kinds: Vec<_> = methods_groups.iter().map(|g| g["workerKind"].clone()).collect();
    assert_eq!(kinds, vec![serde_json::json!("clarity"), serde_json::json!("rigor")]);

    assert_eq!(parsed["summary"]["total"], 3);
    assert_eq!(
        parsed["summary"]["bySeverity"],
        serde_json::json!({ "info": 1, "warning": 0, "error": 2 })
    );
    assert_eq!(
        parsed["summary"]["byWorker"],
        serde_json::json!({ "clarity": 2, "rigor": 2 })
    );

    assert_eq!(parsed["annotations"][0]["kind"], "task_timed_out");
    assert_eq!(parsed["annotations"][0]["workerKind"], "notation");
}

#[test]
fn json_failure_report() {
    let output = JsonRenderer.render(&Report::failure("candidate line 99 outside section"));
    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(parsed["success"], false);
    assert_eq!(parsed["error"], "candidate line 99 outside section");
    assert_eq!(parsed["sections"].as_array().unwrap().len(), 0);
}

#[test]
fn terminal_lists_sections_in_document_order() {
    colored::control::set_override(false);
    let output = TerminalRenderer.render(&test_report());

    let intro = output.find("§ Intro").unwrap();
    let methods = output.find("§ Methods").unwrap();
    assert!(intro < methods);

    assert!(output.contains("✖ error at line 5 [clarity, rigor]"));
    assert!(output.contains("ℹ info at line 12 [clarity]"));
    assert!(output.contains("→ Add a sentence that introduces it."));
    assert!(output.contains("Methods (line 11) [notation] timed out after 30s"));
    assert!(output.contains("3 suggestions: 2 errors, 0 warnings, 1 info"));
    assert!(output.contains("clarity: 2, rigor: 2"));
}

#[test]
fn terminal_empty_report() {
    colored::control::set_override(false);
    let output = TerminalRenderer.render(&Report::empty());
    assert!(output.contains("No issues found"));
    assert!(output.contains("0 suggestions"));
}
