//! End-to-end review pipeline tests with a mock generation provider and
//! a mock knowledge store.
//!
//! The built-in clarity and rigor profiles run unchanged; only the
//! external collaborators are replaced.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio::time::Instant;

use peerly::cache::{GuidelineCache, ReportCache};
use peerly::config::Config;
use peerly::models::{AnnotationKind, Report, Severity, WorkerKind};
use peerly::orchestrator::{ReviewController, ReviewRequest, ReviewState};
use peerly::providers::{GenerationError, GenerationProvider, GenerationRequest};
use peerly::retrieval::{GuidelineRetriever, KnowledgeStore, RetrievalError, StoreHit};
use peerly::workers::{self, WorkerRegistry};

// ---------------------------------------------------------------------------
// Mocks
// ---------------------------------------------------------------------------

/// Canned reply for one (worker, section) pair.
struct Rule {
    worker: &'static str,
    section: &'static str,
    reply: String,
    delay: Duration,
}

/// Replies according to its rules; unmatched pairs get an empty list.
#[derive(Default)]
struct MockProvider {
    rules: Vec<Rule>,
    calls: AtomicUsize,
    with_guidelines: AtomicUsize,
}

impl MockProvider {
    fn new() -> Self {
        Self::default()
    }

    fn rule(mut self, worker: &'static str, section: &'static str, reply: String) -> Self {
        self.rules.push(Rule {
            worker,
            section,
            reply,
            delay: Duration::ZERO,
        });
        self
    }

    fn slow(mut self, worker: &'static str, section: &'static str, delay: Duration) -> Self {
        self.rules.push(Rule {
            worker,
            section,
            reply: suggestions(&[]),
            delay,
        });
        self
    }

    fn find(&self, request: &GenerationRequest<'_>) -> Option<&Rule> {
        self.rules.iter().find(|r| {
            request.system.contains(&format!("for {}.", r.worker.to_uppercase()))
                && request.user.contains(&format!("**Section Title**: {}\n", r.section))
        })
    }
}

#[async_trait]
impl GenerationProvider for MockProvider {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.system.contains("## Reference Guidelines") {
            self.with_guidelines.fetch_add(1, Ordering::SeqCst);
        }
        match self.find(request) {
            Some(rule) => {
                if !rule.delay.is_zero() {
                    tokio::time::sleep(rule.delay).await;
                }
                Ok(rule.reply.clone())
            }
            None => Ok(suggestions(&[])),
        }
    }
}

/// Adds a fixed delay to every reply.
struct SlowProvider {
    delay: Duration,
}

#[async_trait]
impl GenerationProvider for SlowProvider {
    async fn generate(&self, _request: &GenerationRequest<'_>) -> Result<String, GenerationError> {
        tokio::time::sleep(self.delay).await;
        // Line 0 means "no line given": the worker pins it to the section start.
        Ok(suggestions(&[(0, "warning", "Sentence is hard to follow")]))
    }
}

struct MockStore {
    calls: AtomicUsize,
    reachable: bool,
}

impl MockStore {
    fn new(reachable: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reachable,
        })
    }
}

#[async_trait]
impl KnowledgeStore for MockStore {
    fn collection(&self) -> &str {
        "guidelines"
    }

    async fn query(&self, _text: &str, top_k: usize) -> Result<Vec<StoreHit>, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.reachable {
            return Err(RetrievalError::Unreachable("connection refused".into()));
        }
        let mut hits = vec![
            StoreHit {
                content: "Define every term before its first use.".into(),
                source: "style.md#1".into(),
                score: 0.9,
            },
            StoreHit {
                content: "Report the statistical test used for each comparison.".into(),
                source: "rigor.md#4".into(),
                score: 0.6,
            },
        ];
        hits.truncate(top_k);
        Ok(hits)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `\section{Intro}` on lines 1-10, `\section{Methods}` on lines 11-20.
fn two_section_doc() -> String {
    let mut lines = vec!["\\section{Intro}".to_string()];
    lines.extend((2..=10).map(|n| format!("Intro sentence number {n}.")));
    lines.push("\\section{Methods}".to_string());
    lines.extend((12..=20).map(|n| format!("We measure quantity {n} in the experiment.")));
    lines.join("\n")
}

/// Six sections of three lines each.
fn six_section_doc() -> String {
    let mut lines = Vec::new();
    for title in ["Intro", "Background", "Methods", "Results", "Discussion", "Conclusion"] {
        lines.push(format!("\\section{{{title}}}"));
        lines.push(format!("{title} opening sentence."));
        lines.push(format!("{title} closing sentence."));
    }
    lines.join("\n")
}

fn suggestions(items: &[(usize, &str, &str)]) -> String {
    let items: Vec<_> = items
        .iter()
        .map(|(line, severity, issue)| {
            serde_json::json!({
                "issue": issue,
                "explanation": format!("{issue} makes the section harder to evaluate."),
                "suggested_fix": "Revise the sentence.",
                "severity": severity,
                "line": line,
            })
        })
        .collect();
    serde_json::json!({ "suggestions": items }).to_string()
}

async fn registry(provider: Arc<dyn GenerationProvider>) -> WorkerRegistry {
    let defs = workers::load_definitions(None).await.unwrap();
    WorkerRegistry::from_definitions(defs, provider)
}

async fn controller(
    provider: Arc<dyn GenerationProvider>,
    store: Option<Arc<MockStore>>,
    config: Config,
) -> ReviewController {
    let cache = Arc::new(GuidelineCache::from_config(&config.guidelines));
    let retriever = match store {
        Some(store) => GuidelineRetriever::new(store, cache),
        None => GuidelineRetriever::disabled(cache),
    };
    ReviewController::new(registry(provider).await, Arc::new(retriever), config)
}

fn request() -> ReviewRequest {
    ReviewRequest::new(two_section_doc()).with_workers(["clarity", "rigor"])
}

/// Report JSON without the per-run fields.
fn stable_json(report: &Report) -> String {
    let mut report = report.clone();
    report.request_id = None;
    report.processing_time_ms = None;
    serde_json::to_string(&report).unwrap()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn two_sections_get_one_suggestion_each() {
    let provider = Arc::new(
        MockProvider::new()
            .rule("clarity", "Intro", suggestions(&[(5, "warning", "Undefined term")]))
            .rule("rigor", "Methods", suggestions(&[(15, "error", "Missing validation")])),
    );
    let store = MockStore::new(true);
    let ctl = controller(provider.clone(), Some(store.clone()), Config::default()).await;

    let run = ctl.run(request()).await;
    let report = &run.report;

    assert!(report.success);
    assert_eq!(run.trace.last(), Some(&ReviewState::Done));
    assert_eq!(report.sections.len(), 2);

    let intro = &report.sections[0];
    assert_eq!(intro.section_title, "Intro");
    assert_eq!((intro.section_start_line, intro.section_end_line), (1, 10));
    assert_eq!(intro.suggestion_groups.len(), 1);
    assert_eq!(intro.suggestion_groups[0].worker_kind, WorkerKind::new("clarity"));
    assert_eq!(intro.suggestion_groups[0].items[0].line, 5);

    let methods = &report.sections[1];
    assert_eq!(methods.section_title, "Methods");
    assert_eq!((methods.section_start_line, methods.section_end_line), (11, 20));
    assert_eq!(methods.suggestion_groups[0].worker_kind, WorkerKind::new("rigor"));
    assert_eq!(methods.suggestion_groups[0].items[0].severity, Severity::Error);

    assert_eq!(report.summary.total, 2);
    assert_eq!(report.summary.by_worker[&WorkerKind::new("clarity")], 1);
    assert_eq!(report.summary.by_worker[&WorkerKind::new("rigor")], 1);
    assert!(report.annotations.is_empty());

    // Four pairs, every prompt grounded in guidelines.
    assert_eq!(provider.calls.load(Ordering::SeqCst), 4);
    assert_eq!(provider.with_guidelines.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn unreachable_store_degrades_to_no_guidelines() {
    let provider = Arc::new(
        MockProvider::new()
            .rule("clarity", "Intro", suggestions(&[(5, "warning", "Undefined term")]))
            .rule("rigor", "Methods", suggestions(&[(15, "error", "Missing validation")])),
    );
    let store = MockStore::new(false);
    let ctl = controller(provider.clone(), Some(store), Config::default()).await;

    let report = ctl.review(request()).await;

    assert!(report.success);
    assert_eq!(report.summary.total, 2);
    assert_eq!(provider.with_guidelines.load(Ordering::SeqCst), 0);

    let notes: Vec<_> = report
        .annotations_of(AnnotationKind::GuidelinesUnavailable)
        .collect();
    assert_eq!(notes.len(), 2, "one note per worker: {notes:?}");
    assert!(notes.iter().all(|n| n.message.contains("no guidelines")));
}

#[tokio::test(start_paused = true)]
async fn one_timed_out_pair_keeps_the_rest() {
    let provider = Arc::new(
        MockProvider::new()
            .rule("clarity", "Intro", suggestions(&[(5, "warning", "Undefined term")]))
            .rule("clarity", "Methods", suggestions(&[(13, "info", "Passive voice obscures the actor")]))
            .slow("rigor", "Methods", Duration::from_secs(3600)),
    );
    let ctl = controller(provider, Some(MockStore::new(true)), Config::default()).await;

    let report = ctl.review(request()).await;

    assert!(report.success);
    let methods = report
        .sections
        .iter()
        .find(|s| s.section_title == "Methods")
        .unwrap();
    assert_eq!(methods.suggestion_groups[0].worker_kind, WorkerKind::new("clarity"));
    assert_eq!(methods.suggestion_groups[0].items[0].line, 13);

    let timed_out: Vec<_> = report.annotations_of(AnnotationKind::TaskTimedOut).collect();
    assert_eq!(timed_out.len(), 1);
    assert_eq!(timed_out[0].section_title.as_deref(), Some("Methods"));
    assert_eq!(timed_out[0].worker_kind, Some(WorkerKind::new("rigor")));
}

#[tokio::test]
async fn equivalent_findings_from_both_workers_merge() {
    let provider = Arc::new(
        MockProvider::new()
            .rule("clarity", "Intro", suggestions(&[(5, "warning", "The term ergodic is undefined")]))
            .rule("rigor", "Intro", suggestions(&[(5, "error", "Undefined term: ergodic")])),
    );
    let ctl = controller(provider, None, Config::default()).await;

    let report = ctl.review(request()).await;

    assert_eq!(report.summary.total, 1);
    let item = report.suggestions().next().unwrap();
    assert_eq!(item.severity, Severity::Error);
    assert_eq!(
        item.workers,
        vec![WorkerKind::new("clarity"), WorkerKind::new("rigor")]
    );
    assert_eq!(report.summary.by_worker[&WorkerKind::new("clarity")], 1);
    assert_eq!(report.summary.by_worker[&WorkerKind::new("rigor")], 1);
}

#[tokio::test(start_paused = true)]
async fn wall_clock_is_bounded_by_the_slowest_task() {
    let provider = Arc::new(SlowProvider {
        delay: Duration::from_secs(10),
    });
    let ctl = controller(provider, None, Config::default()).await;

    let started = Instant::now();
    let report = ctl.review(request()).await;
    let elapsed = started.elapsed();

    // Four 10s tasks; sequential execution would take 40s.
    assert!(elapsed < Duration::from_secs(11), "took {elapsed:?}");
    assert!(report.success);
    assert_eq!(report.summary.by_worker.values().sum::<usize>(), 4);
}

#[tokio::test(start_paused = true)]
async fn twelve_pairs_finish_in_one_task_time() {
    let provider = Arc::new(SlowProvider {
        delay: Duration::from_secs(10),
    });
    let ctl = controller(provider, None, Config::default()).await;

    let started = Instant::now();
    let report = ctl
        .review(ReviewRequest::new(six_section_doc()).with_workers(["clarity", "rigor"]))
        .await;
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_secs(11), "took {elapsed:?}");
    assert_eq!(report.sections.len(), 6);
    assert_eq!(report.summary.by_worker.values().sum::<usize>(), 12);
}

#[tokio::test(start_paused = true)]
async fn deadline_returns_partial_results() {
    let mut config = Config::default();
    config.review.max_concurrent = Some(1);
    config.review.task_timeout_secs = 50;
    config.review.request_deadline_secs = 60;
    let provider = Arc::new(SlowProvider {
        delay: Duration::from_secs(25),
    });
    let ctl = controller(provider, None, config).await;

    let run = ctl.run(request()).await;

    assert!(run.report.success);
    assert!(!run.trace.contains(&ReviewState::Collected));
    assert_eq!(
        run.report.annotations_of(AnnotationKind::DeadlineExceeded).count(),
        2
    );
    assert_eq!(run.report.summary.by_worker.values().sum::<usize>(), 2);
}

#[tokio::test]
async fn malformed_replies_fail_only_their_pair() {
    let provider = Arc::new(
        MockProvider::new()
            .rule("clarity", "Intro", "I think the section is fine overall.".into())
            .rule("rigor", "Intro", suggestions(&[(4, "warning", "Unstated assumption")])),
    );
    let ctl = controller(provider.clone(), None, Config::default()).await;

    let report = ctl.review(request()).await;

    assert!(report.success);
    assert_eq!(report.summary.total, 1);
    let failed: Vec<_> = report.annotations_of(AnnotationKind::TaskFailed).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].worker_kind, Some(WorkerKind::new("clarity")));
    // First attempt plus two retries for the malformed pair, one call for each other pair.
    assert_eq!(provider.calls.load(Ordering::SeqCst), 3 + 3);
}

// ---------------------------------------------------------------------------
// Cache and determinism
// ---------------------------------------------------------------------------

#[tokio::test]
async fn repeated_reviews_hit_the_guideline_cache() {
    let store = MockStore::new(true);
    let config = Config::default();
    let cache = Arc::new(GuidelineCache::from_config(&config.guidelines));
    let retriever = Arc::new(GuidelineRetriever::new(store.clone(), Arc::clone(&cache)));
    let provider: Arc<dyn GenerationProvider> = Arc::new(MockProvider::new());
    let ctl = ReviewController::new(registry(provider).await, Arc::clone(&retriever), config);

    ctl.review(request()).await;
    let after_first = store.calls.load(Ordering::SeqCst);
    ctl.review(request()).await;

    assert_eq!(after_first, 2, "one live lookup per worker");
    assert_eq!(store.calls.load(Ordering::SeqCst), after_first);
    assert!(cache.stats().hits >= 2);
}

#[tokio::test]
async fn identical_request_is_served_from_the_report_cache() {
    let provider = Arc::new(
        MockProvider::new().rule("clarity", "Intro", suggestions(&[(3, "warning", "Ambiguous pronoun")])),
    );
    let config = Config::default();
    let reports = Arc::new(ReportCache::from_config(&config.review).unwrap());
    let ctl = controller(provider.clone(), None, config)
        .await
        .with_report_cache(Arc::clone(&reports));

    let first = ctl.run(request()).await;
    let calls = provider.calls.load(Ordering::SeqCst);
    let second = ctl.run(request()).await;

    assert_eq!(calls, 4);
    assert_eq!(provider.calls.load(Ordering::SeqCst), calls, "no generation on a hit");
    assert_eq!(second.trace, vec![ReviewState::Init, ReviewState::Done]);
    assert_eq!(second.report.sections, first.report.sections);
    assert_ne!(second.report.request_id, first.report.request_id);
    assert_eq!(reports.stats().hits, 1);

    // Changing the worker selection misses.
    ctl.review(ReviewRequest::new(two_section_doc()).with_workers(["rigor"])).await;
    assert_eq!(provider.calls.load(Ordering::SeqCst), calls + 2);
}

#[tokio::test]
async fn normalized_queries_share_one_live_call() {
    let store = MockStore::new(true);
    let cache = Arc::new(GuidelineCache::new(8, Duration::from_secs(60)));
    let retriever = GuidelineRetriever::new(store.clone(), cache);

    let first = retriever.retrieve("Proof  structure\nvalidation", 2).await;
    let second = retriever.retrieve("proof structure validation ", 2).await;

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert!(first[0].relevance_score >= first[1].relevance_score);
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn reports_are_deterministic() {
    let make = || {
        Arc::new(
            MockProvider::new()
                .rule(
                    "clarity",
                    "Intro",
                    suggestions(&[(5, "warning", "Undefined term"), (3, "info", "Long sentence")]),
                )
                .rule("rigor", "Intro", suggestions(&[(5, "error", "Term is undefined")]))
                .rule("rigor", "Methods", suggestions(&[(15, "error", "Missing validation")])),
        )
    };

    let a = controller(make(), None, Config::default()).await.review(request()).await;
    let b = controller(make(), None, Config::default()).await.review(request()).await;

    assert_eq!(stable_json(&a), stable_json(&b));
    assert_ne!(a.request_id, b.request_id);
}
