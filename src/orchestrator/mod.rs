//! Review controller: segmentation, concurrent fan-out, collection, aggregation.
//!
//! A request moves through a fixed sequence of stages, each consuming the
//! previous stage's output:
//!
//! ```text
//! Init → Segmented → Dispatched → Collected → Aggregated → Done
//!                                     └── deadline ──┘
//! ```
//!
//! Every (section × worker) pair runs as its own task, all at once unless
//! `review.max_concurrent` sets a cap. A task that exceeds the per-task
//! timeout only loses its own result. When the request deadline expires,
//! outstanding tasks are aborted and aggregation runs over whatever has
//! been collected.
//!
//! With a [`ReportCache`] attached, a request identical to an earlier
//! complete one skips straight from `Init` to `Done` and returns the stored
//! report under a fresh request id.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OnceCell, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::aggregator;
use crate::cache::{self, ReportCache};
use crate::config::Config;
use crate::models::section::flatten;
use crate::models::{
    Annotation, AnnotationKind, Report, Section, SectionRef, SuggestionCandidate, WorkerKind,
};
use crate::progress::{ProgressTracker, TaskStatus};
use crate::retrieval::query::formulate_query;
use crate::retrieval::{GuidelineLookup, GuidelineRetriever, GuidelineSource};
use crate::segmenter;
use crate::workers::{CritiqueWorker, WorkerConfig, WorkerOutcome, WorkerRegistry};

/// Input to a review: document text plus the worker kinds to run.
#[derive(Debug, Clone, Default)]
pub struct ReviewRequest {
    pub text: String,
    /// Worker kinds to run. Empty means every registered worker.
    pub workers: Vec<WorkerKind>,
    /// Section titles to review (case-insensitive). Empty means all.
    pub sections: Vec<String>,
}

impl ReviewRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_workers<I, S>(mut self, workers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.workers = workers.into_iter().map(WorkerKind::new).collect();
        self
    }

    pub fn with_sections<I, S>(mut self, sections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sections = sections.into_iter().map(Into::into).collect();
        self
    }
}

/// Controller states, recorded in the order they were entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewState {
    Init,
    Segmented,
    Dispatched,
    Collected,
    Aggregated,
    Done,
    Failed,
}

/// A finished review plus the states it passed through.
#[derive(Debug)]
pub struct ReviewRun {
    pub report: Report,
    pub trace: Vec<ReviewState>,
}

/// One dispatched (section, worker) pair.
#[derive(Debug, Clone)]
struct Pair {
    section: SectionRef,
    worker: WorkerKind,
    label: String,
}

/// Output of the segmentation stage.
struct Segmented {
    /// Non-empty sections selected for review, with their document-order refs.
    sections: Vec<(SectionRef, Section)>,
    workers: Vec<Arc<dyn CritiqueWorker>>,
    annotations: Vec<Annotation>,
}

/// Output of the dispatch stage.
struct Dispatched {
    tasks: JoinSet<PairResult>,
    pending: HashMap<tokio::task::Id, Pair>,
    annotations: Vec<Annotation>,
}

/// Output of the collection barrier.
struct Collected {
    candidates: Vec<SuggestionCandidate>,
    annotations: Vec<Annotation>,
    deadline_expired: bool,
}

/// What a pair task hands back. `None` means the per-task timeout fired.
type PairResult = Option<(WorkerOutcome, GuidelineSource)>;

/// Guideline query shared by every task of one worker; the first task
/// to need it performs the lookup.
struct WorkerQuery {
    query: String,
    top_k: usize,
    lookup: OnceCell<GuidelineLookup>,
}

/// Runs review requests against a worker registry and guideline retriever.
pub struct ReviewController {
    registry: WorkerRegistry,
    retriever: Arc<GuidelineRetriever>,
    config: Config,
    worker_config: WorkerConfig,
    progress: Option<Arc<ProgressTracker>>,
    report_cache: Option<Arc<ReportCache>>,
}

impl ReviewController {
    pub fn new(registry: WorkerRegistry, retriever: Arc<GuidelineRetriever>, config: Config) -> Self {
        let worker_config = WorkerConfig::from_config(&config);
        Self {
            registry,
            retriever,
            config,
            worker_config,
            progress: None,
            report_cache: None,
        }
    }

    pub fn with_progress(mut self, progress: Arc<ProgressTracker>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Serve repeated identical requests from `cache`.
    pub fn with_report_cache(mut self, cache: Arc<ReportCache>) -> Self {
        self.report_cache = Some(cache);
        self
    }

    /// Review a document and return its report.
    pub async fn review(&self, request: ReviewRequest) -> Report {
        self.run(request).await.report
    }

    /// Like [`review`](Self::review), but also returns the state trace.
    pub async fn run(&self, request: ReviewRequest) -> ReviewRun {
        let started = Instant::now();
        let deadline = started + self.config.review.request_deadline();
        let mut trace = vec![ReviewState::Init];

        let cached = self.report_cache.as_ref().map(|cache| {
            let key = cache::report_key(&request.text, &self.requested_workers(&request), &request.sections);
            (cache, key)
        });
        if let Some((cache, key)) = &cached {
            if let Some(hit) = cache.get(key) {
                let mut report = Report::clone(&hit);
                report.request_id = Some(uuid::Uuid::new_v4().to_string());
                report.processing_time_ms = Some(started.elapsed().as_millis() as u64);
                if let Some(progress) = &self.progress {
                    progress.finish(report.summary.total);
                }
                trace.push(ReviewState::Done);
                info!(
                    sections = report.sections.len(),
                    suggestions = report.summary.total,
                    "review served from report cache"
                );
                return ReviewRun { report, trace };
            }
        }

        let segmented = self.segment(&request);
        trace.push(ReviewState::Segmented);

        let dispatched = self.dispatch(segmented);
        trace.push(ReviewState::Dispatched);

        let collected = self.collect(dispatched, deadline).await;
        if !collected.deadline_expired {
            trace.push(ReviewState::Collected);
        }

        let mut annotations = collected.annotations;
        annotations.sort_by(|a, b| annotation_key(a).cmp(&annotation_key(b)));

        let mut report = match aggregator::aggregate(collected.candidates, &self.config.aggregation) {
            Ok(report) => {
                trace.push(ReviewState::Aggregated);
                report
            }
            Err(e) => {
                warn!(error = %e, "aggregation failed");
                trace.push(ReviewState::Failed);
                Report::failure(e.to_string())
            }
        };
        report.annotations = annotations;
        report.request_id = Some(uuid::Uuid::new_v4().to_string());
        report.processing_time_ms = Some(started.elapsed().as_millis() as u64);

        if let Some(progress) = &self.progress {
            progress.finish(report.summary.total);
        }
        if report.success {
            trace.push(ReviewState::Done);
        }
        if let Some((cache, key)) = &cached {
            if is_complete(&report) {
                cache.insert(key, report.clone());
            }
        }

        info!(
            sections = report.sections.len(),
            suggestions = report.summary.total,
            annotations = report.annotations.len(),
            elapsed_ms = report.processing_time_ms.unwrap_or_default(),
            "review finished"
        );

        ReviewRun { report, trace }
    }

    /// Segment the document, apply the section filter, and resolve workers.
    fn segment(&self, request: &ReviewRequest) -> Segmented {
        let mut annotations = Vec::new();

        let segmentation = segmenter::segment_with_diagnostics(&request.text);
        for err in &segmentation.errors {
            annotations.push(Annotation::new(AnnotationKind::Segmentation, err.to_string()).at_line(err.line()));
        }

        let filter: Vec<String> = request.sections.iter().map(|t| t.trim().to_lowercase()).collect();
        let mut sections = Vec::new();
        for (index, section) in flatten(&segmentation.sections).into_iter().enumerate() {
            if !filter.is_empty() && !filter.contains(&section.title.to_lowercase()) {
                continue;
            }
            if !section.has_content() {
                debug!(section = %section.title, "skipping section without content");
                continue;
            }
            let mut owned = section.clone();
            owned.end_line = section.own_end_line();
            owned.children.clear();
            sections.push((SectionRef::new(index, section), owned));
        }

        let requested = self.requested_workers(request);

        let mut seen = HashSet::new();
        let mut workers = Vec::new();
        for kind in requested {
            if !seen.insert(kind.clone()) {
                continue;
            }
            match self.registry.get(&kind) {
                Some(worker) => workers.push(Arc::clone(worker)),
                None => {
                    warn!(worker = %kind, "unknown worker kind requested");
                    annotations.push(
                        Annotation::new(
                            AnnotationKind::UnknownWorker,
                            format!("no worker registered for kind '{kind}'"),
                        )
                        .with_worker(&kind),
                    );
                }
            }
        }

        debug!(
            sections = sections.len(),
            workers = workers.len(),
            lines = segmentation.line_count,
            "document segmented"
        );

        Segmented {
            sections,
            workers,
            annotations,
        }
    }

    /// Spawn one task per accepted (section, worker) pair.
    fn dispatch(&self, segmented: Segmented) -> Dispatched {
        let Segmented {
            sections,
            workers,
            mut annotations,
        } = segmented;

        let semaphore = self
            .config
            .review
            .max_concurrent
            .map(|n| Arc::new(Semaphore::new(n.max(1))));
        let task_timeout = self.config.review.task_timeout();
        let mut tasks = JoinSet::new();
        let mut pending = HashMap::new();

        for worker in workers {
            let accepted: Vec<&(SectionRef, Section)> = sections
                .iter()
                .filter(|(section_ref, section)| {
                    let ok = worker.accepts(section);
                    if !ok {
                        annotations.push(Annotation::for_pair(
                            AnnotationKind::Skipped,
                            section_ref,
                            worker.kind(),
                            "worker does not review this kind of section",
                        ));
                    }
                    ok
                })
                .collect();
            if accepted.is_empty() {
                continue;
            }

            let plan = worker.retrieval_plan();
            let query = {
                let refs: Vec<&Section> = accepted.iter().map(|(_, s)| s).collect();
                formulate_query(plan, &refs, self.config.guidelines.sample_chars)
            };
            let shared = Arc::new(WorkerQuery {
                query,
                top_k: plan.top_k.unwrap_or(self.config.guidelines.top_k),
                lookup: OnceCell::new(),
            });

            for (section_ref, section) in accepted {
                let pair = Pair {
                    section: section_ref.clone(),
                    worker: worker.kind().clone(),
                    label: ProgressTracker::label(&section.title, section.start_line, worker.kind().as_str()),
                };
                if let Some(progress) = &self.progress {
                    progress.update(&pair.label, TaskStatus::Pending);
                }

                let handle = tasks.spawn(run_pair(
                    Arc::clone(&worker),
                    section.clone(),
                    section_ref.clone(),
                    Arc::clone(&shared),
                    Arc::clone(&self.retriever),
                    self.worker_config.clone(),
                    semaphore.clone(),
                    task_timeout,
                    self.progress.clone(),
                    pair.label.clone(),
                ));
                pending.insert(handle.id(), pair);
            }
        }

        debug!(tasks = pending.len(), "dispatched review tasks");

        Dispatched {
            tasks,
            pending,
            annotations,
        }
    }

    /// Barrier: wait for every task, or until the request deadline.
    async fn collect(&self, dispatched: Dispatched, deadline: Instant) -> Collected {
        let Dispatched {
            mut tasks,
            mut pending,
            mut annotations,
        } = dispatched;

        let mut candidates = Vec::new();
        let mut unavailable_noted: HashSet<WorkerKind> = HashSet::new();
        let mut deadline_expired = false;

        loop {
            let joined = match tokio::time::timeout_at(deadline, tasks.join_next_with_id()).await {
                Ok(Some(joined)) => joined,
                Ok(None) => break,
                Err(_) => {
                    deadline_expired = true;
                    tasks.abort_all();
                    break;
                }
            };

            let (id, result) = match joined {
                Ok((id, result)) => (id, Ok(result)),
                Err(e) => (e.id(), Err(e)),
            };
            let Some(pair) = pending.remove(&id) else {
                continue;
            };

            match result {
                Err(join_err) => {
                    let message = if join_err.is_panic() {
                        "worker panicked".to_string()
                    } else {
                        "worker task was cancelled".to_string()
                    };
                    warn!(section = %pair.section.title, worker = %pair.worker, "{message}");
                    self.mark(&pair, TaskStatus::Failed(message.clone()));
                    annotations.push(Annotation::for_pair(
                        AnnotationKind::TaskFailed,
                        &pair.section,
                        &pair.worker,
                        message,
                    ));
                }
                Ok(None) => {
                    let timeout = self.config.review.task_timeout();
                    warn!(
                        section = %pair.section.title,
                        worker = %pair.worker,
                        timeout_ms = timeout.as_millis() as u64,
                        "task exceeded its timeout"
                    );
                    self.mark(&pair, TaskStatus::Failed("timed out".to_string()));
                    annotations.push(Annotation::for_pair(
                        AnnotationKind::TaskTimedOut,
                        &pair.section,
                        &pair.worker,
                        format!("timed out after {timeout:?}"),
                    ));
                }
                Ok(Some((outcome, source))) => {
                    if let GuidelineSource::Unavailable(reason) = source {
                        if unavailable_noted.insert(pair.worker.clone()) {
                            annotations.push(
                                Annotation::new(
                                    AnnotationKind::GuidelinesUnavailable,
                                    format!("no guidelines were used: {reason}"),
                                )
                                .with_worker(&pair.worker),
                            );
                        }
                    }

                    match outcome.error {
                        Some(err) => {
                            self.mark(&pair, TaskStatus::Failed(err.to_string()));
                            annotations.push(Annotation::for_pair(
                                AnnotationKind::TaskFailed,
                                &pair.section,
                                &pair.worker,
                                err.to_string(),
                            ));
                        }
                        None => {
                            debug!(
                                section = %pair.section.title,
                                worker = %pair.worker,
                                candidates = outcome.candidates.len(),
                                dropped = outcome.dropped,
                                attempts = outcome.attempts,
                                "task finished"
                            );
                            self.mark(&pair, TaskStatus::Done(outcome.candidates.len()));
                            candidates.extend(outcome.candidates);
                        }
                    }
                }
            }
        }

        if deadline_expired {
            warn!(outstanding = pending.len(), "request deadline expired, aggregating partial results");
            for pair in pending.into_values() {
                self.mark(&pair, TaskStatus::Failed("deadline exceeded".to_string()));
                annotations.push(Annotation::for_pair(
                    AnnotationKind::DeadlineExceeded,
                    &pair.section,
                    &pair.worker,
                    "request deadline expired before this task finished",
                ));
            }
        }

        Collected {
            candidates,
            annotations,
            deadline_expired,
        }
    }

    /// Worker kinds a request asks for; every registered kind when it names none.
    fn requested_workers(&self, request: &ReviewRequest) -> Vec<WorkerKind> {
        if request.workers.is_empty() {
            self.registry.kinds().cloned().collect()
        } else {
            request.workers.clone()
        }
    }

    fn mark(&self, pair: &Pair, status: TaskStatus) {
        if let Some(progress) = &self.progress {
            progress.update(&pair.label, status);
        }
    }
}

/// Body of one pair task. The per-task timeout starts once a permit is held.
#[allow(clippy::too_many_arguments)]
async fn run_pair(
    worker: Arc<dyn CritiqueWorker>,
    section: Section,
    section_ref: SectionRef,
    query: Arc<WorkerQuery>,
    retriever: Arc<GuidelineRetriever>,
    config: WorkerConfig,
    semaphore: Option<Arc<Semaphore>>,
    task_timeout: Duration,
    progress: Option<Arc<ProgressTracker>>,
    label: String,
) -> PairResult {
    // The semaphore is never closed.
    let _permit = match semaphore {
        Some(semaphore) => Some(semaphore.acquire_owned().await.ok()?),
        None => None,
    };
    if let Some(progress) = &progress {
        progress.update(&label, TaskStatus::InProgress);
    }

    let work = async {
        let lookup = query
            .lookup
            .get_or_init(|| retriever.lookup(&query.query, query.top_k))
            .await;
        let outcome = worker
            .analyze(&section, &section_ref, &lookup.snippets, &config)
            .await;
        (outcome, lookup.source.clone())
    };

    tokio::time::timeout(task_timeout, work).await.ok()
}

/// Whether every dispatched pair finished and guidelines were available.
/// Only such reports are worth replaying.
fn is_complete(report: &Report) -> bool {
    report.success
        && !report.annotations.iter().any(|a| {
            matches!(
                a.kind,
                AnnotationKind::TaskFailed
                    | AnnotationKind::TaskTimedOut
                    | AnnotationKind::DeadlineExceeded
                    | AnnotationKind::GuidelinesUnavailable
            )
        })
}

/// Deterministic annotation order: location, worker, kind, message.
fn annotation_key(a: &Annotation) -> (usize, Option<&str>, String, &str) {
    (
        a.section_start_line.unwrap_or(0),
        a.worker_kind.as_ref().map(WorkerKind::as_str),
        format!("{:?}", a.kind),
        a.message.as_str(),
    )
}
