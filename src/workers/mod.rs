//! Critique workers: the `CritiqueWorker` trait, profile loading, and the
//! registry the controller dispatches through.
//!
//! Workers are stateless across calls. Everything a call needs arrives as
//! arguments, so the same worker instance serves concurrent tasks.

pub mod builtin;
pub mod parser;
pub mod profile;
pub mod reply;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use thiserror::Error;
use tracing::warn;

use crate::config::Config;
use crate::models::worker::RetrievalPlan;
use crate::models::{GuidelineSnippet, Section, SectionRef, WorkerDefinition, WorkerKind};
use crate::providers::{GenerationError, GenerationProvider};

pub use profile::ProfileWorker;

/// Why a (section, worker) task produced no result.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("generation failed after {attempts} attempt(s): {source}")]
    Generation {
        attempts: u32,
        source: GenerationError,
    },

    #[error("malformed reply after {attempts} attempt(s): {reason}")]
    Malformed { attempts: u32, reason: String },
}

/// Errors from worker profile loading.
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("worker profile not found: {0}")]
    NotFound(String),

    #[error("failed to read worker profile {path}: {source}")]
    ReadError {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse worker profile {path}: {reason}")]
    ParseError { path: String, reason: String },
}

/// Per-call generation settings shared by every worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Default model; a profile's `model` overrides it.
    pub model: String,
    pub temperature: f64,
    /// Extra attempts after the first for malformed or transient failures.
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl WorkerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.provider.model.clone(),
            temperature: config.provider.temperature,
            max_retries: config.review.max_retries,
            retry_backoff: Duration::from_millis(config.review.retry_backoff_ms),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Result of one `analyze` call.
///
/// A failed call carries its error and no candidates; it never panics or
/// returns `Err`, so one worker's failure cannot affect another's.
#[derive(Debug, Default)]
pub struct WorkerOutcome {
    pub candidates: Vec<crate::models::SuggestionCandidate>,
    pub error: Option<AgentError>,
    pub attempts: u32,
    /// Reply items rejected by validation.
    pub dropped: usize,
}

impl WorkerOutcome {
    pub fn failed(error: AgentError, attempts: u32) -> Self {
        Self {
            candidates: Vec::new(),
            error: Some(error),
            attempts,
            dropped: 0,
        }
    }
}

/// One analytical dimension of the review.
#[async_trait]
pub trait CritiqueWorker: Send + Sync {
    fn kind(&self) -> &WorkerKind;

    fn description(&self) -> &str;

    /// Template for this worker's guideline query.
    fn retrieval_plan(&self) -> &RetrievalPlan;

    /// Whether this worker reviews `section` at all.
    fn accepts(&self, section: &Section) -> bool {
        let _ = section;
        true
    }

    /// Critique one section. Every returned candidate's line lies within
    /// `section_ref`'s range.
    async fn analyze(
        &self,
        section: &Section,
        section_ref: &SectionRef,
        guidelines: &[GuidelineSnippet],
        config: &WorkerConfig,
    ) -> WorkerOutcome;
}

/// Worker kinds mapped to their implementations, in registration order.
#[derive(Default, Clone)]
pub struct WorkerRegistry {
    workers: IndexMap<WorkerKind, Arc<dyn CritiqueWorker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One [`ProfileWorker`] per definition, all sharing `provider`.
    pub fn from_definitions(
        definitions: Vec<WorkerDefinition>,
        provider: Arc<dyn GenerationProvider>,
    ) -> Self {
        let mut registry = Self::new();
        for def in definitions {
            registry.register(Arc::new(ProfileWorker::new(def, Arc::clone(&provider))));
        }
        registry
    }

    /// Add a worker, replacing any existing worker of the same kind.
    pub fn register(&mut self, worker: Arc<dyn CritiqueWorker>) -> Option<Arc<dyn CritiqueWorker>> {
        self.workers.insert(worker.kind().clone(), worker)
    }

    pub fn get(&self, kind: &WorkerKind) -> Option<&Arc<dyn CritiqueWorker>> {
        self.workers.get(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &WorkerKind> {
        self.workers.keys()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

/// Built-in definitions followed by every valid `*.md` profile in
/// `profile_dir`. A custom profile with a built-in's name replaces it.
/// Invalid custom profiles are skipped with a warning.
pub async fn load_definitions(
    profile_dir: Option<&Path>,
) -> Result<Vec<WorkerDefinition>, ProfileError> {
    let mut defs: IndexMap<String, WorkerDefinition> = IndexMap::new();

    for name in builtin::list_builtin_names() {
        if let Some(def) = builtin::get_builtin(name) {
            defs.insert(def.profile.name.clone(), def);
        }
    }

    if let Some(dir) = profile_dir {
        if dir.is_dir() {
            let mut paths = Vec::new();
            let mut entries = tokio::fs::read_dir(dir)
                .await
                .map_err(|e| ProfileError::ReadError {
                    path: dir.display().to_string(),
                    source: e,
                })?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| ProfileError::ReadError {
                    path: dir.display().to_string(),
                    source: e,
                })?
            {
                let path = entry.path();
                if path.extension().is_some_and(|e| e == "md") {
                    paths.push(path);
                }
            }
            paths.sort();

            for path in paths {
                match load_profile_file(&path).await {
                    Ok(def) => {
                        defs.insert(def.profile.name.clone(), def);
                    }
                    Err(e) => warn!(error = %e, "skipping worker profile"),
                }
            }
        }
    }

    Ok(defs.into_values().collect())
}

/// Read and parse a single profile file.
pub async fn load_profile_file(path: &Path) -> Result<WorkerDefinition, ProfileError> {
    if !path.exists() {
        return Err(ProfileError::NotFound(path.display().to_string()));
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ProfileError::ReadError {
            path: path.display().to_string(),
            source: e,
        })?;
    parser::parse_worker_definition(&content).map_err(|reason| ProfileError::ParseError {
        path: path.display().to_string(),
        reason,
    })
}
